use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use warden_server::config::ServerConfig;

#[tokio::main]
async fn main() -> ExitCode {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with_target(false)
		.init();

	let res = match ServerConfig::load() {
		Ok(config) => warden_server::run(config).await,
		Err(e) => Err(e),
	};

	match res {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			tracing::error!(error = %e, "Fatal error");
			ExitCode::FAILURE
		}
	}
}

// vim: ts=4
