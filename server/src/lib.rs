//! Warden remediation server
//!
//! Embeds the engine behind a small JSON API and drives its periodic work.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod prelude;
pub mod routes;
pub mod tasks;

use std::sync::Arc;

use warden_core::WardenBuilder;
use warden_lapi_client_hyper::LapiClientHyper;

use crate::config::ServerConfig;
use crate::prelude::*;
use crate::routes::AppState;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn run(config: ServerConfig) -> WdResult<()> {
	let lapi = Arc::new(LapiClientHyper::new(&config.lapi)?);
	let warden = WardenBuilder::new(lapi).config(config.warden.clone()).build()?;

	let health = warden.check_connection_health().await;
	match health.error {
		None => info!(url = %config.lapi.url, "Decision service reachable"),
		Some(error) => warn!(url = %config.lapi.url, ?error, "Decision service not healthy"),
	}

	let app = Arc::new(AppState { warden });
	let mut handles = Vec::new();
	if config.warden.stream_mode {
		handles.push(tasks::spawn_stream_refresh(app.clone(), config.refresh_interval()));
	}
	handles.push(tasks::spawn_metrics_push(
		app.clone(),
		config.metrics_interval(),
		config.component_name.clone(),
		VERSION,
	));

	let listener = tokio::net::TcpListener::bind(&*config.listen).await?;
	info!(listen = %config.listen, version = VERSION, "Listening");
	let res = axum::serve(listener, routes::init(app))
		.with_graceful_shutdown(async {
			if let Err(e) = tokio::signal::ctrl_c().await {
				error!(error = %e, "Cannot listen for shutdown signal");
			}
		})
		.await;

	for handle in handles {
		handle.abort();
	}
	info!("Shut down");
	Ok(res?)
}

// vim: ts=4
