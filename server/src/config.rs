//! Server configuration, read from a YAML file

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use warden_core::WardenConfig;
use warden_lapi_client_hyper::LapiClientOpts;

use crate::prelude::*;

pub const CONFIG_ENV: &str = "WARDEN_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "./warden.yaml";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
	pub listen: Box<str>,
	/// Name reported in usage metrics
	pub component_name: Box<str>,
	pub lapi: LapiClientOpts,
	/// Stream synchronization period, stream mode only
	pub refresh_interval_secs: u64,
	pub metrics_interval_secs: u64,
	pub warden: WardenConfig,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			listen: "127.0.0.1:3000".into(),
			component_name: "warden".into(),
			lapi: LapiClientOpts::default(),
			refresh_interval_secs: 10,
			metrics_interval_secs: 1800,
			warden: WardenConfig::default(),
		}
	}
}

impl ServerConfig {
	pub fn from_yaml(yaml: &str) -> WdResult<Self> {
		let config: ServerConfig =
			serde_yaml::from_str(yaml).map_err(|e| Error::ConfigError(e.to_string()))?;
		config.validate()?;
		Ok(config)
	}

	pub fn from_file(path: &Path) -> WdResult<Self> {
		let yaml = std::fs::read_to_string(path).map_err(|e| {
			Error::ConfigError(format!("cannot read {}: {}", path.display(), e))
		})?;
		Self::from_yaml(&yaml)
	}

	/// Load from `$WARDEN_CONFIG`, or `./warden.yaml`
	pub fn load() -> WdResult<Self> {
		let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
		info!(path = %path, "Loading configuration");
		Self::from_file(Path::new(&path))
	}

	pub fn validate(&self) -> WdResult<()> {
		if self.refresh_interval_secs == 0 || self.metrics_interval_secs == 0 {
			return Err(Error::ConfigError("task intervals must be at least 1 second".into()));
		}
		self.warden.validate()
	}

	pub fn refresh_interval(&self) -> Duration {
		Duration::from_secs(self.refresh_interval_secs)
	}

	pub fn metrics_interval(&self) -> Duration {
		Duration::from_secs(self.metrics_interval_secs)
	}
}


// vim: ts=4
