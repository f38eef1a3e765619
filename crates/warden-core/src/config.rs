//! Engine Configuration
//!
//! Every field has a default so that a partial YAML/JSON document (or none at
//! all) yields a working live-mode configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::prelude::*;

/// How strictly resolved remediations are enforced
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BouncingLevel {
	/// Everything passes; decisions are still resolved and counted
	BouncingDisabled,
	/// Bans are downgraded to captcha
	FlexBouncing,
	#[default]
	NormalBouncing,
}

impl BouncingLevel {
	/// Post-process a resolved remediation
	pub fn apply(&self, remediation: Remediation) -> Remediation {
		match self {
			BouncingLevel::BouncingDisabled => Remediation::Bypass,
			BouncingLevel::FlexBouncing => remediation.min(Remediation::Captcha),
			BouncingLevel::NormalBouncing => remediation,
		}
	}
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct WardenConfig {
	/// Serve from the stream-synchronized cache only, never query upstream per request
	pub stream_mode: bool,
	/// Upper bound (seconds) for how long a non-bypass decision is trusted in stream mode
	pub bad_ip_cache_duration: u64,
	/// How long (seconds) a live-mode lookup that found nothing is remembered
	pub clean_ip_cache_duration: u64,
	/// Lifetime (seconds) of a captcha flow, resolved or not
	pub captcha_flow_cache_duration: u64,
	/// Remediation used when nothing matches, and for unknown decision types
	pub fallback_remediation: Remediation,
	pub bouncing_level: BouncingLevel,
	/// Maximum number of bucket keys a single range decision may be written to
	pub max_range_buckets: usize,

	// Stream filters
	pub stream_origins: Option<Vec<Box<str>>>,
	pub stream_scopes: Option<Vec<Box<str>>>,
	pub scenarios_containing: Option<Vec<Box<str>>>,
	pub scenarios_not_containing: Option<Vec<Box<str>>>,
}

impl WardenConfig {
	pub fn bad_ip_cache_duration(&self) -> Duration {
		Duration::from_secs(self.bad_ip_cache_duration)
	}

	pub fn clean_ip_cache_duration(&self) -> Duration {
		Duration::from_secs(self.clean_ip_cache_duration)
	}

	pub fn captcha_flow_cache_duration(&self) -> Duration {
		Duration::from_secs(self.captcha_flow_cache_duration)
	}

	/// Reject values that would make the engine misbehave
	pub fn validate(&self) -> WdResult<()> {
		if self.max_range_buckets == 0 {
			return Err(Error::ConfigError("max_range_buckets must be at least 1".into()));
		}
		if self.captcha_flow_cache_duration == 0 {
			return Err(Error::ConfigError("captcha_flow_cache_duration must not be 0".into()));
		}
		if self.stream_mode && self.bad_ip_cache_duration == 0 {
			return Err(Error::ConfigError(
				"bad_ip_cache_duration must not be 0 in stream mode".into(),
			));
		}
		Ok(())
	}
}

impl Default for WardenConfig {
	fn default() -> Self {
		Self {
			stream_mode: false,
			bad_ip_cache_duration: 120,
			clean_ip_cache_duration: 60,
			captcha_flow_cache_duration: 86_400, // 1 day
			fallback_remediation: Remediation::Bypass,
			bouncing_level: BouncingLevel::NormalBouncing,
			max_range_buckets: 65_536, // an IPv4 /8
			stream_origins: None,
			stream_scopes: None,
			scenarios_containing: None,
			scenarios_not_containing: None,
		}
	}
}


// vim: ts=4
