//! Common types used throughout Warden.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

// Timestamp //
//***********//
/// Absolute point in time as milliseconds since the Unix epoch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

impl Timestamp {
	pub fn now() -> Timestamp {
		let res = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
		Timestamp(res.as_millis() as i64)
	}

	/// Shift by a signed number of milliseconds
	pub fn add_millis(self, millis: i64) -> Timestamp {
		Timestamp(self.0.saturating_add(millis))
	}

	/// Whole seconds since the epoch
	pub fn as_secs(self) -> i64 {
		self.0.div_euclid(1000)
	}

	/// Time left until `self`, zero if it already passed
	pub fn remaining_from(self, now: Timestamp) -> Duration {
		Duration::from_millis(self.0.saturating_sub(now.0).max(0) as u64)
	}

	pub fn is_past(self, now: Timestamp) -> bool {
		self.0 <= now.0
	}
}

impl std::fmt::Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl Serialize for Timestamp {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_i64(self.0)
	}
}

impl<'de> Deserialize<'de> for Timestamp {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		Ok(Timestamp(i64::deserialize(deserializer)?))
	}
}

// Remediation //
//*************//
/// Action applied to a client, ordered from least to most severe
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Remediation {
	Bypass,
	Captcha,
	Ban,
}

impl Remediation {
	pub fn as_str(&self) -> &'static str {
		match self {
			Remediation::Bypass => "bypass",
			Remediation::Captcha => "captcha",
			Remediation::Ban => "ban",
		}
	}

	/// Parse a decision type; unknown types yield `None`
	pub fn from_type(kind: &str) -> Option<Remediation> {
		match kind {
			"bypass" => Some(Remediation::Bypass),
			"captcha" => Some(Remediation::Captcha),
			"ban" => Some(Remediation::Ban),
			_ => None,
		}
	}
}

impl std::fmt::Display for Remediation {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}


// vim: ts=4
