//! Decision model: raw upstream decisions and their normalized, cacheable forms.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::prelude::*;

/// Scope of a single address decision
pub const SCOPE_IP: &str = "ip";
/// Scope of a CIDR range decision
pub const SCOPE_RANGE: &str = "range";

/// Origin reported when an address resolves to bypass because nothing matched
pub const ORIGIN_CLEAN: &str = "clean";
/// Origin of decisions coming from curated blocklists
pub const ORIGIN_LISTS: &str = "lists";

/// A decision as delivered by the upstream decision service.
///
/// Every field is free-form; nothing is validated until normalization.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDecision {
	#[serde(default)]
	pub origin: String,
	#[serde(rename = "type", default)]
	pub kind: String,
	#[serde(default)]
	pub scope: String,
	#[serde(default)]
	pub value: String,
	/// Signed duration, e.g. `"3h59m49.48s"`
	#[serde(default)]
	pub duration: String,
	pub scenario: Option<String>,
}

/// Normalized, time-bounded decision ready to be written to the cache
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachableDecision {
	/// `origin-type-scope-value`, unique per logical decision
	pub identifier: Box<str>,
	pub origin: Box<str>,
	pub scope: Box<str>,
	pub value: Box<str>,
	#[serde(rename = "type")]
	pub kind: Box<str>,
	pub expires_at: Timestamp,
}

impl CachableDecision {
	pub fn new(
		origin: &str,
		kind: &str,
		scope: &str,
		value: &str,
		expires_at: Timestamp,
	) -> CachableDecision {
		let origin = origin.to_lowercase();
		let kind = kind.to_lowercase();
		let scope = scope.to_lowercase();
		let value = value.to_lowercase();
		let identifier = format!("{}-{}-{}-{}", origin, kind, scope, value);

		CachableDecision {
			identifier: identifier.into(),
			origin: origin.into(),
			scope: scope.into(),
			value: value.into(),
			kind: kind.into(),
			expires_at,
		}
	}
}

/// One decision as held inside a cache entry.
///
/// Range decisions keep their network so that a bucket lookup can check
/// membership of the queried address.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedDecision {
	pub id: Box<str>,
	pub origin: Box<str>,
	pub expires_at: Timestamp,
	/// Remediation type of the decision
	pub value: Box<str>,
	pub range: Option<IpNet>,
}

impl CachedDecision {
	pub fn is_expired(&self, now: Timestamp) -> bool {
		self.expires_at.is_past(now)
	}

	pub fn remediation(&self) -> Option<Remediation> {
		Remediation::from_type(&self.value)
	}
}


// vim: ts=4
