//! Adapter contract for the remote decision service (the local API, "LAPI").
//!
//! Only the three calls the engine needs, plus a health probe, are part of the
//! contract. Request framing and authentication belong to the implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::net::IpAddr;

use crate::decision::RawDecision;
use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
	Ok,
	Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthError {
	InvalidApiToken,
	SecurityEngineServerError,
	SecurityEngineUnreachable,
	UnexpectedStatus,
}

/// Result of a connection health probe
#[skip_serializing_none]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConnectionHealth {
	pub status: HealthStatus,
	pub error: Option<HealthError>,
}

impl ConnectionHealth {
	pub fn ok() -> Self {
		Self { status: HealthStatus::Ok, error: None }
	}

	pub fn error(error: HealthError) -> Self {
		Self { status: HealthStatus::Error, error: Some(error) }
	}
}

/// Parameters of a decision stream request
#[derive(Debug, Clone, Default)]
pub struct DecisionStreamQuery {
	/// `true` only when the local cache has never been populated
	pub is_first_fetch: bool,
	pub origins: Option<Vec<Box<str>>>,
	pub scopes: Option<Vec<Box<str>>>,
	pub scenarios_containing: Option<Vec<Box<str>>>,
	pub scenarios_not_containing: Option<Vec<Box<str>>>,
}

/// Diff returned by the decision stream; either list may be `null`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DecisionStream {
	#[serde(default)]
	pub new: Option<Vec<RawDecision>>,
	#[serde(default)]
	pub deleted: Option<Vec<RawDecision>>,
}

// Usage metrics report //
//**********************//
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MetricItem {
	pub name: Box<str>,
	pub value: i64,
	pub unit: Box<str>,
	pub labels: Option<BTreeMap<Box<str>, Box<str>>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MetricsMeta {
	pub window_size_seconds: i64,
	pub utc_now_timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MetricsWindow {
	pub meta: MetricsMeta,
	pub items: Vec<MetricItem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OsInfo {
	pub name: Box<str>,
	pub version: Box<str>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RemediationComponent {
	pub name: Box<str>,
	pub version: Box<str>,
	#[serde(rename = "type")]
	pub kind: Box<str>,
	pub utc_startup_timestamp: i64,
	pub feature_flags: Vec<Box<str>>,
	pub os: OsInfo,
	pub metrics: Vec<MetricsWindow>,
}

/// Body of a usage metrics push
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UsageMetricsReport {
	pub remediation_components: Vec<RemediationComponent>,
}

/// A `Warden` decision service client
#[async_trait]
pub trait LapiClient: Debug + Send + Sync {
	/// Probes connectivity and credentials; never fails, errors are part of the result
	async fn check_connection_health(&self) -> ConnectionHealth;

	/// Decisions currently applying to a single address
	async fn get_decisions_matching_ip(&self, ip: &IpAddr) -> WdResult<Vec<RawDecision>>;

	/// New and deleted decisions since the previous stream call
	async fn get_decision_stream(&self, query: &DecisionStreamQuery) -> WdResult<DecisionStream>;

	/// Pushes a usage report, returning the HTTP status code
	async fn push_usage_metrics(&self, report: &UsageMetricsReport) -> WdResult<u16>;
}


// vim: ts=4
