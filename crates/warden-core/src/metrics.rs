//! Usage Metrics Aggregator
//!
//! Counts served remediations per origin and remediation type, and turns the
//! counts into a usage report. Counters live in the cache store so that every
//! engine sharing a store contributes to the same window.

use std::collections::BTreeMap;
use std::sync::Arc;

use warden_types::cache_adapter::{CacheAdapter, CacheItem};
use warden_types::decision::ORIGIN_CLEAN;
use warden_types::lapi_adapter::{
	LapiClient, MetricItem, MetricsMeta, MetricsWindow, OsInfo, RemediationComponent,
	UsageMetricsReport,
};

use crate::prelude::*;

const ORIGINS_COUNT_KEY: &str = "origins_count";
const LAST_METRICS_SENT_KEY: &str = "last_metrics_sent";

/// Component type reported upstream
pub const COMPONENT_TYPE: &str = "bouncer";
const UNIT: &str = "request";

/// `origin -> remediation -> count`
pub type OriginCounts = BTreeMap<Box<str>, BTreeMap<Box<str>, i64>>;

/// Identity and time window of a report
#[derive(Clone, Debug)]
pub struct ReportWindow<'a> {
	pub name: &'a str,
	pub version: &'a str,
	pub startup: Timestamp,
	pub last_sent: Timestamp,
	pub now: Timestamp,
}

/// `dropped` items and the `processed` total of a set of counts
///
/// Every non-bypass pair is reported as dropped. Negative counts are left out
/// of both.
pub fn summarize(counts: &OriginCounts) -> (Vec<MetricItem>, i64) {
	let mut processed = 0;
	let mut items = Vec::new();

	for (origin, remediations) in counts {
		for (remediation, &count) in remediations {
			if count < 0 {
				warn!(origin = %origin, remediation = %remediation, count, "Ignoring negative counter");
				continue;
			}
			processed += count;
			if &**remediation == Remediation::Bypass.as_str() {
				continue;
			}
			let labels: BTreeMap<Box<str>, Box<str>> = BTreeMap::from([
				("origin".into(), origin.clone()),
				("remediation".into(), remediation.clone()),
			]);
			items.push(MetricItem {
				name: "dropped".into(),
				value: count,
				unit: UNIT.into(),
				labels: Some(labels),
			});
		}
	}

	(items, processed)
}

/// Build the report for a window, `None` when nothing was processed
pub fn build_usage_report(counts: &OriginCounts, window: &ReportWindow<'_>) -> Option<UsageMetricsReport> {
	let (mut items, processed) = summarize(counts);
	if processed == 0 {
		return None;
	}
	items.push(MetricItem { name: "processed".into(), value: processed, unit: UNIT.into(), labels: None });

	let now = window.now.as_secs();
	let component = RemediationComponent {
		name: window.name.into(),
		version: window.version.into(),
		kind: COMPONENT_TYPE.into(),
		utc_startup_timestamp: window.startup.as_secs(),
		feature_flags: Vec::new(),
		os: OsInfo { name: std::env::consts::OS.into(), version: "unknown".into() },
		metrics: vec![MetricsWindow {
			meta: MetricsMeta {
				window_size_seconds: (now - window.last_sent.as_secs()).max(0),
				utc_now_timestamp: now,
			},
			items,
		}],
	};

	Some(UsageMetricsReport { remediation_components: vec![component] })
}

pub struct MetricsAggregator {
	adapter: Arc<dyn CacheAdapter>,
	startup: Timestamp,
}

impl MetricsAggregator {
	pub fn new(adapter: Arc<dyn CacheAdapter>) -> Self {
		Self { adapter, startup: Timestamp::now() }
	}

	pub fn startup(&self) -> Timestamp {
		self.startup
	}

	/// Current counters
	pub async fn origin_counts(&self) -> WdResult<OriginCounts> {
		let Some(item) = self.adapter.get_item(ORIGINS_COUNT_KEY).await? else {
			return Ok(OriginCounts::new());
		};
		serde_json::from_value(item.content).map_err(|e| {
			error!(error = %e, "Usage metrics counters are corrupted");
			Error::Internal("usage metrics counters are unreadable".into())
		})
	}

	async fn save_counts(&self, counts: &OriginCounts) -> WdResult<()> {
		let item = CacheItem::new(ORIGINS_COUNT_KEY, serde_json::to_value(counts)?);
		self.adapter.set_item(item, None).await
	}

	/// Count one served remediation
	pub async fn increment(&self, origin: &str, remediation: Remediation) -> WdResult<()> {
		let origin = if origin.is_empty() { ORIGIN_CLEAN } else { origin };
		let mut counts = self.origin_counts().await?;
		*counts
			.entry(origin.into())
			.or_default()
			.entry(remediation.as_str().into())
			.or_default() += 1;
		self.save_counts(&counts).await
	}

	async fn last_sent(&self) -> WdResult<Timestamp> {
		let last = match self.adapter.get_item(LAST_METRICS_SENT_KEY).await? {
			Some(item) => serde_json::from_value(item.content).ok(),
			None => None,
		};
		Ok(last.unwrap_or(self.startup))
	}

	/// Push the current window upstream
	///
	/// Returns the upstream status, or `None` when there was nothing to report.
	/// Counters are only drained after a 2xx answer.
	pub async fn flush(
		&self,
		lapi: &dyn LapiClient,
		name: &str,
		version: &str,
	) -> WdResult<Option<u16>> {
		let snapshot = self.origin_counts().await?;
		let window = ReportWindow {
			name,
			version,
			startup: self.startup,
			last_sent: self.last_sent().await?,
			now: Timestamp::now(),
		};
		let Some(report) = build_usage_report(&snapshot, &window) else {
			debug!("No usage metrics to push");
			return Ok(None);
		};

		let status = lapi.push_usage_metrics(&report).await.inspect_err(|e| {
			warn!(error = %e, "Usage metrics push failed");
		})?;
		if !(200..300).contains(&status) {
			warn!(status, "Usage metrics push rejected");
			return Err(Error::UpstreamStatus(status));
		}

		self.drain(&snapshot).await?;
		let last = CacheItem::new(LAST_METRICS_SENT_KEY, serde_json::to_value(window.now)?);
		self.adapter.set_item(last, None).await?;
		info!(status, "Usage metrics pushed");
		Ok(Some(status))
	}

	/// Subtract what was reported, keeping anything counted during the push
	async fn drain(&self, reported: &OriginCounts) -> WdResult<()> {
		let mut counts = self.origin_counts().await?;
		for (origin, remediations) in reported {
			let Some(current) = counts.get_mut(origin) else {
				continue;
			};
			for (remediation, &count) in remediations {
				if count < 0 {
					continue;
				}
				if let Some(value) = current.get_mut(remediation) {
					*value = (*value - count).max(0);
				}
			}
		}
		self.save_counts(&counts).await
	}
}


// vim: ts=4
