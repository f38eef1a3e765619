//! Periodic background tasks
//!
//! Each task awaits its work before the next tick, so cycles never overlap.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use warden_core::RefreshOptions;

use crate::prelude::*;
use crate::routes::App;

fn interval(period: Duration) -> tokio::time::Interval {
	let mut interval = tokio::time::interval(period);
	interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
	interval
}

/// Keep the decision cache in sync with the stream
pub fn spawn_stream_refresh(app: App, period: Duration) -> JoinHandle<()> {
	tokio::spawn(async move {
		let mut interval = interval(period);
		loop {
			interval.tick().await;
			// failures are logged by the synchronizer, the next tick retries
			if let Ok(outcome) = app.warden.refresh_decisions(RefreshOptions::default()).await {
				debug!(new = outcome.new.len(), deleted = outcome.deleted.len(), "Stream refresh done");
			}
		}
	})
}

/// Push usage metrics; the first tick is skipped so the first window is a full period
pub fn spawn_metrics_push(
	app: App,
	period: Duration,
	name: Box<str>,
	version: &'static str,
) -> JoinHandle<()> {
	tokio::spawn(async move {
		let mut interval = interval(period);
		interval.tick().await;
		loop {
			interval.tick().await;
			match app.warden.push_usage_metrics(&name, version).await {
				Ok(Some(status)) => debug!(status, "Usage metrics window closed"),
				Ok(None) => {}
				Err(e) => warn!(error = %e, "Usage metrics push failed, keeping counters"),
			}
		}
	})
}

// vim: ts=4
