//! Stream Synchronizer
//!
//! Applies one decision stream diff to the cache. The first call after the
//! cache was created or cleared asks upstream for the full active set.

use serde::Serialize;
use std::sync::Arc;

use warden_types::decision::CachedDecision;
use warden_types::lapi_adapter::{DecisionStreamQuery, LapiClient};

use crate::cache::DecisionCache;
use crate::config::WardenConfig;
use crate::normalize::{NormalizeOptions, normalize_decisions};
use crate::prelude::*;

/// Per-call overrides of the configured stream filters
#[derive(Clone, Debug, Default)]
pub struct RefreshOptions {
	pub origins: Option<Vec<Box<str>>>,
	pub scopes: Option<Vec<Box<str>>>,
}

/// What a synchronization cycle changed
#[derive(Clone, Debug, Default, Serialize)]
pub struct RefreshOutcome {
	pub new: Vec<CachedDecision>,
	pub deleted: Vec<CachedDecision>,
}

pub struct StreamSynchronizer {
	lapi: Arc<dyn LapiClient>,
	cache: Arc<DecisionCache>,
	config: Arc<WardenConfig>,
}

impl StreamSynchronizer {
	pub fn new(lapi: Arc<dyn LapiClient>, cache: Arc<DecisionCache>, config: Arc<WardenConfig>) -> Self {
		Self { lapi, cache, config }
	}

	fn query(&self, is_first_fetch: bool, opts: RefreshOptions) -> DecisionStreamQuery {
		DecisionStreamQuery {
			is_first_fetch,
			origins: opts.origins.or_else(|| self.config.stream_origins.clone()),
			scopes: opts.scopes.or_else(|| self.config.stream_scopes.clone()),
			scenarios_containing: self.config.scenarios_containing.clone(),
			scenarios_not_containing: self.config.scenarios_not_containing.clone(),
		}
	}

	/// Run one cycle. A failed fetch leaves the cache and its warm state untouched.
	pub async fn refresh(&self, opts: RefreshOptions) -> WdResult<RefreshOutcome> {
		let is_first_fetch = !self.cache.is_warm().await?;
		let query = self.query(is_first_fetch, opts);

		let stream = match self.lapi.get_decision_stream(&query).await {
			Ok(stream) => stream,
			Err(e) => {
				warn!(error = %e, is_first_fetch, "Decision stream fetch failed, skipping cycle");
				return Err(e);
			}
		};

		let now = Timestamp::now();
		let opts = NormalizeOptions {
			stream_mode: true,
			bad_ip_cache_duration: self.config.bad_ip_cache_duration(),
		};
		let new = normalize_decisions(stream.new.as_deref().unwrap_or_default(), now, &opts);
		// deletions only need their identifiers
		let deleted_opts = NormalizeOptions { stream_mode: false, ..opts };
		let deleted =
			normalize_decisions(stream.deleted.as_deref().unwrap_or_default(), now, &deleted_opts);

		// a re-issued decision keeps its identifier, so removals go first
		let deleted = self.cache.remove(&deleted).await?;
		let new = self.cache.store(&new).await?;
		self.cache.set_warm().await?;

		info!(
			is_first_fetch,
			new = new.len(),
			deleted = deleted.len(),
			"Decision stream synchronized"
		);
		Ok(RefreshOutcome { new, deleted })
	}
}

// vim: ts=4
