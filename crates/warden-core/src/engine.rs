//! Warden engine
//!
//! Wires the decision cache, captcha flows, stream synchronizer and metrics
//! aggregator to one cache store and one upstream client.

use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;

use warden_cache_adapter_memory::CacheAdapterMemory;
use warden_types::cache_adapter::CacheAdapter;
use warden_types::captcha_adapter::{CaptchaFlow, CaptchaGenerator};
use warden_types::decision::{CachableDecision, CachedDecision, ORIGIN_CLEAN, SCOPE_IP};
use warden_types::lapi_adapter::{ConnectionHealth, LapiClient};

use crate::cache::{DecisionCache, to_cached};
use crate::captcha::{CaptchaFlows, SvgCaptchaGenerator};
use crate::config::WardenConfig;
use crate::metrics::MetricsAggregator;
use crate::normalize::{NormalizeOptions, normalize_decisions};
use crate::prelude::*;
use crate::resolver::{Resolution, parse_ip, reduce};
use crate::stream::{RefreshOptions, RefreshOutcome, StreamSynchronizer};

/// A user's answer to a captcha
#[derive(Clone, Debug)]
pub struct CaptchaSubmission {
	pub ip: Box<str>,
	/// Origin of the decision that required the captcha
	pub origin: Box<str>,
	pub user_phrase: Box<str>,
	/// Ask for a new challenge instead of checking `user_phrase`
	pub refresh: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptchaOutcome {
	pub remediation: Remediation,
	pub captcha_phrase: Box<str>,
	pub inline_image: Box<str>,
}

pub struct WardenBuilder {
	lapi: Arc<dyn LapiClient>,
	config: WardenConfig,
	cache_adapter: Option<Arc<dyn CacheAdapter>>,
	captcha_generator: Option<Arc<dyn CaptchaGenerator>>,
}

impl WardenBuilder {
	pub fn new(lapi: Arc<dyn LapiClient>) -> Self {
		WardenBuilder {
			lapi,
			config: WardenConfig::default(),
			cache_adapter: None,
			captcha_generator: None,
		}
	}

	pub fn config(&mut self, config: WardenConfig) -> &mut Self {
		self.config = config;
		self
	}

	pub fn cache_adapter(&mut self, cache_adapter: Arc<dyn CacheAdapter>) -> &mut Self {
		self.cache_adapter = Some(cache_adapter);
		self
	}

	pub fn captcha_generator(&mut self, captcha_generator: Arc<dyn CaptchaGenerator>) -> &mut Self {
		self.captcha_generator = Some(captcha_generator);
		self
	}

	pub fn build(&self) -> WdResult<Warden> {
		self.config.validate()?;
		let config = Arc::new(self.config.clone());

		let adapter: Arc<dyn CacheAdapter> = match &self.cache_adapter {
			Some(adapter) => adapter.clone(),
			None => Arc::new(CacheAdapterMemory::new()),
		};
		let generator: Arc<dyn CaptchaGenerator> = match &self.captcha_generator {
			Some(generator) => generator.clone(),
			None => Arc::new(SvgCaptchaGenerator::default()),
		};

		let cache = Arc::new(DecisionCache::new(adapter.clone(), config.max_range_buckets));
		let captcha =
			CaptchaFlows::new(adapter.clone(), generator, config.captcha_flow_cache_duration());
		let stream = StreamSynchronizer::new(self.lapi.clone(), cache.clone(), config.clone());
		let metrics = MetricsAggregator::new(adapter);

		info!(
			stream_mode = config.stream_mode,
			bouncing_level = ?config.bouncing_level,
			"Warden engine ready"
		);
		Ok(Warden { config, lapi: self.lapi.clone(), cache, captcha, stream, metrics })
	}
}

pub struct Warden {
	config: Arc<WardenConfig>,
	lapi: Arc<dyn LapiClient>,
	cache: Arc<DecisionCache>,
	captcha: CaptchaFlows,
	stream: StreamSynchronizer,
	metrics: MetricsAggregator,
}

impl Warden {
	pub fn config(&self) -> &WardenConfig {
		&self.config
	}

	/// Remediation to apply to a client address
	///
	/// Only a malformed address is an error; upstream and cache failures
	/// degrade to the fallback remediation.
	pub async fn get_ip_remediation(&self, raw_ip: &str) -> WdResult<Resolution> {
		let ip = parse_ip(raw_ip)?;
		let resolved = self.resolve(&ip).await;
		let mut remediation = self.config.bouncing_level.apply(resolved.remediation);
		// flex bouncing downgrades bans after reduction, so the flow is checked again here
		if remediation == Remediation::Captcha && self.captcha_resolved(&ip).await {
			remediation = Remediation::Bypass;
		}
		let resolution = Resolution { remediation, origin: resolved.origin };

		if remediation == Remediation::Captcha {
			self.ensure_captcha_flow(&ip).await;
		}

		debug!(
			ip = %ip,
			remediation = %resolution.remediation,
			origin = %resolution.origin,
			"Remediation resolved"
		);
		if let Err(e) = self.metrics.increment(&resolution.origin, remediation).await {
			warn!(error = %e, "Failed to count remediation");
		}
		Ok(resolution)
	}

	async fn resolve(&self, ip: &IpAddr) -> Resolution {
		let fallback = self.config.fallback_remediation;
		let decisions = match self.lookup(ip).await {
			Ok(Some(decisions)) => decisions,
			Ok(None) => {
				debug!(ip = %ip, "Cache not warm yet, bypassing");
				return Resolution::clean(Remediation::Bypass);
			}
			Err(e) => {
				warn!(ip = %ip, error = %e, "Decision lookup failed, using fallback");
				Vec::new()
			}
		};

		let has_captcha =
			decisions.iter().any(|decision| decision.remediation() == Some(Remediation::Captcha));
		let captcha_resolved = has_captcha && self.captcha_resolved(ip).await;

		reduce(&decisions, Timestamp::now(), fallback, captcha_resolved)
	}

	async fn captcha_resolved(&self, ip: &IpAddr) -> bool {
		self.captcha.is_resolved(ip).await.unwrap_or_else(|e| {
			warn!(ip = %ip, error = %e, "Failed to read captcha flow");
			false
		})
	}

	/// Working set for an address, `None` while a stream-mode cache is still cold
	async fn lookup(&self, ip: &IpAddr) -> WdResult<Option<Vec<CachedDecision>>> {
		if self.config.stream_mode {
			if !self.cache.is_warm().await? {
				return Ok(None);
			}
			return Ok(Some(self.cache.get_all(ip).await?));
		}

		let cached = self.cache.get_all(ip).await?;
		if !cached.is_empty() {
			return Ok(Some(cached));
		}
		Ok(Some(self.live_lookup(ip).await))
	}

	/// Ask upstream, cache the answer and return it
	async fn live_lookup(&self, ip: &IpAddr) -> Vec<CachedDecision> {
		let raws = match self.lapi.get_decisions_matching_ip(ip).await {
			Ok(raws) => raws,
			Err(e) => {
				warn!(ip = %ip, error = %e, "Live decision lookup failed");
				return Vec::new();
			}
		};

		let now = Timestamp::now();
		let opts = NormalizeOptions {
			stream_mode: false,
			bad_ip_cache_duration: self.config.bad_ip_cache_duration(),
		};
		let mut decisions = normalize_decisions(&raws, now, &opts);
		if decisions.is_empty() && self.config.clean_ip_cache_duration > 0 {
			let ttl = self.config.clean_ip_cache_duration().as_millis() as i64;
			decisions.push(CachableDecision::new(
				ORIGIN_CLEAN,
				Remediation::Bypass.as_str(),
				SCOPE_IP,
				&ip.to_string(),
				now.add_millis(ttl),
			));
		}

		if let Err(e) = self.cache.store(&decisions).await {
			warn!(ip = %ip, error = %e, "Failed to cache live decisions");
		}
		decisions.iter().map(to_cached).collect()
	}

	async fn ensure_captcha_flow(&self, ip: &IpAddr) {
		let res = match self.captcha.get(ip).await {
			Ok(Some(_)) => return,
			Ok(None) => self.captcha.refresh(ip).await.map(|_| ()),
			Err(e) => Err(e),
		};
		if let Err(e) = res {
			warn!(ip = %ip, error = %e, "Failed to create captcha flow");
		}
	}

	/// Apply one decision stream diff
	pub async fn refresh_decisions(&self, opts: RefreshOptions) -> WdResult<RefreshOutcome> {
		self.stream.refresh(opts).await
	}

	/// Issue a new challenge for an address
	pub async fn refresh_captcha_flow(&self, raw_ip: &str) -> WdResult<CaptchaFlow> {
		let ip = parse_ip(raw_ip)?;
		self.captcha.refresh(&ip).await
	}

	pub async fn captcha_flow(&self, raw_ip: &str) -> WdResult<Option<CaptchaFlow>> {
		let ip = parse_ip(raw_ip)?;
		self.captcha.get(&ip).await
	}

	pub async fn handle_captcha_submission(
		&self,
		submission: &CaptchaSubmission,
	) -> WdResult<CaptchaOutcome> {
		let ip = parse_ip(&submission.ip)?;
		let flow = self.captcha.submit(&ip, &submission.user_phrase, submission.refresh).await?;
		let remediation =
			if flow.is_resolved() { Remediation::Bypass } else { Remediation::Captcha };

		info!(
			ip = %ip,
			origin = %submission.origin,
			remediation = %remediation,
			refresh = submission.refresh,
			"Captcha submission handled"
		);
		Ok(CaptchaOutcome {
			remediation,
			captcha_phrase: flow.phrase_to_guess,
			inline_image: flow.inline_image,
		})
	}

	/// Report the current usage window upstream
	pub async fn push_usage_metrics(&self, name: &str, version: &str) -> WdResult<Option<u16>> {
		self.metrics.flush(&*self.lapi, name, version).await
	}

	pub async fn check_connection_health(&self) -> ConnectionHealth {
		self.lapi.check_connection_health().await
	}

	/// Drop every cached decision, captcha flow and counter. The next stream refresh is a first fetch.
	pub async fn clear_cache(&self) -> WdResult<()> {
		self.cache.clear().await?;
		info!("Cache cleared");
		Ok(())
	}

	pub async fn is_warm(&self) -> WdResult<bool> {
		self.cache.is_warm().await
	}
}

// vim: ts=4
