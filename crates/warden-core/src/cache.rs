//! Bucketed Decision Cache
//!
//! Stores normalized decisions in the cache adapter. Each key holds the list of
//! decisions applying to it; the key's TTL follows the latest expiry in the
//! list. Expired decisions are pruned on every read and before every merge.
//!
//! Writes are read-merge-write per key: the adapter only guarantees per-key
//! atomicity, and merging the full up-to-date list keeps concurrent writers
//! from clobbering each other's decisions.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use warden_types::cache_adapter::{CacheAdapter, CacheItem};
use warden_types::decision::{CachableDecision, CachedDecision, SCOPE_RANGE};

use crate::bucket::CacheKey;
use crate::prelude::*;

/// Key of the cache-wide state record
const CACHE_STATE_KEY: &str = "warden_cache_state";

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheState {
	warmed_up: bool,
}

/// Convert a normalized decision to the form kept in cache entries
pub fn to_cached(decision: &CachableDecision) -> CachedDecision {
	let range = if &*decision.scope == SCOPE_RANGE {
		decision.value.parse::<IpNet>().ok().map(|net| net.trunc())
	} else {
		None
	};

	CachedDecision {
		id: decision.identifier.clone(),
		origin: decision.origin.clone(),
		expires_at: decision.expires_at,
		value: decision.kind.clone(),
		range,
	}
}

pub struct DecisionCache {
	adapter: Arc<dyn CacheAdapter>,
	max_range_buckets: usize,
}

impl DecisionCache {
	pub fn new(adapter: Arc<dyn CacheAdapter>, max_range_buckets: usize) -> Self {
		Self { adapter, max_range_buckets }
	}

	/// Read the live decisions under a key. Unreadable content counts as empty.
	async fn read_entry(&self, key: &CacheKey, now: Timestamp) -> WdResult<Vec<CachedDecision>> {
		let Some(item) = self.adapter.get_item(&key.to_string()).await? else {
			return Ok(Vec::new());
		};

		match serde_json::from_value::<Vec<CachedDecision>>(item.content) {
			Ok(mut content) => {
				content.retain(|decision| !decision.is_expired(now));
				Ok(content)
			}
			Err(e) => {
				warn!(key = %key, error = %e, "Discarding unreadable cache entry");
				Ok(Vec::new())
			}
		}
	}

	/// Write back a key's decisions, deleting the key once nothing is left
	async fn write_entry(
		&self,
		key: &CacheKey,
		content: &[CachedDecision],
		now: Timestamp,
	) -> WdResult<()> {
		let Some(latest) = content.iter().map(|decision| decision.expires_at).max() else {
			return self.adapter.delete_item(&key.to_string()).await;
		};

		let item = CacheItem::new(key.to_string(), serde_json::to_value(content)?);
		self.adapter.set_item(item, Some(latest.remaining_from(now))).await
	}

	fn keys_for(&self, decision: &CachableDecision) -> Option<Vec<CacheKey>> {
		match CacheKey::for_decision(decision, self.max_range_buckets) {
			Ok(keys) => Some(keys),
			Err(e) => {
				warn!(id = %decision.identifier, error = %e, "Skipping uncacheable decision");
				None
			}
		}
	}

	/// Store decisions, returning the ones that were not already cached
	pub async fn store(&self, decisions: &[CachableDecision]) -> WdResult<Vec<CachedDecision>> {
		let now = Timestamp::now();
		let mut stored = Vec::new();

		for decision in decisions {
			let cached = to_cached(decision);
			if cached.is_expired(now) {
				debug!(id = %cached.id, "Not storing an already expired decision");
				continue;
			}
			let Some(keys) = self.keys_for(decision) else {
				continue;
			};

			let mut is_new = false;
			for key in &keys {
				let mut content = self.read_entry(key, now).await?;
				if content.iter().any(|existing| existing.id == cached.id) {
					continue;
				}
				content.push(cached.clone());
				self.write_entry(key, &content, now).await?;
				is_new = true;
			}

			if is_new {
				trace!(id = %cached.id, keys = keys.len(), "Stored decision");
				stored.push(cached);
			}
		}

		Ok(stored)
	}

	/// Remove decisions, returning the ones that were actually cached
	pub async fn remove(&self, decisions: &[CachableDecision]) -> WdResult<Vec<CachedDecision>> {
		let now = Timestamp::now();
		let mut removed = Vec::new();

		for decision in decisions {
			let Some(keys) = self.keys_for(decision) else {
				continue;
			};

			let mut found: Option<CachedDecision> = None;
			for key in &keys {
				let content = self.read_entry(key, now).await?;
				let (matching, kept): (Vec<_>, Vec<_>) =
					content.into_iter().partition(|cached| cached.id == decision.identifier);
				if matching.is_empty() {
					continue;
				}
				self.write_entry(key, &kept, now).await?;
				if found.is_none() {
					found = matching.into_iter().next();
				}
			}

			if let Some(cached) = found {
				trace!(id = %cached.id, "Removed decision");
				removed.push(cached);
			}
		}

		Ok(removed)
	}

	/// Every live decision applying to a single address, including ranges containing it
	pub async fn get_all(&self, ip: &IpAddr) -> WdResult<Vec<CachedDecision>> {
		let now = Timestamp::now();
		let ip = ip.to_canonical();
		let mut seen = HashSet::new();
		let mut decisions = Vec::new();

		for key in CacheKey::lookup_keys(&ip) {
			let is_bucket = key.is_bucket();
			for decision in self.read_entry(&key, now).await? {
				if is_bucket && !decision.range.is_some_and(|net| net.contains(&ip)) {
					continue;
				}
				if seen.insert(decision.id.clone()) {
					decisions.push(decision);
				}
			}
		}

		Ok(decisions)
	}

	/// Whether at least one stream synchronization completed since the cache was last cleared
	pub async fn is_warm(&self) -> WdResult<bool> {
		let Some(item) = self.adapter.get_item(CACHE_STATE_KEY).await? else {
			return Ok(false);
		};
		Ok(serde_json::from_value::<CacheState>(item.content).is_ok_and(|state| state.warmed_up))
	}

	pub async fn set_warm(&self) -> WdResult<()> {
		let state = serde_json::to_value(CacheState { warmed_up: true })?;
		self.adapter.set_item(CacheItem::new(CACHE_STATE_KEY, state), None).await
	}

	/// Drop everything held by the adapter, warm state included
	pub async fn clear(&self) -> WdResult<()> {
		self.adapter.clear().await
	}
}


// vim: ts=4
