//! In-memory Cache Adapter
//!
//! Implements the CacheAdapter trait on top of an LRU map guarded by a
//! `parking_lot` lock. Every item carries an optional deadline; expired items
//! are dropped lazily when read, and in bulk by [`CacheAdapterMemory::prune`],
//! which writes also run at most once per prune interval.
//!
//! The adapter is owned by a single engine instance. Sharing decisions between
//! processes requires a networked adapter instead.

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tracing::trace;

use warden::cache_adapter::{CacheAdapter, CacheItem};
use warden::prelude::*;

/// Minimum time between two prunes triggered by writes
pub const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
struct StoredItem {
	content: serde_json::Value,
	expires_at: Option<Instant>,
}

impl StoredItem {
	fn is_expired(&self, now: Instant) -> bool {
		self.expires_at.is_some_and(|exp| now >= exp)
	}
}

/// Cache adapter keeping items in process memory
pub struct CacheAdapterMemory {
	items: RwLock<LruCache<Box<str>, StoredItem>>,
	prune_interval: Duration,
	last_prune: Mutex<Instant>,
}

fn prune_expired(items: &mut LruCache<Box<str>, StoredItem>, now: Instant) -> usize {
	let expired: Vec<Box<str>> = items
		.iter()
		.filter(|(_, item)| item.is_expired(now))
		.map(|(key, _)| key.clone())
		.collect();
	for key in &expired {
		items.pop(key);
	}
	expired.len()
}

impl CacheAdapterMemory {
	fn with_items(items: LruCache<Box<str>, StoredItem>) -> Self {
		Self {
			items: RwLock::new(items),
			prune_interval: DEFAULT_PRUNE_INTERVAL,
			last_prune: Mutex::new(Instant::now()),
		}
	}

	/// Create a store without a key limit; expired keys are reclaimed by write-triggered prunes
	pub fn new() -> Self {
		Self::with_items(LruCache::unbounded())
	}

	/// Create a store holding at most `capacity` keys, evicting the least recently used
	pub fn with_capacity(capacity: NonZeroUsize) -> Self {
		Self::with_items(LruCache::new(capacity))
	}

	/// Set the minimum time between two write-triggered prunes
	pub fn with_prune_interval(mut self, prune_interval: Duration) -> Self {
		self.prune_interval = prune_interval;
		self
	}

	fn prune_due(&self, now: Instant) -> bool {
		let mut last = self.last_prune.lock();
		if now.saturating_duration_since(*last) < self.prune_interval {
			return false;
		}
		*last = now;
		true
	}

	/// Number of stored keys, including expired ones not yet pruned
	pub fn len(&self) -> usize {
		self.items.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Drop every expired item, returning how many were removed
	pub fn prune(&self) -> usize {
		let now = Instant::now();
		*self.last_prune.lock() = now;
		let pruned = prune_expired(&mut self.items.write(), now);
		trace!("Pruned {} expired cache items", pruned);
		pruned
	}
}

impl Default for CacheAdapterMemory {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for CacheAdapterMemory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let items = self.items.read();
		f.debug_struct("CacheAdapterMemory")
			.field("len", &items.len())
			.field("cap", &items.cap())
			.field("prune_interval", &self.prune_interval)
			.finish()
	}
}

#[async_trait]
impl CacheAdapter for CacheAdapterMemory {
	async fn get_item(&self, key: &str) -> WdResult<Option<CacheItem>> {
		let now = Instant::now();
		let mut items = self.items.write();

		if let Some(item) = items.get(key) {
			if !item.is_expired(now) {
				return Ok(Some(CacheItem::new(key, item.content.clone())));
			}
			items.pop(key);
		}

		Ok(None)
	}

	async fn set_item(&self, item: CacheItem, ttl: Option<Duration>) -> WdResult<()> {
		let now = Instant::now();
		let expires_at = match ttl {
			Some(ttl) => Some(now.checked_add(ttl).ok_or_else(|| {
				Error::CacheError(format!("ttl out of range for key {}", item.key))
			})?),
			None => None,
		};

		let mut items = self.items.write();
		if self.prune_due(now) {
			let pruned = prune_expired(&mut items, now);
			trace!("Pruned {} expired cache items on write", pruned);
		}
		items.put(item.key, StoredItem { content: item.content, expires_at });
		Ok(())
	}

	async fn delete_item(&self, key: &str) -> WdResult<()> {
		self.items.write().pop(key);
		Ok(())
	}

	async fn clear(&self) -> WdResult<()> {
		self.items.write().clear();
		Ok(())
	}
}


// vim: ts=4
