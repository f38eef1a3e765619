//! Adapter contract for the key/value store holding decisions, captcha flows and counters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

use crate::prelude::*;

/// A single stored value
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CacheItem {
	pub key: Box<str>,
	pub content: serde_json::Value,
}

impl CacheItem {
	pub fn new(key: impl Into<Box<str>>, content: serde_json::Value) -> Self {
		Self { key: key.into(), content }
	}
}

/// A `Warden` cache adapter
///
/// Every cache backend is required to implement this trait. Implementations must
/// make a single `get_item` or `set_item` atomic per key; sequences of calls are
/// not expected to be atomic. Expired items must never be returned.
#[async_trait]
pub trait CacheAdapter: Debug + Send + Sync {
	/// Reads an item, `None` if it is missing or expired
	async fn get_item(&self, key: &str) -> WdResult<Option<CacheItem>>;

	/// Writes an item, replacing any previous value. `ttl` of `None` never expires.
	async fn set_item(&self, item: CacheItem, ttl: Option<Duration>) -> WdResult<()>;

	/// Deletes an item; deleting a missing key is not an error
	async fn delete_item(&self, key: &str) -> WdResult<()>;

	/// Removes every item
	async fn clear(&self) -> WdResult<()>;
}

// vim: ts=4
