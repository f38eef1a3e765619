//! Captcha Flow State Machine
//!
//! One flow per client address, kept in the cache adapter:
//!
//! - no flow: nothing was asked yet
//! - pending: `must_be_resolved`, fresh phrase
//! - failed: `must_be_resolved` and `resolution_failed`, same phrase unless refreshed
//! - resolved: `must_be_resolved == false`
//!
//! Only `refresh` and `submit` change state. A missing or unreadable flow
//! always degrades to a fresh challenge, never to a bypass.

pub mod generator;

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use warden_types::cache_adapter::{CacheAdapter, CacheItem};
use warden_types::captcha_adapter::{CaptchaFlow, CaptchaGenerator};

use crate::prelude::*;

pub use generator::SvgCaptchaGenerator;

fn flow_key(ip: &IpAddr) -> String {
	format!("captcha_flow_{}", ip)
}

pub struct CaptchaFlows {
	adapter: Arc<dyn CacheAdapter>,
	generator: Arc<dyn CaptchaGenerator>,
	ttl: Duration,
}

impl CaptchaFlows {
	pub fn new(
		adapter: Arc<dyn CacheAdapter>,
		generator: Arc<dyn CaptchaGenerator>,
		ttl: Duration,
	) -> Self {
		Self { adapter, generator, ttl }
	}

	/// Current flow of an address, if any
	pub async fn get(&self, ip: &IpAddr) -> WdResult<Option<CaptchaFlow>> {
		let Some(item) = self.adapter.get_item(&flow_key(ip)).await? else {
			return Ok(None);
		};

		match serde_json::from_value::<CaptchaFlow>(item.content) {
			Ok(flow) => Ok(Some(flow)),
			Err(e) => {
				warn!(ip = %ip, error = %e, "Ignoring unreadable captcha flow");
				Ok(None)
			}
		}
	}

	/// Whether the address solved its challenge
	pub async fn is_resolved(&self, ip: &IpAddr) -> WdResult<bool> {
		Ok(self.get(ip).await?.is_some_and(|flow| flow.is_resolved()))
	}

	async fn save(&self, ip: &IpAddr, flow: &CaptchaFlow) -> WdResult<()> {
		let item = CacheItem::new(flow_key(ip), serde_json::to_value(flow)?);
		self.adapter.set_item(item, Some(self.ttl)).await
	}

	/// Start over with a new challenge
	pub async fn refresh(&self, ip: &IpAddr) -> WdResult<CaptchaFlow> {
		let flow = CaptchaFlow::pending(self.generator.create()?);
		self.save(ip, &flow).await?;
		debug!(ip = %ip, "Issued new captcha");
		Ok(flow)
	}

	/// Check a user's answer
	pub async fn submit(&self, ip: &IpAddr, phrase: &str, refresh: bool) -> WdResult<CaptchaFlow> {
		if refresh {
			return self.refresh(ip).await;
		}

		let Some(mut flow) = self.get(ip).await? else {
			// nothing to check against
			let mut flow = CaptchaFlow::pending(self.generator.create()?);
			flow.resolution_failed = true;
			self.save(ip, &flow).await?;
			info!(ip = %ip, "Captcha submitted without a pending flow");
			return Ok(flow);
		};

		if !flow.must_be_resolved {
			return Ok(flow);
		}

		if phrase == &*flow.phrase_to_guess {
			flow.must_be_resolved = false;
			flow.resolution_failed = false;
			info!(ip = %ip, "Captcha resolved");
		} else {
			flow.resolution_failed = true;
			debug!(ip = %ip, "Captcha failed");
		}
		self.save(ip, &flow).await?;
		Ok(flow)
	}
}


// vim: ts=4
