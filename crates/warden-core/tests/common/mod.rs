//! Test doubles shared by the integration tests
//!
//! `ScriptedLapi` answers from in-memory scripts and records what it was asked;
//! `FixedCaptcha` hands out predictable phrases.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;

use warden_core::{Warden, WardenBuilder, WardenConfig};
use warden_types::captcha_adapter::{CaptchaChallenge, CaptchaGenerator};
use warden_types::decision::RawDecision;
use warden_types::error::{Error, WdResult};
use warden_types::lapi_adapter::{
	ConnectionHealth, DecisionStream, DecisionStreamQuery, LapiClient, UsageMetricsReport,
};

pub fn setup_test_logging() {
	let _ = tracing_subscriber::fmt()
		.with_test_writer()
		.with_max_level(tracing::Level::DEBUG)
		.try_init();
}

pub fn raw(origin: &str, kind: &str, scope: &str, value: &str, duration: &str) -> RawDecision {
	RawDecision {
		origin: origin.into(),
		kind: kind.into(),
		scope: scope.into(),
		value: value.into(),
		duration: duration.into(),
		scenario: None,
	}
}

pub fn stream(new: Vec<RawDecision>, deleted: Vec<RawDecision>) -> DecisionStream {
	DecisionStream { new: Some(new), deleted: Some(deleted) }
}

#[derive(Debug)]
pub struct ScriptedLapi {
	/// Answer of every live lookup, `None` fails the call
	pub live: Mutex<Option<Vec<RawDecision>>>,
	/// Stream answers in order, `None` fails the call; an exhausted script answers an empty diff
	pub streams: Mutex<VecDeque<Option<DecisionStream>>>,
	pub queries: Mutex<Vec<DecisionStreamQuery>>,
	pub live_calls: AtomicUsize,
	pub push_status: AtomicU16,
	pub pushed: Mutex<Vec<UsageMetricsReport>>,
}

impl Default for ScriptedLapi {
	fn default() -> Self {
		Self {
			live: Mutex::new(Some(Vec::new())),
			streams: Mutex::new(VecDeque::new()),
			queries: Mutex::new(Vec::new()),
			live_calls: AtomicUsize::new(0),
			push_status: AtomicU16::new(200),
			pushed: Mutex::new(Vec::new()),
		}
	}
}

impl ScriptedLapi {
	pub fn with_live(decisions: Vec<RawDecision>) -> Arc<Self> {
		let lapi = Self::default();
		*lapi.live.lock().unwrap() = Some(decisions);
		Arc::new(lapi)
	}

	pub fn push_stream(&self, answer: Option<DecisionStream>) {
		self.streams.lock().unwrap().push_back(answer);
	}

	pub fn live_calls(&self) -> usize {
		self.live_calls.load(Ordering::SeqCst)
	}

	pub fn first_fetch_flags(&self) -> Vec<bool> {
		self.queries.lock().unwrap().iter().map(|query| query.is_first_fetch).collect()
	}
}

#[async_trait]
impl LapiClient for ScriptedLapi {
	async fn check_connection_health(&self) -> ConnectionHealth {
		ConnectionHealth::ok()
	}

	async fn get_decisions_matching_ip(&self, _ip: &IpAddr) -> WdResult<Vec<RawDecision>> {
		self.live_calls.fetch_add(1, Ordering::SeqCst);
		self.live.lock().unwrap().clone().ok_or(Error::NetworkError("scripted failure".into()))
	}

	async fn get_decision_stream(&self, query: &DecisionStreamQuery) -> WdResult<DecisionStream> {
		self.queries.lock().unwrap().push(query.clone());
		match self.streams.lock().unwrap().pop_front() {
			Some(Some(stream)) => Ok(stream),
			Some(None) => Err(Error::NetworkError("scripted failure".into())),
			None => Ok(DecisionStream::default()),
		}
	}

	async fn push_usage_metrics(&self, report: &UsageMetricsReport) -> WdResult<u16> {
		let status = self.push_status.load(Ordering::SeqCst);
		if (200..300).contains(&status) {
			self.pushed.lock().unwrap().push(report.clone());
		}
		Ok(status)
	}
}

/// Phrases `phrase0`, `phrase1`, ...
#[derive(Debug, Default)]
pub struct FixedCaptcha {
	issued: AtomicUsize,
}

impl CaptchaGenerator for FixedCaptcha {
	fn create(&self) -> WdResult<CaptchaChallenge> {
		let n = self.issued.fetch_add(1, Ordering::SeqCst);
		Ok(CaptchaChallenge {
			phrase: format!("phrase{}", n).into(),
			inline_image: format!("data:image/png;base64,image{}", n).into(),
		})
	}
}

pub fn warden(lapi: Arc<ScriptedLapi>, config: WardenConfig) -> Warden {
	setup_test_logging();
	WardenBuilder::new(lapi)
		.config(config)
		.captcha_generator(Arc::new(FixedCaptcha::default()))
		.build()
		.unwrap()
}

pub fn stream_config() -> WardenConfig {
	WardenConfig { stream_mode: true, ..WardenConfig::default() }
}

// vim: ts=4
