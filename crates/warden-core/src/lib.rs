//! Decision cache and remediation engine.
//!
//! Answers "what should happen to this client address" from a locally cached
//! view of upstream security decisions. The cache is either filled on demand
//! (live mode) or kept in sync through periodic stream diffs (stream mode).
//!
//! The engine owns no timers: the embedder drives
//! [`Warden::refresh_decisions`] and [`Warden::push_usage_metrics`].

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod bucket;
pub mod cache;
pub mod captcha;
pub mod config;
pub mod duration;
pub mod engine;
pub mod metrics;
pub mod normalize;
pub mod prelude;
pub mod resolver;
pub mod stream;

pub use config::{BouncingLevel, WardenConfig};
pub use engine::{CaptchaOutcome, CaptchaSubmission, Warden, WardenBuilder};
pub use resolver::Resolution;
pub use stream::{RefreshOptions, RefreshOutcome};

// vim: ts=4
