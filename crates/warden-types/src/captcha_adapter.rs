//! Captcha flow state and the pluggable challenge generator.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::prelude::*;

/// A freshly generated challenge
#[derive(Debug, Clone)]
pub struct CaptchaChallenge {
	pub phrase: Box<str>,
	/// Rendered challenge, ready to be inlined (e.g. a `data:` URI)
	pub inline_image: Box<str>,
}

/// Per-address interactive challenge state
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptchaFlow {
	pub phrase_to_guess: Box<str>,
	pub inline_image: Box<str>,
	pub must_be_resolved: bool,
	pub resolution_failed: bool,
}

impl CaptchaFlow {
	/// A pending flow for a new challenge
	pub fn pending(challenge: CaptchaChallenge) -> Self {
		Self {
			phrase_to_guess: challenge.phrase,
			inline_image: challenge.inline_image,
			must_be_resolved: true,
			resolution_failed: false,
		}
	}

	pub fn is_resolved(&self) -> bool {
		!self.must_be_resolved
	}
}

/// Source of captcha challenges
pub trait CaptchaGenerator: Debug + Send + Sync {
	fn create(&self) -> WdResult<CaptchaChallenge>;
}

// vim: ts=4
