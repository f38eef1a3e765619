//! Remediation Resolver
//!
//! Reduces the decisions applying to an address to the single remediation to
//! serve. The order is total: bypass < captcha < ban. Unknown decision types
//! rank as the configured fallback remediation.

use ipnet::IpNet;
use serde::Serialize;
use std::net::IpAddr;

use warden_types::decision::{CachedDecision, ORIGIN_CLEAN};

use crate::prelude::*;

/// Effective remediation for an address and the origin of the decision behind it
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Resolution {
	pub remediation: Remediation,
	pub origin: Box<str>,
}

impl Resolution {
	/// Resolution of an address nothing applies to
	pub fn clean(remediation: Remediation) -> Self {
		Self { remediation, origin: ORIGIN_CLEAN.into() }
	}
}

/// Parse and canonicalize a client address. Ranges are rejected.
pub fn parse_ip(raw: &str) -> WdResult<IpAddr> {
	let raw = raw.trim();
	match raw.parse::<IpAddr>() {
		Ok(ip) => Ok(ip.to_canonical()),
		Err(_) if raw.parse::<IpNet>().is_ok() => {
			Err(Error::InvalidIp(format!("{} is a range, a single address is required", raw)))
		}
		Err(e) => Err(Error::InvalidIp(format!("{}: {}", raw, e))),
	}
}

/// Reduce live decisions to one resolution
///
/// When `captcha_resolved` is set, captcha decisions rank as bypass: the client
/// already solved its challenge.
pub fn reduce(
	decisions: &[CachedDecision],
	now: Timestamp,
	fallback: Remediation,
	captcha_resolved: bool,
) -> Resolution {
	let mut winner: Option<(Remediation, &CachedDecision)> = None;

	for decision in decisions.iter().filter(|decision| !decision.is_expired(now)) {
		let remediation = match decision.remediation() {
			Some(Remediation::Captcha) if captcha_resolved => Remediation::Bypass,
			Some(remediation) => remediation,
			None => fallback,
		};
		if winner.is_none_or(|(best, _)| remediation > best) {
			winner = Some((remediation, decision));
		}
	}

	match winner {
		Some((remediation, decision)) => {
			Resolution { remediation, origin: decision.origin.clone() }
		}
		None => Resolution::clean(fallback),
	}
}


// vim: ts=4
