//! Decision Normalizer
//!
//! Turns raw upstream decisions into lower-cased, time-bounded cache entries.
//! A bad record is logged and skipped; it never aborts the batch.

use std::time::Duration;

use warden_types::decision::{CachableDecision, ORIGIN_LISTS, RawDecision};

use crate::duration::parse_duration;
use crate::prelude::*;

/// Mode flags applied while normalizing
#[derive(Clone, Copy, Debug)]
pub struct NormalizeOptions {
	pub stream_mode: bool,
	/// Cap on non-bypass decisions in stream mode
	pub bad_ip_cache_duration: Duration,
}

fn require<'a>(field: &'static str, value: &'a str) -> WdResult<&'a str> {
	if value.is_empty() {
		return Err(Error::ValidationError(format!("decision has an empty {}", field)));
	}
	Ok(value)
}

/// Normalize one decision, computing its absolute expiry from `now`
pub fn normalize_decision(
	raw: &RawDecision,
	now: Timestamp,
	opts: &NormalizeOptions,
) -> WdResult<CachableDecision> {
	let scope = require("scope", &raw.scope)?;
	let value = require("value", &raw.value)?;
	let duration = require("duration", &raw.duration)?;
	let kind = require("type", &raw.kind)?;
	let origin = require("origin", &raw.origin)?;

	let mut expires_at = now.add_millis(parse_duration(duration)?.as_millis());

	let is_bypass = kind.eq_ignore_ascii_case(Remediation::Bypass.as_str());
	if opts.stream_mode && !is_bypass {
		let cap = now.add_millis(opts.bad_ip_cache_duration.as_millis() as i64);
		expires_at = expires_at.min(cap);
	}

	let origin = match raw.scenario.as_deref() {
		Some(scenario) if !scenario.is_empty() && origin.eq_ignore_ascii_case(ORIGIN_LISTS) => {
			format!("{}:{}", ORIGIN_LISTS, scenario)
		}
		_ => origin.to_string(),
	};

	Ok(CachableDecision::new(&origin, kind, scope, value, expires_at))
}

/// Normalize a batch, dropping (and logging) every invalid record
pub fn normalize_decisions(
	raws: &[RawDecision],
	now: Timestamp,
	opts: &NormalizeOptions,
) -> Vec<CachableDecision> {
	raws.iter()
		.filter_map(|raw| match normalize_decision(raw, now, opts) {
			Ok(decision) => Some(decision),
			Err(e) => {
				warn!(
					origin = %raw.origin,
					scope = %raw.scope,
					value = %raw.value,
					error = %e,
					"Skipping invalid decision"
				);
				None
			}
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	const LIVE: NormalizeOptions =
		NormalizeOptions { stream_mode: false, bad_ip_cache_duration: Duration::from_secs(120) };
	const STREAM: NormalizeOptions =
		NormalizeOptions { stream_mode: true, bad_ip_cache_duration: Duration::from_secs(120) };

	fn raw(origin: &str, kind: &str, scope: &str, value: &str, duration: &str) -> RawDecision {
		RawDecision {
			origin: origin.into(),
			kind: kind.into(),
			scope: scope.into(),
			value: value.into(),
			duration: duration.into(),
			scenario: None,
		}
	}

	#[test]
	fn test_normalize_basic() {
		let now = Timestamp(1_000_000);
		let decision =
			normalize_decision(&raw("cscli", "ban", "Ip", "1.2.3.4", "1h"), now, &LIVE).unwrap();

		assert_eq!(&*decision.identifier, "cscli-ban-ip-1.2.3.4");
		assert_eq!(&*decision.scope, "ip");
		assert_eq!(decision.expires_at, Timestamp(1_000_000 + 3_600_000));
	}

	#[test]
	fn test_stream_mode_caps_bad_decisions() {
		let now = Timestamp(0);
		let ban = normalize_decision(&raw("CAPI", "ban", "ip", "1.2.3.4", "4h"), now, &STREAM)
			.unwrap();
		assert_eq!(ban.expires_at, Timestamp(120_000));

		let short = normalize_decision(&raw("CAPI", "ban", "ip", "1.2.3.4", "30s"), now, &STREAM)
			.unwrap();
		assert_eq!(short.expires_at, Timestamp(30_000));

		let bypass =
			normalize_decision(&raw("cscli", "bypass", "ip", "1.2.3.4", "4h"), now, &STREAM)
				.unwrap();
		assert_eq!(bypass.expires_at, Timestamp(14_400_000));
	}

	#[test]
	fn test_list_origin_gets_scenario() {
		let mut decision = raw("lists", "ban", "ip", "1.2.3.4", "1h");
		decision.scenario = Some("tor-exit-nodes".into());
		let normalized = normalize_decision(&decision, Timestamp(0), &LIVE).unwrap();
		assert_eq!(&*normalized.origin, "lists:tor-exit-nodes");
		assert_eq!(&*normalized.identifier, "lists:tor-exit-nodes-ban-ip-1.2.3.4");

		let mut decision = raw("cscli", "ban", "ip", "1.2.3.4", "1h");
		decision.scenario = Some("manual".into());
		let normalized = normalize_decision(&decision, Timestamp(0), &LIVE).unwrap();
		assert_eq!(&*normalized.origin, "cscli");
	}

	#[test]
	fn test_batch_skips_invalid_records() {
		let batch = vec![
			raw("cscli", "ban", "ip", "1.2.3.4", "1h"),
			raw("cscli", "ban", "ip", "", "1h"),
			raw("cscli", "ban", "ip", "5.6.7.8", "garbage"),
			raw("", "ban", "ip", "5.6.7.8", "1h"),
			raw("CAPI", "captcha", "ip", "9.9.9.9", "10m"),
		];

		let normalized = normalize_decisions(&batch, Timestamp(0), &LIVE);
		let ids: Vec<&str> = normalized.iter().map(|d| &*d.identifier).collect();
		assert_eq!(ids, vec!["cscli-ban-ip-1.2.3.4", "capi-captcha-ip-9.9.9.9"]);
	}

	#[test]
	fn test_negative_duration_is_already_expired() {
		let now = Timestamp(100_000);
		let decision =
			normalize_decision(&raw("cscli", "ban", "ip", "1.2.3.4", "-30s"), now, &LIVE).unwrap();
		assert_eq!(decision.expires_at, Timestamp(70_000));
	}
}

// vim: ts=4
