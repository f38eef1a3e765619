//! Decision duration parsing
//!
//! Upstream durations are Go-style strings such as `"3h59m49.48s"`, `"-30s"`
//! or `"150ms"`. They are turned into signed milliseconds here and never
//! travel further as strings.

use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::prelude::*;

static DURATION_RE: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
	Regex::new(r"^(-)?(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)(?:\.(\d+))?(ms|s))?$")
});

/// A signed span of time with millisecond precision
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct SignedDuration(i64);

impl SignedDuration {
	pub const fn from_millis(millis: i64) -> Self {
		Self(millis)
	}

	pub const fn from_secs(secs: i64) -> Self {
		Self(secs.saturating_mul(1000))
	}

	pub const fn as_millis(self) -> i64 {
		self.0
	}

	pub const fn is_negative(self) -> bool {
		self.0 < 0
	}
}

impl FromStr for SignedDuration {
	type Err = Error;

	fn from_str(s: &str) -> WdResult<Self> {
		parse_duration(s)
	}
}

fn component(caps: &regex::Captures<'_>, idx: usize, unit_ms: i64, raw: &str) -> WdResult<i64> {
	let Some(m) = caps.get(idx) else {
		return Ok(0);
	};
	m.as_str()
		.parse::<i64>()
		.ok()
		.and_then(|n| n.checked_mul(unit_ms))
		.ok_or_else(|| Error::InvalidDuration(format!("{:?} is out of range", raw)))
}

/// Parse a duration string into signed milliseconds
///
/// Fractions of a second are truncated to millisecond precision.
pub fn parse_duration(raw: &str) -> WdResult<SignedDuration> {
	let re = DURATION_RE
		.as_ref()
		.map_err(|e| Error::Internal(format!("duration pattern failed to compile: {}", e)))?;
	let caps = re
		.captures(raw)
		.ok_or_else(|| Error::InvalidDuration(format!("{:?} is not a duration", raw)))?;

	let hours = component(&caps, 2, 3_600_000, raw)?;
	let minutes = component(&caps, 3, 60_000, raw)?;
	let is_millis = caps.get(6).is_some_and(|unit| unit.as_str() == "ms");
	let (seconds, fraction) = if is_millis {
		(component(&caps, 4, 1, raw)?, 0)
	} else {
		let fraction = caps.get(5).map_or(0, |frac| {
			// keep three digits, right-padded: ".48" is 480 ms
			let digits: String = frac.as_str().chars().chain("000".chars()).take(3).collect();
			digits.parse::<i64>().unwrap_or(0)
		});
		(component(&caps, 4, 1000, raw)?, fraction)
	};

	let millis = hours
		.checked_add(minutes)
		.and_then(|ms| ms.checked_add(seconds))
		.and_then(|ms| ms.checked_add(fraction))
		.ok_or_else(|| Error::InvalidDuration(format!("{:?} is out of range", raw)))?;

	let sign = if caps.get(1).is_some() { -1 } else { 1 };
	Ok(SignedDuration(sign * millis))
}


// vim: ts=4
