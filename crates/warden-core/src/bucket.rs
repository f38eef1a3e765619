//! Cache Key Derivation
//!
//! Maps decisions and lookup addresses onto cache keys. Single addresses are
//! keyed by themselves; ranges are fanned out over fixed-size address buckets
//! so that a point lookup of any member address finds the range.
//!
//! - IPv4 buckets group 256 consecutive addresses (address >> 8)
//! - IPv6 buckets group one /64 (address >> 64)

use ipnet::IpNet;
use std::fmt;
use std::net::IpAddr;

use warden_types::decision::{CachableDecision, SCOPE_IP, SCOPE_RANGE};

use crate::prelude::*;

/// Bits dropped from an IPv4 address to get its bucket index
pub const IPV4_BUCKET_SHIFT: u32 = 8;
/// Bits dropped from an IPv6 address to get its bucket index
pub const IPV6_BUCKET_SHIFT: u32 = 64;

/// Storage key of a cache entry holding decisions
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum CacheKey {
	/// Single address
	Ip(IpAddr),
	/// IPv4 bucket of 256 addresses
	Ipv4Bucket(u32),
	/// IPv6 bucket of one /64
	Ipv6Bucket(u64),
	/// Any other scope, keyed verbatim; never matched by address lookups
	Other { scope: Box<str>, value: Box<str> },
}

impl CacheKey {
	/// Key of a single address
	pub fn from_ip(addr: &IpAddr) -> Self {
		CacheKey::Ip(addr.to_canonical())
	}

	/// Bucket an address falls into
	pub fn bucket_of(addr: &IpAddr) -> Self {
		match addr.to_canonical() {
			IpAddr::V4(ip) => CacheKey::Ipv4Bucket(u32::from(ip) >> IPV4_BUCKET_SHIFT),
			IpAddr::V6(ip) => CacheKey::Ipv6Bucket((u128::from(ip) >> IPV6_BUCKET_SHIFT) as u64),
		}
	}

	/// Keys to read when resolving an address: the address itself, then its bucket
	pub fn lookup_keys(addr: &IpAddr) -> [Self; 2] {
		[Self::from_ip(addr), Self::bucket_of(addr)]
	}

	/// Every bucket a range overlaps, or an error when there are more than `max_buckets`
	pub fn covering_buckets(net: &IpNet, max_buckets: usize) -> WdResult<Vec<Self>> {
		let too_wide =
			|| Error::ValidationError(format!("range {} spans more than {} buckets", net, max_buckets));

		match net.trunc() {
			IpNet::V4(net) => {
				let first = u32::from(net.network()) >> IPV4_BUCKET_SHIFT;
				let last = u32::from(net.broadcast()) >> IPV4_BUCKET_SHIFT;
				if (last - first) as usize >= max_buckets {
					return Err(too_wide());
				}
				Ok((first..=last).map(CacheKey::Ipv4Bucket).collect())
			}
			IpNet::V6(net) => {
				let first = (u128::from(net.network()) >> IPV6_BUCKET_SHIFT) as u64;
				let last = (u128::from(net.broadcast()) >> IPV6_BUCKET_SHIFT) as u64;
				if usize::try_from(last - first).map_or(true, |span| span >= max_buckets) {
					return Err(too_wide());
				}
				Ok((first..=last).map(CacheKey::Ipv6Bucket).collect())
			}
		}
	}

	/// Keys a decision is stored under, and must be removed from
	pub fn for_decision(decision: &CachableDecision, max_buckets: usize) -> WdResult<Vec<Self>> {
		match &*decision.scope {
			SCOPE_IP => {
				let addr: IpAddr = decision.value.parse()?;
				Ok(vec![Self::from_ip(&addr)])
			}
			SCOPE_RANGE => {
				let net: IpNet = decision.value.parse()?;
				Self::covering_buckets(&net, max_buckets)
			}
			scope => Ok(vec![CacheKey::Other { scope: scope.into(), value: decision.value.clone() }]),
		}
	}

	/// Whether entries under this key hold range decisions
	pub fn is_bucket(&self) -> bool {
		matches!(self, CacheKey::Ipv4Bucket(_) | CacheKey::Ipv6Bucket(_))
	}

	/// Key level name for logging
	pub fn level_name(&self) -> &'static str {
		match self {
			CacheKey::Ip(_) => "ip",
			CacheKey::Ipv4Bucket(_) => "ipv4_bucket",
			CacheKey::Ipv6Bucket(_) => "ipv6_bucket",
			CacheKey::Other { .. } => "other",
		}
	}
}

impl fmt::Display for CacheKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CacheKey::Ip(addr) => write!(f, "decision_ip_{}", addr),
			CacheKey::Ipv4Bucket(idx) => write!(f, "decision_range_v4_{}", idx),
			CacheKey::Ipv6Bucket(idx) => write!(f, "decision_range_v6_{:016x}", idx),
			CacheKey::Other { scope, value } => write!(f, "decision_{}_{}", scope, value),
		}
	}
}


// vim: ts=4
