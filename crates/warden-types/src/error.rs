//! Error type shared by every Warden crate.

use std::fmt;

pub type WdResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	// input errors
	/// Malformed address, or a range where a single address is required
	InvalidIp(String),
	/// Duration string that does not match the duration grammar
	InvalidDuration(String),
	ValidationError(String),

	// upstream errors
	NetworkError(String),
	/// Upstream answered with a non-2xx status
	UpstreamStatus(u16),
	Unauthorized,
	Timeout,

	// storage and internals
	CacheError(String),
	Serialization(String),
	ConfigError(String),
	Internal(String),

	// externals
	Io(std::io::Error),
}

impl Error {
	/// Whether the error was produced by the upstream decision service
	pub fn is_upstream(&self) -> bool {
		matches!(
			self,
			Error::NetworkError(_) | Error::UpstreamStatus(_) | Error::Unauthorized | Error::Timeout
		)
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::InvalidIp(msg) => write!(f, "invalid ip: {}", msg),
			Error::InvalidDuration(msg) => write!(f, "invalid duration: {}", msg),
			Error::ValidationError(msg) => write!(f, "validation error: {}", msg),
			Error::NetworkError(msg) => write!(f, "network error: {}", msg),
			Error::UpstreamStatus(status) => write!(f, "unexpected upstream status: {}", status),
			Error::Unauthorized => write!(f, "upstream rejected the api key"),
			Error::Timeout => write!(f, "upstream request timed out"),
			Error::CacheError(msg) => write!(f, "cache error: {}", msg),
			Error::Serialization(msg) => write!(f, "serialization error: {}", msg),
			Error::ConfigError(msg) => write!(f, "config error: {}", msg),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Io(e) => write!(f, "io error: {}", e),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Io(e) => Some(e),
			_ => None,
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::Serialization(err.to_string())
	}
}

impl From<std::net::AddrParseError> for Error {
	fn from(err: std::net::AddrParseError) -> Self {
		Self::InvalidIp(err.to_string())
	}
}

impl From<ipnet::AddrParseError> for Error {
	fn from(err: ipnet::AddrParseError) -> Self {
		Self::InvalidIp(err.to_string())
	}
}


// vim: ts=4
