pub use warden::error::{Error, WdResult};
pub use warden::types::Remediation;

pub use tracing::{debug, error, info, warn};

// vim: ts=4
