pub use warden_types::error::{Error, WdResult};
pub use warden_types::types::{Remediation, Timestamp};

pub use tracing::{debug, error, info, trace, warn};

// vim: ts=4
