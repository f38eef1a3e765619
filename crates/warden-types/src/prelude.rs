pub use crate::error::{Error, WdResult};
pub use crate::types::{Remediation, Timestamp};

pub use tracing::{debug, error, info, trace, warn};

// vim: ts=4
