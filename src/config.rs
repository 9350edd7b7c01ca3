use std::time::Duration;

use crate::logical_replication::slot::{DEFAULT_PLUGIN_NAME, DEFAULT_SLOT_NAME};
use crate::lsn::Lsn;

pub const DEFAULT_STATUS_INTERVAL_SECS: i64 = 10;
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(1);

/// Everything one apply worker needs to run a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowerConfig {
    /// Conninfo of the publisher; `replication=database` is added when missing.
    pub upstream: String,
    pub target: String,
    pub slot_name: String,
    pub plugin_name: String,
    pub start_lsn: Lsn,
    /// Seconds between opportunistic acknowledgments; `<= 0` disables them.
    pub status_interval_secs: i64,
    pub wait_timeout: Duration,
}

impl FollowerConfig {
    pub fn new(upstream: &str, target: &str) -> Self {
        FollowerConfig {
            upstream: upstream.to_string(),
            target: target.to_string(),
            slot_name: DEFAULT_SLOT_NAME.to_string(),
            plugin_name: DEFAULT_PLUGIN_NAME.to_string(),
            start_lsn: Lsn::INVALID,
            status_interval_secs: DEFAULT_STATUS_INTERVAL_SECS,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}
