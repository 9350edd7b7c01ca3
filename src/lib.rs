//! Main library entry point for pg-follower.

pub mod apply;
pub mod args;
pub mod config;
pub mod ddl;
pub mod encode;
pub mod error;
pub mod logical_replication;
pub mod lsn;
pub mod output;
pub mod parse;
pub mod pg_query_parser;
pub mod table;
pub mod worker;

// Re-export key types for ergonomic access

pub use self::table::*;
pub use apply::{ApplyEngine, ApplySummary, StopReason};
pub use config::FollowerConfig;
pub use error::{FollowerError, RejectReason};
pub use lsn::Lsn;
pub use parse::*;

use anyhow::Result;
use std::sync::{Arc, atomic::AtomicBool};

/// Run one apply worker until the stream ends or `shutdown` is set.
pub fn run_follow(config: FollowerConfig, shutdown: Arc<AtomicBool>) -> Result<ApplySummary> {
    let worker = worker::launch(config, shutdown)?;
    worker.join()
}
