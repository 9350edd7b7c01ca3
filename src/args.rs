use clap::{Parser, Subcommand};

use crate::config::{DEFAULT_STATUS_INTERVAL_SECS, FollowerConfig};
use crate::logical_replication::slot::{DEFAULT_PLUGIN_NAME, DEFAULT_SLOT_NAME};
use crate::lsn::Lsn;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stream changes from the upstream and apply them to the target
    Follow {
        /// Upstream (publisher) connection string
        #[arg(short, long, env = "PG_FOLLOWER_UPSTREAM")]
        upstream: String,

        /// Target connection string
        #[arg(short, long, env = "PG_FOLLOWER_TARGET")]
        target: String,

        /// Name of the temporary replication slot
        #[arg(long, default_value = DEFAULT_SLOT_NAME)]
        slot: String,

        /// Output plugin the slot is bound to
        #[arg(long, default_value = DEFAULT_PLUGIN_NAME)]
        plugin: String,

        /// Position to start streaming from
        #[arg(long, default_value = "0/0")]
        start_lsn: Lsn,

        /// Seconds between status updates; 0 or less disables them
        #[arg(long, default_value_t = DEFAULT_STATUS_INTERVAL_SECS, allow_negative_numbers = true)]
        status_interval: i64,

        /// Longest wait for upstream data before re-checking for shutdown, in milliseconds
        #[arg(long, default_value_t = 1000)]
        wait_timeout_ms: u64,
    },
    /// Execute DDL on the upstream and publish it to followers
    Capture {
        /// Upstream connection URI
        #[arg(short, long, env = "PG_FOLLOWER_UPSTREAM")]
        uri: String,

        /// CREATE TABLE / DROP TABLE statements
        #[arg(short, long)]
        sql: String,

        /// Schema for unqualified table names
        #[arg(long, default_value = "public")]
        default_schema: String,
    },
    /// Print what would be published for the given DDL, without a database
    Deparse {
        #[arg(short, long)]
        sql: String,

        #[arg(long, default_value = "public")]
        default_schema: String,
    },
}

impl Command {
    /// The worker configuration for `follow`.
    pub fn follower_config(&self) -> Option<FollowerConfig> {
        match self {
            Command::Follow {
                upstream,
                target,
                slot,
                plugin,
                start_lsn,
                status_interval,
                wait_timeout_ms,
            } => Some(FollowerConfig {
                upstream: upstream.clone(),
                target: target.clone(),
                slot_name: slot.clone(),
                plugin_name: plugin.clone(),
                start_lsn: *start_lsn,
                status_interval_secs: *status_interval,
                wait_timeout: std::time::Duration::from_millis(*wait_timeout_ms),
            }),
            _ => None,
        }
    }
}

pub fn get_args() -> Result<Args, clap::Error> {
    Args::try_parse()
}
