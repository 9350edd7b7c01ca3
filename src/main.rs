//! Main binary entry point for pg-follower.

use anyhow::Result;
use pg_follower::args::{Command, get_args};
use pg_follower::ddl::{CaptureOutcome, DdlCapture, NoCatalog};
use postgres::NoTls;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn print_outcomes(outcomes: &[CaptureOutcome]) {
    for outcome in outcomes {
        match outcome {
            CaptureOutcome::Publish(text) => println!("{text}"),
            CaptureOutcome::Rejected { table, reason } => {
                println!("-- not replicated: {table}: {reason}")
            }
            CaptureOutcome::Skipped(kind) => println!("-- skipped: {kind}"),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = get_args()?;
    if let Some(config) = args.command.follower_config() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown_clone.store(true, Ordering::Relaxed);
        })?;
        let summary = pg_follower::run_follow(config, shutdown)?;
        info!(
            reason = ?summary.stop_reason,
            transactions = summary.transactions,
            statements = summary.statements,
            flushed = %summary.flushed,
            "follower stopped"
        );
        return Ok(());
    }

    match args.command {
        Command::Capture {
            uri,
            sql,
            default_schema,
        } => {
            let mut client = postgres::Client::connect(&uri, NoTls)?;
            let outcomes = DdlCapture::new(&default_schema).execute(&mut client, &sql)?;
            print_outcomes(&outcomes);
        }
        Command::Deparse {
            sql,
            default_schema,
        } => {
            let outcomes = DdlCapture::new(&default_schema).capture(&sql, &mut NoCatalog)?;
            print_outcomes(&outcomes);
        }
        Command::Follow { .. } => {}
    }
    Ok(())
}
