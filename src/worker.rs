// Launching the apply worker on its own thread.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

use anyhow::{Result, anyhow};
use tracing::{error, info};

use crate::apply::{ApplyEngine, ApplySummary, PgTarget, Session, SessionManager, Target};
use crate::config::FollowerConfig;
use crate::error::FollowerError;
use crate::logical_replication::stream::{LogicalReplicationStream, ReplicationStream};

/// Sending half of the one-shot configuration handoff.
pub struct ConfigSender(SyncSender<FollowerConfig>);

/// Receiving half, owned by the worker.
pub struct ConfigReceiver(Receiver<FollowerConfig>);

pub fn config_handoff() -> (ConfigSender, ConfigReceiver) {
    let (tx, rx) = mpsc::sync_channel(1);
    (ConfigSender(tx), ConfigReceiver(rx))
}

impl ConfigSender {
    pub fn send(self, config: FollowerConfig) -> Result<()> {
        self.0
            .send(config)
            .map_err(|_| anyhow!("worker is gone before its configuration was handed over"))
    }
}

impl ConfigReceiver {
    /// Take the configuration; it must already have been handed over.
    pub fn take(self) -> Result<FollowerConfig, FollowerError> {
        self.0.try_recv().map_err(|_| {
            FollowerError::Configuration("no session configuration was handed to the worker".into())
        })
    }
}

/// A running worker. It stops on its own once the shutdown flag it was
/// launched with is set.
pub struct WorkerHandle {
    thread: JoinHandle<Result<ApplySummary>>,
}

impl WorkerHandle {
    pub fn join(self) -> Result<ApplySummary> {
        join_worker(self.thread)
    }
}

fn join_worker(thread: JoinHandle<Result<ApplySummary>>) -> Result<ApplySummary> {
    thread
        .join()
        .map_err(|_| anyhow!("apply worker panicked"))?
}

/// Start a worker against real connections. Returns once the session is
/// streaming, or with the startup failure.
pub fn launch(config: FollowerConfig, shutdown: Arc<AtomicBool>) -> Result<WorkerHandle> {
    launch_with(config, shutdown, connect)
}

fn connect(config: &FollowerConfig) -> Result<(Session<LogicalReplicationStream>, PgTarget)> {
    let target = PgTarget::connect(&config.target)?;
    let session = SessionManager::open(config)?;
    Ok((session, target))
}

/// Like [`launch`], with the connection step supplied by the caller.
pub fn launch_with<S, T, F>(
    config: FollowerConfig,
    shutdown: Arc<AtomicBool>,
    connect: F,
) -> Result<WorkerHandle>
where
    S: ReplicationStream + 'static,
    T: Target + 'static,
    F: FnOnce(&FollowerConfig) -> Result<(Session<S>, T)> + Send + 'static,
{
    let (config_tx, config_rx) = config_handoff();
    let (ready_tx, ready_rx) = mpsc::sync_channel::<()>(1);
    config_tx.send(config)?;

    let thread = thread::Builder::new()
        .name("pg_follower apply".to_string())
        .spawn(move || worker_main(config_rx, ready_tx, shutdown, connect))?;

    match ready_rx.recv() {
        Ok(()) => {
            info!("apply worker started");
            Ok(WorkerHandle { thread })
        }
        // The worker dropped its ready signal: it failed during startup.
        Err(_) => match join_worker(thread) {
            Err(e) => Err(e),
            Ok(_) => Err(anyhow!("apply worker exited before reporting readiness")),
        },
    }
}

fn worker_main<S, T, F>(
    config_rx: ConfigReceiver,
    ready: SyncSender<()>,
    shutdown: Arc<AtomicBool>,
    connect: F,
) -> Result<ApplySummary>
where
    S: ReplicationStream,
    T: Target,
    F: FnOnce(&FollowerConfig) -> Result<(Session<S>, T)>,
{
    let config = config_rx.take()?;
    let (session, target) = connect(&config).map_err(|e| {
        error!(error = %e, "apply worker could not start");
        e
    })?;
    // The launcher may have stopped waiting; nothing to do about it here.
    let _ = ready.send(());
    drop(ready);

    let mut engine = ApplyEngine::new(session, target, shutdown, config.wait_timeout);
    engine.run()
}
