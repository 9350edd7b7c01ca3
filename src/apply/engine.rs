// The apply loop: drains replication frames, replays statements into the
// target transaction by transaction, and acknowledges committed positions.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Result, bail};
use tracing::{debug, error, info, warn};

use crate::apply::session::{Session, SessionState};
use crate::apply::statement::StatementKind;
use crate::apply::target::{CommandOutcome, Target};
use crate::error::FollowerError;
use crate::logical_replication::message::ReplicationMessage;
use crate::logical_replication::stream::{Receive, ReplicationStream};
use crate::lsn::Lsn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The publisher ended the copy stream.
    EndOfStream,
    /// Shutdown was requested and observed between transactions.
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplySummary {
    pub stop_reason: StopReason,
    pub transactions: u64,
    pub statements: u64,
    pub flushed: Lsn,
}

pub struct ApplyEngine<S: ReplicationStream, T: Target> {
    session: Session<S>,
    target: T,
    shutdown: Arc<AtomicBool>,
    wait_timeout: Duration,
    in_transaction: bool,
    transactions: u64,
    statements: u64,
}

impl<S: ReplicationStream, T: Target> ApplyEngine<S, T> {
    pub fn new(
        session: Session<S>,
        target: T,
        shutdown: Arc<AtomicBool>,
        wait_timeout: Duration,
    ) -> Self {
        ApplyEngine {
            session,
            target,
            shutdown,
            wait_timeout,
            in_transaction: false,
            transactions: 0,
            statements: 0,
        }
    }

    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn into_parts(self) -> (Session<S>, T) {
        (self.session, self.target)
    }

    /// Run until the stream ends or shutdown is requested. Any apply error is
    /// fatal: the open transaction is rolled back and the error returned.
    pub fn run(&mut self) -> Result<ApplySummary> {
        if self.session.state() != SessionState::Streaming {
            bail!(
                "apply started on a session that is not streaming ({:?})",
                self.session.state()
            );
        }
        info!(slot = %self.session.slot.name, "apply loop started");

        let stop_reason = match self.stream_loop() {
            Ok(reason) => reason,
            Err(e) => {
                error!(error = %e, "apply worker failed");
                self.abandon();
                return Err(e);
            }
        };
        self.finish(stop_reason)
    }

    fn stream_loop(&mut self) -> Result<StopReason> {
        loop {
            if self.shutdown.load(Ordering::Relaxed) && !self.in_transaction {
                info!("shutdown requested");
                return Ok(StopReason::Shutdown);
            }

            let mut received = false;
            let mut end_of_stream = false;
            loop {
                match self.session.stream.receive()? {
                    Receive::Message(buf) => {
                        received = true;
                        self.handle_message(&buf)?;
                    }
                    Receive::Empty => break,
                    Receive::EndOfStream => {
                        end_of_stream = true;
                        break;
                    }
                }
            }

            self.send_feedback(false, false)?;

            if end_of_stream {
                info!("data stream from publisher has ended");
                return Ok(StopReason::EndOfStream);
            }
            if !received {
                self.session.stream.wait(self.wait_timeout)?;
            }
        }
    }

    fn handle_message(&mut self, buf: &[u8]) -> Result<()> {
        match ReplicationMessage::parse(buf)? {
            ReplicationMessage::XLogData(xlog) => {
                self.session.watermarks.observe(xlog.wal_start);
                self.session.watermarks.observe(xlog.wal_end);
                let statement = std::str::from_utf8(&xlog.data).map_err(|e| {
                    FollowerError::Protocol(format!("statement at {} is not UTF-8: {e}", xlog.wal_start))
                })?;
                self.apply_statement(statement)?;
            }
            ReplicationMessage::PrimaryKeepAlive(keepalive) => {
                self.session.watermarks.observe(keepalive.wal_end);
                if !self.in_transaction {
                    self.session.watermarks.mark_durable();
                }
                self.send_feedback(keepalive.reply_requested, keepalive.reply_requested)?;
            }
            ReplicationMessage::Unknown(tag, _) => {
                debug!(tag = %char::from(tag), "ignoring replication message");
            }
        }
        if !self.in_transaction {
            self.session.watermarks.mark_durable();
        }
        Ok(())
    }

    fn apply_statement(&mut self, statement: &str) -> Result<()> {
        debug!(statement, "received statement");
        match StatementKind::classify(statement) {
            StatementKind::Begin => {
                if self.in_transaction {
                    return Err(FollowerError::apply(statement, "transaction already open").into());
                }
                self.target.begin()?;
                self.in_transaction = true;
            }
            StatementKind::Ddl => match self.target.execute(statement)? {
                CommandOutcome::Utility(_) => {}
                outcome => {
                    return Err(FollowerError::apply(
                        statement,
                        format!("expected a utility command result, got {outcome:?}"),
                    )
                    .into());
                }
            },
            StatementKind::Insert => match self.target.execute(statement)? {
                CommandOutcome::Insert { .. } => {}
                outcome => {
                    return Err(FollowerError::apply(
                        statement,
                        format!("expected an insert result, got {outcome:?}"),
                    )
                    .into());
                }
            },
            StatementKind::Commit => {
                if !self.in_transaction {
                    return Err(FollowerError::apply(statement, "no transaction is open").into());
                }
                self.target.commit()?;
                self.in_transaction = false;
                self.session.watermarks.mark_durable();
                self.transactions += 1;
            }
            StatementKind::Other => {
                self.target.execute(statement)?;
            }
        }
        self.statements += 1;
        Ok(())
    }

    fn send_feedback(&mut self, force: bool, reply_requested: bool) -> Result<()> {
        let update = self.session.feedback.next_update(
            &self.session.watermarks,
            force,
            reply_requested,
            Instant::now(),
            SystemTime::now(),
        );
        if let Some(update) = update {
            debug!(
                write = %update.write_lsn,
                flush = %update.flush_lsn,
                apply = %update.apply_lsn,
                force,
                "sending feedback"
            );
            self.session.stream.send(&update.encode())?;
        }
        Ok(())
    }

    fn finish(&mut self, stop_reason: StopReason) -> Result<ApplySummary> {
        self.session.transition(SessionState::Draining);
        if self.in_transaction {
            warn!("stream ended inside a transaction, rolling back");
            self.target.rollback()?;
            self.in_transaction = false;
        }
        if let Err(e) = self.send_feedback(true, false) {
            warn!(error = %e, "final feedback was not delivered");
        }
        if let Err(e) = self.session.stream.end_streaming() {
            warn!(error = %e, "could not end streaming cleanly");
        }
        self.session.transition(SessionState::Closed);

        let summary = ApplySummary {
            stop_reason,
            transactions: self.transactions,
            statements: self.statements,
            flushed: self.session.watermarks.flushed,
        };
        info!(
            reason = ?summary.stop_reason,
            transactions = summary.transactions,
            flushed = %summary.flushed,
            "apply loop stopped"
        );
        Ok(summary)
    }

    fn abandon(&mut self) {
        if self.in_transaction {
            if let Err(e) = self.target.rollback() {
                warn!(error = %e, "rollback after failure did not succeed");
            }
            self.in_transaction = false;
        }
        self.session.transition(SessionState::Closed);
    }
}
