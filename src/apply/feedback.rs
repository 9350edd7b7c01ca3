// Position tracking and the acknowledgment throttle.

use std::time::{Duration, Instant, SystemTime};

use crate::logical_replication::message::{StandbyStatusUpdate, pg_timestamp};
use crate::lsn::Lsn;

/// The three positions tracked per session. Each only moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Watermarks {
    pub received: Lsn,
    pub written: Lsn,
    pub flushed: Lsn,
}

impl Watermarks {
    pub fn observe(&mut self, lsn: Lsn) {
        self.received = self.received.max(lsn);
    }

    /// Everything received so far has been committed on the target.
    pub fn mark_durable(&mut self) {
        self.written = self.written.max(self.received);
        self.flushed = self.flushed.max(self.received);
    }
}

#[derive(Debug, Clone)]
pub struct FeedbackState {
    /// `None` disables non-forced sends.
    status_interval: Option<Duration>,
    last_send: Option<Instant>,
    last_write: Lsn,
    last_flush: Lsn,
    last_apply: Lsn,
}

impl FeedbackState {
    /// `status_interval_secs <= 0` disables opportunistic feedback.
    pub fn new(status_interval_secs: i64) -> Self {
        let status_interval = u64::try_from(status_interval_secs)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        FeedbackState {
            status_interval,
            last_send: None,
            last_write: Lsn::INVALID,
            last_flush: Lsn::INVALID,
            last_apply: Lsn::INVALID,
        }
    }

    pub fn last_sent(&self) -> (Lsn, Lsn, Lsn) {
        (self.last_write, self.last_flush, self.last_apply)
    }

    /// Decide whether to acknowledge now, and with what.
    pub fn next_update(
        &mut self,
        marks: &Watermarks,
        force: bool,
        reply_requested: bool,
        now: Instant,
        wall_clock: SystemTime,
    ) -> Option<StandbyStatusUpdate> {
        if !force {
            let interval = self.status_interval?;
            let unchanged = marks.written == self.last_write && marks.flushed == self.last_flush;
            let recent = self
                .last_send
                .is_some_and(|sent| now.saturating_duration_since(sent) < interval);
            if unchanged && recent {
                return None;
            }
        }

        self.last_write = self.last_write.max(marks.written);
        self.last_flush = self.last_flush.max(marks.flushed);
        self.last_apply = self.last_apply.max(marks.received);
        self.last_send = Some(now);

        Some(StandbyStatusUpdate {
            write_lsn: self.last_write,
            flush_lsn: self.last_flush,
            apply_lsn: self.last_apply,
            timestamp: pg_timestamp(wall_clock),
            reply_requested,
        })
    }
}
