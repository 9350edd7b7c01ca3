// One replication session: the stream, its slot, and the progress state.

use anyhow::Result;
use tracing::info;

use crate::apply::feedback::{FeedbackState, Watermarks};
use crate::config::FollowerConfig;
use crate::logical_replication::slot::Slot;
use crate::logical_replication::stream::{LogicalReplicationStream, ReplicationStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connected,
    Streaming,
    Draining,
    Closed,
}

pub struct Session<S: ReplicationStream> {
    pub stream: S,
    pub slot: Slot,
    pub watermarks: Watermarks,
    pub feedback: FeedbackState,
    state: SessionState,
}

impl<S: ReplicationStream> Session<S> {
    /// A session over a stream that is already in copy mode.
    pub fn streaming(stream: S, slot: Slot, feedback: FeedbackState) -> Self {
        Session {
            stream,
            slot,
            watermarks: Watermarks::default(),
            feedback,
            state: SessionState::Streaming,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transition(&mut self, next: SessionState) {
        if self.state != next {
            info!(slot = %self.slot.name, from = ?self.state, to = ?next, "session state change");
            self.state = next;
        }
    }
}

pub struct SessionManager;

impl SessionManager {
    /// Connect, create the temporary slot, and start streaming from the
    /// configured position.
    pub fn open(config: &FollowerConfig) -> Result<Session<LogicalReplicationStream>> {
        let slot = Slot::new(&config.slot_name, &config.plugin_name);
        let stream = LogicalReplicationStream::connect(&config.upstream)?;
        let mut session = Session {
            stream,
            slot,
            watermarks: Watermarks::default(),
            feedback: FeedbackState::new(config.status_interval_secs),
            state: SessionState::Idle,
        };
        session.transition(SessionState::Connected);

        session.stream.create_slot(&session.slot)?;
        session.stream.start(&session.slot, config.start_lsn)?;
        session.transition(SessionState::Streaming);
        Ok(session)
    }
}
