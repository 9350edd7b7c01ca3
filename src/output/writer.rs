// Where framed statements go.

use std::time::SystemTime;

use anyhow::Result;

use crate::logical_replication::message::{XLogData, pg_timestamp};
use crate::lsn::Lsn;

pub trait OutputWriter {
    /// Write one complete statement produced at `lsn`.
    fn write(&mut self, lsn: Lsn, statement: &[u8]) -> Result<()>;
}

/// Wraps each statement in a `'w'` frame, as a walsender would ship it.
#[derive(Debug, Default)]
pub struct XLogDataWriter {
    frames: Vec<Vec<u8>>,
}

impl XLogDataWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_frames(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.frames)
    }
}

impl OutputWriter for XLogDataWriter {
    fn write(&mut self, lsn: Lsn, statement: &[u8]) -> Result<()> {
        let frame = XLogData {
            wal_start: lsn,
            wal_end: lsn,
            timestamp: pg_timestamp(SystemTime::now()),
            data: statement.to_vec(),
        };
        self.frames.push(frame.encode());
        Ok(())
    }
}

/// Collects statement text, for dry runs.
impl OutputWriter for Vec<String> {
    fn write(&mut self, _lsn: Lsn, statement: &[u8]) -> Result<()> {
        self.push(String::from_utf8_lossy(statement).into_owned());
        Ok(())
    }
}
