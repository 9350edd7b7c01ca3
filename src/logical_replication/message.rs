// Replication protocol messages for logical replication

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::FollowerError;
use crate::lsn::Lsn;

/// Seconds between the Unix epoch and the PostgreSQL epoch (2000-01-01).
pub const PG_EPOCH_OFFSET_SECS: u64 = 946_684_800;

/// Microseconds since the PostgreSQL epoch, as carried in protocol timestamps.
pub fn pg_timestamp(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since_unix) => since_unix.as_micros() as i64 - (PG_EPOCH_OFFSET_SECS * 1_000_000) as i64,
        Err(_) => 0,
    }
}

#[derive(Debug, PartialEq)]
pub enum ReplicationMessage {
    XLogData(XLogData),
    PrimaryKeepAlive(PrimaryKeepAlive),
    /// Any other tag; ignored by consumers.
    Unknown(u8, Vec<u8>),
}

/// `'w'` frame: a chunk of decoded output.
#[derive(Debug, PartialEq)]
pub struct XLogData {
    pub wal_start: Lsn,
    pub wal_end: Lsn,
    pub timestamp: i64,
    pub data: Vec<u8>,
}

/// `'k'` frame: sender heartbeat.
#[derive(Debug, PartialEq)]
pub struct PrimaryKeepAlive {
    pub wal_end: Lsn,
    pub timestamp: i64,
    pub reply_requested: bool,
}

/// `'r'` frame sent back upstream to report progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandbyStatusUpdate {
    pub write_lsn: Lsn,
    pub flush_lsn: Lsn,
    pub apply_lsn: Lsn,
    pub timestamp: i64,
    pub reply_requested: bool,
}

fn read_u64(buf: &[u8], offset: usize) -> Option<u64> {
    let bytes = buf.get(offset..offset + 8)?;
    Some(u64::from_be_bytes(bytes.try_into().ok()?))
}

fn truncated(kind: &str, len: usize) -> FollowerError {
    FollowerError::Protocol(format!("{kind} message truncated ({len} bytes)"))
}

impl ReplicationMessage {
    /// Parse a replication message from a raw byte buffer.
    pub fn parse(buf: &[u8]) -> Result<Self, FollowerError> {
        let Some((&tag, body)) = buf.split_first() else {
            return Err(FollowerError::Protocol("empty replication message".to_string()));
        };
        match tag {
            b'w' => XLogData::parse(body).map(ReplicationMessage::XLogData),
            b'k' => PrimaryKeepAlive::parse(body).map(ReplicationMessage::PrimaryKeepAlive),
            other => Ok(ReplicationMessage::Unknown(other, body.to_vec())),
        }
    }
}

impl XLogData {
    /// Parse an XLogData message from the buffer (excluding the leading 'w' byte).
    pub fn parse(buf: &[u8]) -> Result<Self, FollowerError> {
        let header = |offset| read_u64(buf, offset).ok_or_else(|| truncated("XLogData", buf.len()));
        Ok(XLogData {
            wal_start: Lsn(header(0)?),
            wal_end: Lsn(header(8)?),
            timestamp: header(16)? as i64,
            data: buf[24..].to_vec(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + 8 * 3 + self.data.len());
        buf.push(b'w');
        buf.extend_from_slice(&self.wal_start.0.to_be_bytes());
        buf.extend_from_slice(&self.wal_end.0.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(&self.data);
        buf
    }
}

impl PrimaryKeepAlive {
    /// Parse a PrimaryKeepAlive message from the buffer (excluding the leading 'k' byte).
    pub fn parse(buf: &[u8]) -> Result<Self, FollowerError> {
        if buf.len() < 17 {
            return Err(truncated("PrimaryKeepAlive", buf.len()));
        }
        let wal_end = read_u64(buf, 0).ok_or_else(|| truncated("PrimaryKeepAlive", buf.len()))?;
        let timestamp = read_u64(buf, 8).ok_or_else(|| truncated("PrimaryKeepAlive", buf.len()))?;
        Ok(PrimaryKeepAlive {
            wal_end: Lsn(wal_end),
            timestamp: timestamp as i64,
            reply_requested: buf[16] != 0,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + 8 * 2 + 1);
        buf.push(b'k');
        buf.extend_from_slice(&self.wal_end.0.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.push(u8::from(self.reply_requested));
        buf
    }
}

impl StandbyStatusUpdate {
    // 'r' + 8 bytes wal_write + 8 bytes wal_flush + 8 bytes wal_apply
    //     + 8 bytes client time + 1 byte reply requested
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + 8 * 3 + 8 + 1);
        buf.push(b'r');
        buf.extend_from_slice(&self.write_lsn.0.to_be_bytes());
        buf.extend_from_slice(&self.flush_lsn.0.to_be_bytes());
        buf.extend_from_slice(&self.apply_lsn.0.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.push(u8::from(self.reply_requested));
        buf
    }

    pub fn parse(buf: &[u8]) -> Result<Self, FollowerError> {
        if buf.len() < 34 || buf[0] != b'r' {
            return Err(FollowerError::Protocol("not a standby status update".to_string()));
        }
        let field = |offset| read_u64(buf, offset).ok_or_else(|| truncated("StandbyStatusUpdate", buf.len()));
        Ok(StandbyStatusUpdate {
            write_lsn: Lsn(field(1)?),
            flush_lsn: Lsn(field(9)?),
            apply_lsn: Lsn(field(17)?),
            timestamp: field(25)? as i64,
            reply_requested: buf[33] != 0,
        })
    }
}
