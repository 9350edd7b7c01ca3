// LogicalReplicationStream: the walsender connection in CopyBoth mode

use std::os::unix::io::RawFd;
use std::time::Duration;

use anyhow::{Result, anyhow};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, poll};
use tracing::{debug, info};

use crate::error::FollowerError;
use crate::logical_replication::slot::Slot;
use crate::lsn::Lsn;

/// Result of a non-blocking read from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receive {
    /// One complete replication message.
    Message(Vec<u8>),
    /// Nothing buffered right now.
    Empty,
    /// The sender finished the copy stream.
    EndOfStream,
}

/// The duplex channel the apply engine drives.
pub trait ReplicationStream {
    fn receive(&mut self) -> Result<Receive>;
    fn send(&mut self, data: &[u8]) -> Result<()>;
    /// Block until the stream is readable or `timeout` elapses.
    fn wait(&mut self, timeout: Duration) -> Result<()>;
    /// Leave copy mode in an orderly fashion.
    fn end_streaming(&mut self) -> Result<()>;
}

pub struct LogicalReplicationStream {
    pub conn: libpq::Connection,
    pub slot_name: String,
    pub start_lsn: Lsn,
}

impl LogicalReplicationStream {
    /// Open a replication connection (`replication=database`).
    pub fn connect(conninfo: &str) -> Result<Self> {
        let conninfo = with_replication_param(conninfo);
        let conn = libpq::Connection::new(&conninfo)
            .map_err(|e| FollowerError::Connection(format!("could not connect to the publisher: {e}")))?;
        Ok(Self {
            conn,
            slot_name: String::new(),
            start_lsn: Lsn::INVALID,
        })
    }

    fn last_error(&self) -> String {
        self.conn
            .error_message()
            .map(|msg| msg.trim().to_string())
            .unwrap_or_default()
    }

    fn exec_command(&mut self, command: &str, expected: libpq::Status) -> Result<()> {
        debug!(command, "replication command");
        let res = self.conn.exec(command);
        if res.status() != expected {
            return Err(FollowerError::Connection(format!(
                "{command} failed: status {:?}, error: {}",
                res.status(),
                self.last_error()
            ))
            .into());
        }
        Ok(())
    }

    pub fn create_slot(&mut self, slot: &Slot) -> Result<()> {
        self.exec_command(&slot.create_command(), libpq::Status::TuplesOk)?;
        self.slot_name = slot.name.clone();
        info!(slot = %slot.name, plugin = %slot.plugin, "created temporary replication slot");
        Ok(())
    }

    /// Start replication and return a stream ready to pull messages.
    pub fn start(&mut self, slot: &Slot, start_lsn: Lsn) -> Result<()> {
        self.exec_command(&slot.start_command(start_lsn), libpq::Status::CopyBoth)?;
        self.slot_name = slot.name.clone();
        self.start_lsn = start_lsn;
        info!(slot = %slot.name, %start_lsn, "started logical replication");
        Ok(())
    }

    /// Inspect the connection after a read found no data.
    fn copy_state(&mut self) -> Result<Receive> {
        match self.conn.result() {
            None => Ok(Receive::EndOfStream),
            Some(res) => match res.status() {
                libpq::Status::CopyBoth => Ok(Receive::Empty),
                libpq::Status::CopyIn | libpq::Status::CommandOk => Ok(Receive::EndOfStream),
                status => Err(FollowerError::Connection(format!(
                    "replication stream failed: status {status:?}, error: {}",
                    self.last_error()
                ))
                .into()),
            },
        }
    }
}

impl ReplicationStream for LogicalReplicationStream {
    fn receive(&mut self) -> Result<Receive> {
        let _ = self.conn.consume_input();
        match self.conn.copy_data(true) {
            Ok(msg) if msg.is_empty() => Ok(Receive::Empty),
            Ok(msg) => Ok(Receive::Message(msg.to_vec())),
            Err(_) => self.copy_state(),
        }
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.conn.put_copy_data(data)?;
        self.conn.flush()?;
        Ok(())
    }

    fn wait(&mut self, timeout: Duration) -> Result<()> {
        let fd = self
            .conn
            .socket()
            .map_err(|e| anyhow!("replication connection has no socket: {e:?}"))?;
        poll_readable(fd, timeout)
    }

    fn end_streaming(&mut self) -> Result<()> {
        self.conn
            .put_copy_end(None)
            .map_err(|e| anyhow!("could not end the copy stream: {e:?}"))?;
        self.conn.flush()?;
        // Discard whatever the sender still had in flight.
        while self.conn.copy_data(false).is_ok() {}
        while let Some(res) = self.conn.result() {
            match res.status() {
                libpq::Status::CopyOut | libpq::Status::CopyBoth | libpq::Status::CopyIn => break,
                status => debug!(?status, "replication stream closed"),
            }
        }
        Ok(())
    }
}

/// Wait up to `timeout` for `fd` to become readable. An interrupted wait
/// counts as a timeout.
fn poll_readable(fd: RawFd, timeout: Duration) -> Result<()> {
    let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
    let millis = timeout.as_millis().min(i32::MAX as u128) as i32;
    match poll(&mut fds, millis) {
        Ok(_) | Err(Errno::EINTR) => Ok(()),
        Err(errno) => Err(anyhow!("poll on the replication socket failed: {errno}")),
    }
}

fn with_replication_param(conninfo: &str) -> String {
    let mut conninfo = conninfo.trim().to_string();
    if !conninfo.contains("replication=") {
        if conninfo.starts_with("postgres://") || conninfo.starts_with("postgresql://") {
            // URI format
            if conninfo.contains('?') {
                conninfo.push_str("&replication=database");
            } else {
                conninfo.push_str("?replication=database");
            }
        } else {
            // Key-value format
            if !conninfo.is_empty() && !conninfo.ends_with(' ') {
                conninfo.push(' ');
            }
            conninfo.push_str("replication=database");
        }
    }
    conninfo
}

#[cfg(test)]
mod tests {
    use super::{poll_readable, with_replication_param};
    use std::io::Write;
    use std::os::unix::io::AsRawFd;
    use std::os::unix::net::UnixStream;
    use std::time::{Duration, Instant};

    #[test]
    fn test_poll_readable_times_out_on_idle_socket() {
        let (reader, _writer) = UnixStream::pair().unwrap();
        let started = Instant::now();
        poll_readable(reader.as_raw_fd(), Duration::from_millis(50)).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_poll_readable_returns_when_data_is_pending() {
        let (reader, mut writer) = UnixStream::pair().unwrap();
        writer.write_all(b"k").unwrap();
        let started = Instant::now();
        poll_readable(reader.as_raw_fd(), Duration::from_secs(5)).unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_with_replication_param_kv() {
        let base = "host=localhost dbname=test user=foo";
        let out = with_replication_param(base);
        assert!(out.contains("replication=database"));
        assert!(out.starts_with("host=localhost"));
        assert!(out.contains("user=foo"));
    }

    #[test]
    fn test_with_replication_param_kv_already_present() {
        let base = "host=localhost dbname=test replication=database user=foo";
        let out = with_replication_param(base);
        let count = out.matches("replication=database").count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_with_replication_param_uri() {
        let base = "postgresql://foo@localhost/test";
        let out = with_replication_param(base);
        assert!(out.starts_with("postgresql://foo@localhost/test"));
        assert!(out.ends_with("?replication=database"));
    }

    #[test]
    fn test_with_replication_param_uri_with_query() {
        let base = "postgresql://foo@localhost/test?sslmode=disable";
        let out = with_replication_param(base);
        assert!(out.ends_with("&replication=database"));
    }
}
