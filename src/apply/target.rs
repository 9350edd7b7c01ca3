// The downstream database statements are replayed into.

use anyhow::Result;
use tracing::info;

use crate::error::FollowerError;

/// Result class of one executed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// A utility command (CREATE, DROP, TRUNCATE, ...) completed.
    Utility(String),
    Insert { rows: u64 },
    /// Any other successful command, named by its tag.
    Other(String),
}

impl CommandOutcome {
    /// Classify a command completion tag such as `INSERT 0 1` or `CREATE TABLE`.
    pub fn from_tag(tag: &str) -> Self {
        let mut words = tag.split_whitespace();
        match words.next() {
            Some("INSERT") => CommandOutcome::Insert {
                rows: words.last().and_then(|n| n.parse().ok()).unwrap_or(0),
            },
            Some("SELECT" | "UPDATE" | "DELETE" | "MERGE" | "FETCH" | "MOVE" | "COPY") | None => {
                CommandOutcome::Other(tag.to_string())
            }
            Some(_) => CommandOutcome::Utility(tag.to_string()),
        }
    }
}

/// A transactional execution context on the downstream.
pub trait Target {
    fn begin(&mut self) -> Result<()>;
    fn execute(&mut self, statement: &str) -> Result<CommandOutcome>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;
}

pub struct PgTarget {
    conn: libpq::Connection,
}

impl PgTarget {
    pub fn connect(conninfo: &str) -> Result<Self> {
        let conn = libpq::Connection::new(conninfo)
            .map_err(|e| FollowerError::Connection(format!("could not connect to the target: {e}")))?;
        info!("connected to target");
        Ok(PgTarget { conn })
    }

    fn last_error(&self) -> String {
        self.conn
            .error_message()
            .map(|msg| msg.trim().to_string())
            .unwrap_or_default()
    }

    fn run(&mut self, statement: &str) -> Result<CommandOutcome> {
        let res = self.conn.exec(statement);
        match res.status() {
            libpq::Status::CommandOk | libpq::Status::TuplesOk => {
                let tag = res.cmd_status().ok().flatten().unwrap_or_default();
                Ok(CommandOutcome::from_tag(&tag))
            }
            libpq::Status::EmptyQuery => Ok(CommandOutcome::Other(String::new())),
            status => Err(FollowerError::apply(
                statement,
                format!("status {status:?}: {}", self.last_error()),
            )
            .into()),
        }
    }
}

impl Target for PgTarget {
    fn begin(&mut self) -> Result<()> {
        self.run("BEGIN")?;
        Ok(())
    }

    fn execute(&mut self, statement: &str) -> Result<CommandOutcome> {
        self.run(statement)
    }

    fn commit(&mut self) -> Result<()> {
        // An aborted transaction answers COMMIT with a ROLLBACK tag.
        match self.run("COMMIT")? {
            CommandOutcome::Utility(tag) if tag == "COMMIT" => Ok(()),
            outcome => Err(FollowerError::apply("COMMIT", format!("transaction ended with {outcome:?}")).into()),
        }
    }

    fn rollback(&mut self) -> Result<()> {
        self.run("ROLLBACK")?;
        Ok(())
    }
}
