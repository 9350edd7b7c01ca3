// Linearizes a decoded transaction into `BEGIN;`, one statement per change or
// captured DDL message, and `COMMIT;`.

use anyhow::Result;
use tracing::{debug, warn};

use crate::ddl::DDL_MESSAGE_PREFIX;
use crate::encode::{Relation, RowChange, encode_change};
use crate::lsn::Lsn;
use crate::output::handler::{OutputHandler, OutputOptions, OutputType, TxnContext};
use crate::output::writer::OutputWriter;

pub const BEGIN_STATEMENT: &str = "BEGIN;";
pub const COMMIT_STATEMENT: &str = "COMMIT;";

pub struct StatementFramer<W: OutputWriter> {
    writer: W,
    prefix: String,
}

impl<W: OutputWriter> StatementFramer<W> {
    pub fn new(writer: W) -> Self {
        StatementFramer {
            writer,
            prefix: DDL_MESSAGE_PREFIX.to_string(),
        }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl<W: OutputWriter> OutputHandler for StatementFramer<W> {
    fn startup(&mut self, options: &mut OutputOptions) -> Result<()> {
        options.output_type = OutputType::Textual;
        Ok(())
    }

    fn begin(&mut self, txn: &TxnContext) -> Result<()> {
        self.writer.write(txn.first_lsn, BEGIN_STATEMENT.as_bytes())
    }

    fn change(
        &mut self,
        _txn: &TxnContext,
        lsn: Lsn,
        relation: &Relation,
        change: &RowChange,
    ) -> Result<()> {
        let statement = encode_change(relation, change);
        debug!(%lsn, %statement, "encoded row change");
        self.writer.write(lsn, statement.as_bytes())
    }

    fn commit(&mut self, _txn: &TxnContext, commit_lsn: Lsn) -> Result<()> {
        self.writer.write(commit_lsn, COMMIT_STATEMENT.as_bytes())
    }

    fn message(
        &mut self,
        txn: Option<&TxnContext>,
        lsn: Lsn,
        transactional: bool,
        prefix: &str,
        content: &[u8],
    ) -> Result<()> {
        if prefix != self.prefix {
            return Ok(());
        }
        if !transactional || txn.is_none() {
            warn!(%lsn, prefix, "dropping non-transactional DDL message");
            return Ok(());
        }
        self.writer.write(lsn, content)
    }
}
