use anyhow::Result;

use crate::encode::{Relation, RowChange};
use crate::lsn::Lsn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputType {
    #[default]
    Textual,
    Binary,
}

/// Options negotiated when the decoding session starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputOptions {
    pub output_type: OutputType,
}

/// The decoded transaction an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxnContext {
    pub xid: u32,
    /// Position of the transaction's first change.
    pub first_lsn: Lsn,
}

/// Receives decoding events, one method per event, in commit order.
pub trait OutputHandler {
    fn startup(&mut self, options: &mut OutputOptions) -> Result<()>;
    fn begin(&mut self, txn: &TxnContext) -> Result<()>;
    fn change(
        &mut self,
        txn: &TxnContext,
        lsn: Lsn,
        relation: &Relation,
        change: &RowChange,
    ) -> Result<()>;
    fn commit(&mut self, txn: &TxnContext, commit_lsn: Lsn) -> Result<()>;
    /// A logical message. `txn` is `None` for non-transactional messages.
    fn message(
        &mut self,
        txn: Option<&TxnContext>,
        lsn: Lsn,
        transactional: bool,
        prefix: &str,
        content: &[u8],
    ) -> Result<()>;
}
