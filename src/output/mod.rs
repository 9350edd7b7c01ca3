pub mod framer;
pub mod handler;
pub mod writer;

pub use framer::{BEGIN_STATEMENT, COMMIT_STATEMENT, StatementFramer};
pub use handler::{OutputHandler, OutputOptions, OutputType, TxnContext};
pub use writer::{OutputWriter, XLogDataWriter};
