pub mod message;
pub mod slot;
pub mod stream;

pub use message::{
    PrimaryKeepAlive, ReplicationMessage, StandbyStatusUpdate, XLogData, pg_timestamp,
};
pub use slot::{DEFAULT_PLUGIN_NAME, DEFAULT_SLOT_NAME, Slot};
pub use stream::{LogicalReplicationStream, Receive, ReplicationStream};
