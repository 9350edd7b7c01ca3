pub mod capture;
pub mod description;
pub mod guard;

pub use capture::{
    CaptureOutcome, CaptureSession, CatalogLookup, DDL_MESSAGE_PREFIX, DdlCapture, NoCatalog,
    PersistenceLookup, publish,
};
pub use description::{
    ColumnDefinition, ColumnType, DdlDescription, DropBehavior, DropDescription, DropTarget,
    Persistence, TableElement,
};
pub use guard::verify;
