pub mod engine;
pub mod feedback;
pub mod session;
pub mod statement;
pub mod target;

pub use engine::{ApplyEngine, ApplySummary, StopReason};
pub use feedback::{FeedbackState, Watermarks};
pub use session::{Session, SessionManager, SessionState};
pub use statement::StatementKind;
pub use target::{CommandOutcome, PgTarget, Target};
