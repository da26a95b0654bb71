mod event;
mod session;

pub use event::{Alert, Event, EventKind, Severity, Violation};
pub use session::{SessionRecord, SessionSnapshot, SessionStatus};
