pub mod session;

pub use session::{SessionHistoryEntry, SessionRecord};
