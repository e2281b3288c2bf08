pub mod cycle;
pub mod emotion;
pub mod session;
pub mod summary;

pub use cycle::{CycleResult, CycleStatus};
pub use emotion::EmotionScores;
pub use session::{Session, SessionStatus};
pub use summary::Summary;
