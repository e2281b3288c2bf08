pub mod config;
pub mod controller;
mod loop_worker;
pub mod poll;
pub mod summary;

pub use config::{PollConfig, RunnerConfig};
pub use controller::{RunnerPhase, SessionRunner, StopOutcome};
pub use summary::summarize;
