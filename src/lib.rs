//! Timed webcam sampling sessions: each cycle records a short clip, sends it
//! to a remote emotion-analysis service, polls for the result and logs it.
//! Stopping a session produces a summary with a coarse productivity state.

pub mod analysis;
pub mod capture;
pub mod classifier;
mod cli;
pub mod db;
pub mod error;
pub mod models;
pub mod session;
pub mod settings;
pub mod store;
mod utils;

pub use cli::run;
pub use error::{CycleFailure, PersistenceError, TrackerError};
