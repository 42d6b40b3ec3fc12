//! The sync engine: one-shot full passes and the interactive browse flow.

mod error;
mod orchestrator;
pub mod paths;
mod report;
mod session;


pub use error::SyncError;
pub use orchestrator::SyncEngine;
pub use report::{SyncFailure, SyncReport};
pub use session::{ImportState, SyncSession};
