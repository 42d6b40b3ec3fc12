//! Local store for study projects.
//!
//! The sync engine only talks to the store through the [`LocalStore`]
//! trait: project-id enumeration, snapshot export, and transactional
//! snapshot writeback. The SQLite implementation in `sqlite/` additionally
//! carries the study-action mutators (review, bookmark, playback position)
//! the rest of the app uses between syncs.

mod error;
mod models;
mod sqlite;
mod store;


pub use error::{DbError, DbResult};
pub use models::Project;
pub use sqlite::SqliteStore;
pub use store::LocalStore;
