//! SQLite implementation of the local store.

mod connection;
mod progress;
mod snapshot;


pub use connection::SqliteStore;
