//! Streaming downloads from the remote store to local disk.
//!
//! Files land next to their final path with a `.part` suffix and are
//! renamed only after the byte count checks out, so a crash or dropped
//! connection never leaves a half-written file where the player or the
//! importer would pick it up.

mod manager;

#[cfg(test)]
mod manager_test;

pub use manager::{DownloadError, DownloadEvent, Downloader, FetchedProject};
