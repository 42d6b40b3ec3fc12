//! Remote document store client.
//!
//! [`RemoteStore`] is the trait the rest of the engine is generic over;
//! [`HttpRemoteStore`] implements it against a drive-shaped REST API with
//! bearer-token auth. The trait keeps the orchestrator, download manager
//! and session testable with a mock.

mod client;
mod error;
mod types;


pub use client::{HttpRemoteStore, StaticToken, TokenProvider};
pub use error::{RemoteError, RemoteResult};
pub use types::{ByteStream, FileHandle, FileKind, RemoteStore};

#[cfg(test)]
pub use types::MockRemoteStore;
