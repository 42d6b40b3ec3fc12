use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;

use super::error::RemoteResult;

/// Byte chunks of a remote file body, surfaced lazily so large audio
/// never has to sit in memory whole.
pub type ByteStream = BoxStream<'static, RemoteResult<Bytes>>;

/// Restricts a listing to one kind of entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Folder,
    File,
}

/// Metadata for one remote file or folder.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FileHandle {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}

/// Operations the sync engine needs from a cloud document store.
///
/// Folder ids come from earlier listings or from
/// `get_or_create_root_folder`; implementations retry transient failures
/// internally, callers see only final results.
#[cfg_attr(test, automock)]
pub trait RemoteStore: Send + Sync {
    /// List the direct children of a folder, optionally filtered by kind.
    async fn list(&self, folder_id: &str, kind: Option<FileKind>)
    -> RemoteResult<Vec<FileHandle>>;

    /// Fetch a small file (manifests) fully into memory.
    async fn download_bytes(&self, file_id: &str) -> RemoteResult<Vec<u8>>;

    /// Open a streaming download, optionally resuming from a byte offset.
    /// Returns the stream together with the total size of the file.
    async fn download_stream(
        &self,
        file_id: &str,
        range_start: Option<u64>,
    ) -> RemoteResult<(ByteStream, u64)>;

    /// Upload `content` as `name` inside `folder_id`, replacing any
    /// existing file with the same name.
    async fn upload(
        &self,
        folder_id: &str,
        name: &str,
        mime_type: &str,
        content: Vec<u8>,
    ) -> RemoteResult<FileHandle>;

    /// Create a folder under `parent_id`.
    async fn create_folder(&self, parent_id: &str, name: &str) -> RemoteResult<FileHandle>;

    /// Find the app's root sync folder, creating it on first use.
    async fn get_or_create_root_folder(&self) -> RemoteResult<String>;
}
