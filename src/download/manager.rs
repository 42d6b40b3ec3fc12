use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use miette::Diagnostic;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::manifest::{AUDIO_FILE_NAME, MANIFEST_FILE_NAME};
use crate::remote::{FileHandle, FileKind, RemoteError, RemoteStore};

#[derive(Error, Debug, Diagnostic)]
pub enum DownloadError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Remote(#[from] RemoteError),

    #[error("File error at {path}: {source}")]
    #[diagnostic(code(taalsync::download::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Download truncated: expected {expected} bytes, got {actual}")]
    #[diagnostic(code(taalsync::download::size_mismatch))]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("Project folder {folder} has no {MANIFEST_FILE_NAME}")]
    #[diagnostic(code(taalsync::download::missing_manifest))]
    MissingManifest { folder: String },

    #[error("Download cancelled")]
    #[diagnostic(code(taalsync::download::cancelled))]
    Cancelled,
}

impl DownloadError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Progress notifications for listeners such as a UI progress bar.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    Started {
        file_id: String,
        name: String,
        total: u64,
    },
    Progress {
        file_id: String,
        received: u64,
        total: u64,
    },
    Completed {
        file_id: String,
        path: PathBuf,
    },
    Failed {
        file_id: String,
        message: String,
    },
}

/// Everything fetched from one remote project folder. Audio is best
/// effort; a missing or failed audio download is reported, not fatal.
#[derive(Debug)]
pub struct FetchedProject {
    pub manifest: Vec<u8>,
    pub audio_path: Option<PathBuf>,
    pub audio_skipped: Option<String>,
}

pub struct Downloader {
    events: Option<UnboundedSender<DownloadEvent>>,
    cancel: CancellationToken,
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

impl Downloader {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            events: None,
            cancel,
        }
    }

    pub fn with_events(mut self, sender: UnboundedSender<DownloadEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    fn emit(&self, event: DownloadEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.send(event);
        }
    }

    /// Stream a remote file to `dest`. On any failure the partial file is
    /// removed before the error is returned.
    pub async fn download_to_file<R: RemoteStore>(
        &self,
        remote: &R,
        file: &FileHandle,
        dest: &Path,
    ) -> Result<u64, DownloadError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }

        let part = part_path(dest);
        let result = self.stream_to_part(remote, file, &part).await;
        match result {
            Ok(received) => {
                fs::rename(&part, dest)
                    .await
                    .map_err(|e| DownloadError::io(dest, e))?;
                debug!(file_id = %file.id, bytes = received, dest = %dest.display(), "download complete");
                self.emit(DownloadEvent::Completed {
                    file_id: file.id.clone(),
                    path: dest.to_path_buf(),
                });
                Ok(received)
            }
            Err(err) => {
                if let Err(e) = fs::remove_file(&part).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %part.display(), error = %e, "failed to remove partial download");
                    }
                }
                self.emit(DownloadEvent::Failed {
                    file_id: file.id.clone(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn stream_to_part<R: RemoteStore>(
        &self,
        remote: &R,
        file: &FileHandle,
        part: &Path,
    ) -> Result<u64, DownloadError> {
        if self.cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        let (mut stream, total) = remote.download_stream(&file.id, None).await?;
        self.emit(DownloadEvent::Started {
            file_id: file.id.clone(),
            name: file.name.clone(),
            total,
        });

        let mut out = fs::File::create(part)
            .await
            .map_err(|e| DownloadError::io(part, e))?;
        let mut received: u64 = 0;
        loop {
            let chunk = tokio::select! {
                _ = self.cancel.cancelled() => return Err(DownloadError::Cancelled),
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk?;
            out.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(part, e))?;
            received += chunk.len() as u64;
            self.emit(DownloadEvent::Progress {
                file_id: file.id.clone(),
                received,
                total,
            });
        }
        out.flush().await.map_err(|e| DownloadError::io(part, e))?;

        if received != total {
            return Err(DownloadError::SizeMismatch {
                expected: total,
                actual: received,
            });
        }
        Ok(received)
    }

    /// Fetch a project folder: the manifest in memory (required) and the
    /// audio file into `staging_dir` (optional).
    pub async fn fetch_project_folder<R: RemoteStore>(
        &self,
        remote: &R,
        folder: &FileHandle,
        staging_dir: &Path,
    ) -> Result<FetchedProject, DownloadError> {
        let entries = remote.list(&folder.id, Some(FileKind::File)).await?;
        let manifest_file = entries
            .iter()
            .find(|f| f.name == MANIFEST_FILE_NAME)
            .ok_or_else(|| DownloadError::MissingManifest {
                folder: folder.name.clone(),
            })?;
        let manifest = remote.download_bytes(&manifest_file.id).await?;

        let Some(audio_file) = entries.iter().find(|f| f.name == AUDIO_FILE_NAME) else {
            return Ok(FetchedProject {
                manifest,
                audio_path: None,
                audio_skipped: None,
            });
        };

        let safe_name = sanitize_filename::sanitize(&folder.name);
        let dest = staging_dir.join(format!("{safe_name}.mp3"));
        match self.download_to_file(remote, audio_file, &dest).await {
            Ok(_) => Ok(FetchedProject {
                manifest,
                audio_path: Some(dest),
                audio_skipped: None,
            }),
            Err(DownloadError::Cancelled) => Err(DownloadError::Cancelled),
            Err(err) => {
                warn!(folder = %folder.name, error = %err, "audio download failed, importing without audio");
                Ok(FetchedProject {
                    manifest,
                    audio_path: None,
                    audio_skipped: Some(err.to_string()),
                })
            }
        }
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
