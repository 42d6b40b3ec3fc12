//! Interactive browse-and-import state, consumed by (but independent of)
//! any UI layer.
//!
//! Tracks where the user is in the remote folder tree, which files they
//! have staged, and how far the current import has progressed. All remote
//! work happens through the same client the orchestrator uses.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::error::SyncError;
use crate::db::{DbError, LocalStore};
use crate::download::{DownloadError, DownloadEvent, Downloader};
use crate::manifest::parse_manifest;
use crate::remote::{FileHandle, RemoteStore};

/// Where the import sub-flow currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportState {
    Idle,
    DownloadingManifest,
    DownloadingAudio,
    Importing,
    Done {
        project_id: String,
        audio_skipped: bool,
    },
    Failed {
        message: String,
    },
}

pub struct SyncSession<R, S> {
    remote: R,
    store: S,
    audio_dir: PathBuf,
    signed_in: bool,
    root_id: Option<String>,
    // Visited folders below the root; empty means we are at the root.
    stack: Vec<FileHandle>,
    entries: Vec<FileHandle>,
    staged_manifest: Option<FileHandle>,
    staged_audio: Option<FileHandle>,
    import_state: ImportState,
    // Shared with the event-forwarding task during an audio download.
    download_progress: Arc<Mutex<Option<(u64, u64)>>>,
    last_message: Option<String>,
}

impl<R: RemoteStore, S: LocalStore> SyncSession<R, S> {
    pub fn new(remote: R, store: S, audio_dir: PathBuf) -> Self {
        Self {
            remote,
            store,
            audio_dir,
            signed_in: false,
            root_id: None,
            stack: Vec::new(),
            entries: Vec::new(),
            staged_manifest: None,
            staged_audio: None,
            import_state: ImportState::Idle,
            download_progress: Arc::new(Mutex::new(None)),
            last_message: None,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.signed_in
    }

    pub fn entries(&self) -> &[FileHandle] {
        &self.entries
    }

    pub fn breadcrumb(&self) -> Vec<&str> {
        self.stack.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn staged_manifest(&self) -> Option<&FileHandle> {
        self.staged_manifest.as_ref()
    }

    pub fn staged_audio(&self) -> Option<&FileHandle> {
        self.staged_audio.as_ref()
    }

    pub fn import_state(&self) -> &ImportState {
        &self.import_state
    }

    /// Bytes received and total of the current import's audio download.
    /// `None` until the first chunk arrives; reset when a new import
    /// starts.
    pub fn download_progress(&self) -> Option<(u64, u64)> {
        self.download_progress.lock().ok().and_then(|slot| *slot)
    }

    fn set_download_progress(&self, value: Option<(u64, u64)>) {
        if let Ok(mut slot) = self.download_progress.lock() {
            *slot = value;
        }
    }

    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }

    /// Resolve the root folder and list it. Must succeed before any
    /// navigation.
    pub async fn connect(&mut self) -> Result<(), SyncError> {
        let root = self.remote.get_or_create_root_folder().await?;
        self.entries = self.remote.list(&root, None).await?;
        self.root_id = Some(root);
        self.signed_in = true;
        self.stack.clear();
        Ok(())
    }

    fn current_folder_id(&self) -> Option<&str> {
        self.stack
            .last()
            .map(|f| f.id.as_str())
            .or(self.root_id.as_deref())
    }

    async fn refresh(&mut self) -> Result<(), SyncError> {
        let Some(folder) = self.current_folder_id().map(str::to_owned) else {
            return Ok(());
        };
        self.entries = self.remote.list(&folder, None).await?;
        Ok(())
    }

    /// Descend into a folder from the current listing.
    pub async fn open_folder(&mut self, folder_id: &str) -> Result<(), SyncError> {
        let Some(folder) = self
            .entries
            .iter()
            .find(|f| f.id == folder_id && f.is_folder)
            .cloned()
        else {
            return Ok(());
        };
        self.entries = self.remote.list(&folder.id, None).await?;
        self.stack.push(folder);
        Ok(())
    }

    /// Go up one level; a no-op at the root.
    pub async fn go_back(&mut self) -> Result<(), SyncError> {
        if self.stack.pop().is_none() {
            return Ok(());
        }
        self.refresh().await
    }

    pub async fn go_to_root(&mut self) -> Result<(), SyncError> {
        self.stack.clear();
        self.refresh().await
    }

    /// Stage or unstage a file from the current listing. Manifests and
    /// audio occupy separate slots; tapping a staged file again clears it,
    /// staging another file of the same kind replaces it.
    pub fn toggle_selection(&mut self, file_id: &str) {
        let Some(file) = self
            .entries
            .iter()
            .find(|f| f.id == file_id && !f.is_folder)
            .cloned()
        else {
            return;
        };
        let slot = if file.name.ends_with(".json") {
            &mut self.staged_manifest
        } else if file.name.ends_with(".mp3") {
            &mut self.staged_audio
        } else {
            return;
        };
        *slot = match slot.take() {
            Some(prev) if prev.id == file.id => None,
            _ => Some(file),
        };
    }

    pub fn clear_staging(&mut self) {
        self.staged_manifest = None;
        self.staged_audio = None;
    }

    /// Download and import the staged selection. Manifest trouble is
    /// fatal; a failed audio download still imports, flagged as skipped.
    pub async fn import_staged(&mut self, cancel: CancellationToken) -> Result<(), SyncError> {
        match self.run_import(cancel).await {
            Ok((project_id, audio_skipped)) => {
                self.clear_staging();
                self.last_message = Some(if audio_skipped {
                    format!("Imported {project_id} (audio missing)")
                } else {
                    format!("Imported {project_id}")
                });
                self.import_state = ImportState::Done {
                    project_id,
                    audio_skipped,
                };
                Ok(())
            }
            Err(err) => {
                let err = err.normalize();
                self.import_state = ImportState::Failed {
                    message: err.to_string(),
                };
                Err(err)
            }
        }
    }

    async fn run_import(
        &mut self,
        cancel: CancellationToken,
    ) -> Result<(String, bool), SyncError> {
        let manifest_file = self
            .staged_manifest
            .clone()
            .ok_or(SyncError::NothingStaged)?;
        self.set_download_progress(None);

        self.import_state = ImportState::DownloadingManifest;
        let bytes = self.remote.download_bytes(&manifest_file.id).await?;
        let snapshot = parse_manifest(&bytes)?;

        let previous_audio = match self.store.local_audio_path(&snapshot.id).await {
            Ok(path) => path,
            Err(DbError::NotFound { .. }) => None,
            Err(err) => return Err(err.into()),
        };

        let mut audio_skipped = false;
        let audio_path = match self.staged_audio.clone() {
            Some(audio_file) => {
                self.import_state = ImportState::DownloadingAudio;
                let dest = self.audio_dir.join(format!("{}.mp3", snapshot.id));
                match self.download_audio(cancel, &audio_file, &dest).await {
                    Ok(()) => Some(dest),
                    Err(DownloadError::Cancelled) => return Err(SyncError::Cancelled),
                    Err(err) => {
                        warn!(project = %snapshot.id, error = %err, "audio download failed, importing without audio");
                        audio_skipped = true;
                        None
                    }
                }
            }
            None => None,
        };

        self.import_state = ImportState::Importing;
        self.store
            .import_or_replace_snapshot(&snapshot, audio_path.as_deref())
            .await?;
        if let (Some(old), Some(new)) = (previous_audio.as_deref(), audio_path.as_deref()) {
            if old != new {
                self.store.delete_local_audio_file(old).await;
            }
        }
        info!(project = %snapshot.id, audio = audio_path.is_some(), "project imported");
        Ok((snapshot.id, audio_skipped))
    }

    /// Download the staged audio file, mirroring chunk progress into the
    /// slot `download_progress` reads from.
    async fn download_audio(
        &self,
        cancel: CancellationToken,
        audio_file: &FileHandle,
        dest: &Path,
    ) -> Result<(), DownloadError> {
        let (events, mut event_rx) = mpsc::unbounded_channel();
        let progress = Arc::clone(&self.download_progress);
        let tracker = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                if let DownloadEvent::Progress { received, total, .. } = event {
                    if let Ok(mut slot) = progress.lock() {
                        *slot = Some((received, total));
                    }
                }
            }
        });

        let downloader = Downloader::new(cancel.child_token()).with_events(events);
        let outcome = downloader
            .download_to_file(&self.remote, audio_file, dest)
            .await;
        // Dropping the downloader closes the channel and ends the task.
        drop(downloader);
        let _ = tracker.await;
        outcome.map(|_| ())
    }
}
