//! One full sync pass: upload local projects, then download and merge
//! remote ones.
//!
//! The pipeline is deliberately linear. Per-project failures are recorded
//! in the [`SyncReport`] and never abort the batch; only failing to reach
//! the remote root at all (or the local store as a whole) ends the pass.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::SyncError;
use super::report::SyncReport;
use crate::db::LocalStore;
use crate::download::Downloader;
use crate::manifest::{AUDIO_FILE_NAME, MANIFEST_FILE_NAME, parse_manifest, to_json_bytes};
use crate::merge::merge;
use crate::remote::{FileHandle, FileKind, RemoteError, RemoteStore};

/// Fraction of the progress range the upload phase occupies; the
/// download phase gets the rest.
const UPLOAD_SLICE: f64 = 0.4;

enum DownloadOutcome {
    Merged,
    Imported { with_audio: bool },
}

/// How a phase ended. Cancellation is not an error at this level; the
/// pass returns whatever it finished so far.
enum PhaseEnd {
    Completed,
    Cancelled,
}

/// Drives full sync passes against one local store and one remote store.
///
/// `run` is single-flight: a second call while one is in progress gets
/// [`SyncError::AlreadyRunning`] immediately rather than queueing.
pub struct SyncEngine<R, S> {
    remote: R,
    store: S,
    audio_dir: PathBuf,
    staging_dir: PathBuf,
    running: tokio::sync::Mutex<()>,
}

impl<R: RemoteStore, S: LocalStore> SyncEngine<R, S> {
    pub fn new(remote: R, store: S, audio_dir: PathBuf, staging_dir: PathBuf) -> Self {
        Self {
            remote,
            store,
            audio_dir,
            staging_dir,
            running: tokio::sync::Mutex::new(()),
        }
    }

    /// Run one full pass. `progress` receives `(status_text, fraction)`
    /// with fraction in `[0, 1]`.
    ///
    /// Cancellation ends the pass between projects and still returns the
    /// report, flagged as cancelled, so the caller keeps the record of
    /// everything that completed.
    pub async fn run(
        &self,
        cancel: CancellationToken,
        progress: impl Fn(&str, f64),
    ) -> Result<SyncReport, SyncError> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| SyncError::AlreadyRunning)?;

        progress("Connecting", 0.0);
        let root = self.remote.get_or_create_root_folder().await?;

        let mut report = SyncReport::default();
        if let PhaseEnd::Cancelled = self
            .upload_phase(&root, &cancel, &progress, &mut report)
            .await?
        {
            report.cancelled = true;
            info!(summary = %report.summary(), "sync pass cancelled");
            return Ok(report);
        }
        if let PhaseEnd::Cancelled = self
            .download_phase(&root, &cancel, &progress, &mut report)
            .await?
        {
            report.cancelled = true;
            info!(summary = %report.summary(), "sync pass cancelled");
            return Ok(report);
        }

        progress("Done", 1.0);
        info!(summary = %report.summary(), "sync pass complete");
        Ok(report)
    }

    async fn upload_phase(
        &self,
        root: &str,
        cancel: &CancellationToken,
        progress: &impl Fn(&str, f64),
        report: &mut SyncReport,
    ) -> Result<PhaseEnd, SyncError> {
        let local_ids = self.store.list_project_ids().await?;
        let folders = self.remote.list(root, Some(FileKind::Folder)).await?;
        let mut folder_ids: HashMap<String, String> =
            folders.into_iter().map(|f| (f.name, f.id)).collect();

        let total = local_ids.len().max(1) as f64;
        for (i, project_id) in local_ids.iter().enumerate() {
            if cancel.is_cancelled() {
                return Ok(PhaseEnd::Cancelled);
            }
            progress(
                &format!("Uploading {project_id}"),
                UPLOAD_SLICE * i as f64 / total,
            );
            match self.upload_project(root, project_id, &mut folder_ids).await {
                Ok(()) => {
                    report.uploaded.insert(project_id.clone());
                }
                Err(err) => {
                    let err = err.normalize();
                    if matches!(err, SyncError::Cancelled) {
                        return Ok(PhaseEnd::Cancelled);
                    }
                    self.clear_stale_reference(project_id, &err).await?;
                    warn!(project = %project_id, error = %err, "project upload failed");
                    report.record_failure(project_id, err.to_string());
                }
            }
        }
        Ok(PhaseEnd::Completed)
    }

    /// A remote folder that vanished leaves a dangling correlation id
    /// behind; dropping it lets the next pass recreate the folder.
    async fn clear_stale_reference(
        &self,
        project_id: &str,
        err: &SyncError,
    ) -> Result<(), SyncError> {
        if matches!(err, SyncError::Remote(RemoteError::NotFound { .. })) {
            warn!(project = %project_id, "remote folder is gone, clearing the stale reference");
            self.store.set_remote_id(project_id, None).await?;
        }
        Ok(())
    }

    async fn upload_project(
        &self,
        root: &str,
        project_id: &str,
        folder_ids: &mut HashMap<String, String>,
    ) -> Result<(), SyncError> {
        let snapshot = self.store.export_snapshot(project_id).await?;
        let manifest_bytes = to_json_bytes(&snapshot)?;

        let folder_id = match folder_ids.get(project_id) {
            Some(id) => id.clone(),
            None => {
                let created = self.remote.create_folder(root, project_id).await?;
                folder_ids.insert(project_id.to_string(), created.id.clone());
                created.id
            }
        };
        self.store
            .set_remote_id(project_id, Some(&folder_id))
            .await?;

        self.remote
            .upload(&folder_id, MANIFEST_FILE_NAME, "application/json", manifest_bytes)
            .await?;

        let audio = self.store.local_audio_path(project_id).await?;
        let audio = match audio {
            Some(path) => path,
            None => {
                info!(project = %project_id, "no audio uploaded");
                return Ok(());
            }
        };
        if !fs::try_exists(&audio).await.unwrap_or(false) {
            info!(project = %project_id, "no audio uploaded");
            return Ok(());
        }

        // Audio never changes after generation, so re-uploading an
        // already-present file is skipped.
        let existing = self.remote.list(&folder_id, Some(FileKind::File)).await?;
        if existing.iter().any(|f| f.name == AUDIO_FILE_NAME) {
            debug!(project = %project_id, "remote audio already present");
            return Ok(());
        }
        let data = fs::read(&audio)
            .await
            .map_err(|e| SyncError::io(&audio, e))?;
        let mime = mime_guess::from_path(&audio)
            .first_or_octet_stream()
            .to_string();
        self.remote
            .upload(&folder_id, AUDIO_FILE_NAME, &mime, data)
            .await?;
        Ok(())
    }

    async fn download_phase(
        &self,
        root: &str,
        cancel: &CancellationToken,
        progress: &impl Fn(&str, f64),
        report: &mut SyncReport,
    ) -> Result<PhaseEnd, SyncError> {
        let folders = self.remote.list(root, Some(FileKind::Folder)).await?;
        let local_ids: HashSet<String> = self.store.list_project_ids().await?.into_iter().collect();

        let total = folders.len().max(1) as f64;
        for (i, folder) in folders.iter().enumerate() {
            if cancel.is_cancelled() {
                return Ok(PhaseEnd::Cancelled);
            }
            progress(
                &format!("Downloading {}", folder.name),
                UPLOAD_SLICE + (1.0 - UPLOAD_SLICE) * i as f64 / total,
            );
            match self.sync_remote_folder(folder, &local_ids, cancel).await {
                Ok(DownloadOutcome::Merged) => {
                    report.downloaded.insert(folder.name.clone());
                    report.merged.insert(folder.name.clone());
                }
                Ok(DownloadOutcome::Imported { with_audio }) => {
                    report.downloaded.insert(folder.name.clone());
                    report.newly_imported.insert(folder.name.clone());
                    if with_audio {
                        report.audio_files_downloaded += 1;
                    }
                }
                Err(err) => {
                    let err = err.normalize();
                    if matches!(err, SyncError::Cancelled) {
                        return Ok(PhaseEnd::Cancelled);
                    }
                    self.clear_stale_reference(&folder.name, &err).await?;
                    warn!(project = %folder.name, error = %err, "remote project sync failed");
                    report.record_failure(&folder.name, err.to_string());
                }
            }
        }
        Ok(PhaseEnd::Completed)
    }

    async fn sync_remote_folder(
        &self,
        folder: &FileHandle,
        local_ids: &HashSet<String>,
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome, SyncError> {
        if local_ids.contains(&folder.name) {
            self.merge_remote_project(folder).await?;
            return Ok(DownloadOutcome::Merged);
        }

        let downloader = Downloader::new(cancel.child_token());
        let fetched = downloader
            .fetch_project_folder(&self.remote, folder, &self.staging_dir)
            .await?;
        let snapshot = parse_manifest(&fetched.manifest)?;
        if snapshot.id != folder.name {
            warn!(
                folder = %folder.name,
                manifest_id = %snapshot.id,
                "folder name and manifest id disagree, trusting the manifest"
            );
        }

        let audio_path = match fetched.audio_path {
            Some(staged) => {
                let dest = self.audio_dir.join(format!("{}.mp3", snapshot.id));
                fs::create_dir_all(&self.audio_dir)
                    .await
                    .map_err(|e| SyncError::io(&self.audio_dir, e))?;
                fs::rename(&staged, &dest)
                    .await
                    .map_err(|e| SyncError::io(&dest, e))?;
                Some(dest)
            }
            None => None,
        };

        self.store
            .import_or_replace_snapshot(&snapshot, audio_path.as_deref())
            .await?;
        self.store
            .set_remote_id(&snapshot.id, Some(&folder.id))
            .await?;
        Ok(DownloadOutcome::Imported {
            with_audio: audio_path.is_some(),
        })
    }

    /// Merge the remote manifest into the existing local project. Local
    /// wins on content, progress moves monotonically forward.
    async fn merge_remote_project(&self, folder: &FileHandle) -> Result<(), SyncError> {
        let files = self
            .remote
            .list(&folder.id, Some(FileKind::File))
            .await?;
        let manifest_file = files
            .iter()
            .find(|f| f.name == MANIFEST_FILE_NAME)
            .ok_or_else(|| {
                SyncError::Download(crate::download::DownloadError::MissingManifest {
                    folder: folder.name.clone(),
                })
            })?;
        let bytes = self.remote.download_bytes(&manifest_file.id).await?;
        let remote_snapshot = parse_manifest(&bytes)?;

        let local_snapshot = self.store.export_snapshot(&folder.name).await?;
        let merged = merge(&local_snapshot, &remote_snapshot);
        self.store.import_or_replace_snapshot(&merged, None).await?;
        Ok(())
    }
}
