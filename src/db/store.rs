//! The store contract the sync engine depends on.

use std::path::{Path, PathBuf};

use crate::db::DbResult;
use crate::manifest::ProjectManifest;

/// Read/write operations the sync engine needs from a local store.
///
/// `export_snapshot` is a pure read; `import_or_replace_snapshot` is
/// idempotent and atomic - create if absent, else replace the project's
/// content rows and apply the already-merged progress fields as one unit.
pub trait LocalStore {
    /// All local project ids.
    async fn list_project_ids(&self) -> DbResult<Vec<String>>;

    /// Full denormalized snapshot of one project.
    async fn export_snapshot(&self, project_id: &str) -> DbResult<ProjectManifest>;

    /// Where the project's audio lives locally, if it has any.
    async fn local_audio_path(&self, project_id: &str) -> DbResult<Option<PathBuf>>;

    /// Record which remote folder a project correlates to, or clear the
    /// reference with `None` when that folder no longer exists.
    async fn set_remote_id(&self, project_id: &str, remote_id: Option<&str>) -> DbResult<()>;

    /// Write a snapshot back as a single transaction.
    ///
    /// `audio_path` updates the project's local audio reference when given;
    /// `None` leaves any existing reference untouched.
    async fn import_or_replace_snapshot(
        &self,
        snapshot: &ProjectManifest,
        audio_path: Option<&Path>,
    ) -> DbResult<()>;

    /// Best-effort removal of a project's local audio file.
    async fn delete_local_audio_file(&self, path: &Path);
}
