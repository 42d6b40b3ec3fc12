use std::collections::BTreeSet;

/// One project that could not be synced; the pass continues without it.
#[derive(Debug, Clone)]
pub struct SyncFailure {
    pub project_id: String,
    pub message: String,
}

/// Outcome of one full sync pass.
///
/// A project id can appear in several sets: everything fetched in the
/// download phase is in `downloaded`, and additionally in `merged` or
/// `newly_imported` depending on whether it already existed locally.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub uploaded: BTreeSet<String>,
    pub downloaded: BTreeSet<String>,
    pub merged: BTreeSet<String>,
    pub newly_imported: BTreeSet<String>,
    pub audio_files_downloaded: usize,
    pub failures: Vec<SyncFailure>,
    /// The pass stopped early on cancellation; the sets above cover what
    /// completed before the stop.
    pub cancelled: bool,
}

impl SyncReport {
    pub fn success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    pub fn record_failure(&mut self, project_id: impl Into<String>, message: impl Into<String>) {
        self.failures.push(SyncFailure {
            project_id: project_id.into(),
            message: message.into(),
        });
    }

    /// One-line summary for logs and the CLI.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} uploaded, {} merged, {} new, {} audio file(s), {} failed",
            self.uploaded.len(),
            self.merged.len(),
            self.newly_imported.len(),
            self.audio_files_downloaded,
            self.failures.len()
        );
        if self.cancelled {
            line.push_str(" (cancelled)");
        }
        line
    }
}
