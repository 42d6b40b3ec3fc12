//! Domain models for the local store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One imported study unit: audio/video plus transcript and explanations.
///
/// `id` is the stable identity used for remote correlation (it names the
/// project's remote folder). `name` is display-only, user-editable, and
/// never used for matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    /// Remote folder id, once known. Cleared when the folder disappears.
    pub remote_id: Option<String>,
    pub name: String,
    pub sentence_count: i64,
    /// Absolute path of the downloaded audio file, if any.
    pub audio_path: Option<String>,
    pub imported_at: DateTime<Utc>,
    pub last_played_at: Option<DateTime<Utc>>,
    /// Index of the sentence the learner last studied.
    pub last_sentence_index: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
