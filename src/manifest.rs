//! The project manifest - the versioned JSON document a project travels as.
//!
//! One manifest per project lives in the project's remote folder as
//! `project.json`. It is a full denormalized snapshot: project metadata,
//! the speaker list, and every sentence with its content, progress fields
//! and nested keywords. The same type is used as the in-memory snapshot
//! exchanged with the local store and fed to the merge algorithm.
//!
//! Compatibility rule: newer fields must be additive. Readers ignore
//! unknown fields; a manifest with a version above [`SUPPORTED_MANIFEST_VERSION`]
//! is rejected for that one project only.

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest manifest version this reader understands.
pub const SUPPORTED_MANIFEST_VERSION: u32 = 1;

/// Name of the manifest file inside a project's remote folder.
pub const MANIFEST_FILE_NAME: &str = "project.json";

/// Name of the audio file inside a project's remote folder.
pub const AUDIO_FILE_NAME: &str = "audio.mp3";

/// Errors that can occur while reading or writing a manifest.
#[derive(Error, Diagnostic, Debug)]
pub enum ManifestError {
    #[error("Malformed manifest: {0}")]
    #[diagnostic(code(taalsync::manifest::malformed))]
    Malformed(#[from] serde_json::Error),

    #[error("Unsupported manifest version {found} (this reader supports up to {supported})")]
    #[diagnostic(code(taalsync::manifest::unsupported_version))]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Manifest has an empty project id")]
    #[diagnostic(code(taalsync::manifest::missing_id))]
    MissingId,
}

fn default_version() -> u32 {
    1
}

/// Full denormalized snapshot of one study project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectManifest {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Stable project id. Also the name of the project's remote folder.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub speakers: Vec<SpeakerEntry>,
    #[serde(default)]
    pub sentences: Vec<SentenceEntry>,
    #[serde(default)]
    pub progress: ProgressSummary,
}

/// A speaker identified in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerEntry {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Option<String>,
    /// True when the display name was set by hand. Manual names win merges.
    #[serde(default)]
    pub is_manual: bool,
}

/// One timestamped transcript segment.
///
/// Content fields (text, timing, translation, explanations, keywords) are
/// immutable once generated. The five progress fields are the only ones the
/// merge algorithm is allowed to touch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceEntry {
    pub id: String,
    pub index: i64,
    pub text: String,
    #[serde(default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub translation_en: Option<String>,
    #[serde(default)]
    pub explanation_nl: Option<String>,
    #[serde(default)]
    pub explanation_en: Option<String>,
    #[serde(default)]
    pub speaker_id: Option<String>,
    #[serde(default)]
    pub learned: bool,
    #[serde(default)]
    pub learn_count: i64,
    #[serde(default)]
    pub is_difficult: bool,
    #[serde(default)]
    pub review_count: i64,
    #[serde(default)]
    pub last_reviewed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub keywords: Vec<KeywordEntry>,
}

/// A keyword with its two meanings, nested under its sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub word: String,
    #[serde(default)]
    pub meaning_nl: Option<String>,
    #[serde(default)]
    pub meaning_en: Option<String>,
}

/// Project-level aggregates, recomputed from the sentence list after merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    #[serde(default)]
    pub total_sentences: usize,
    #[serde(default)]
    pub learned_sentences: usize,
    #[serde(default)]
    pub difficult_sentences: usize,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
}

impl ProjectManifest {
    /// Recompute the aggregate counts from the sentence list.
    pub fn recompute_progress(&mut self) {
        self.progress.total_sentences = self.sentences.len();
        self.progress.learned_sentences = self.sentences.iter().filter(|s| s.learned).count();
        self.progress.difficult_sentences =
            self.sentences.iter().filter(|s| s.is_difficult).count();
    }
}

/// Parse and validate manifest bytes.
///
/// # Errors
/// Returns [`ManifestError::UnsupportedVersion`] for manifests written by a
/// newer schema, [`ManifestError::MissingId`] when the project id is empty,
/// and [`ManifestError::Malformed`] for anything serde rejects.
pub fn parse_manifest(bytes: &[u8]) -> Result<ProjectManifest, ManifestError> {
    let manifest: ProjectManifest = serde_json::from_slice(bytes)?;
    if manifest.version > SUPPORTED_MANIFEST_VERSION {
        return Err(ManifestError::UnsupportedVersion {
            found: manifest.version,
            supported: SUPPORTED_MANIFEST_VERSION,
        });
    }
    if manifest.id.is_empty() {
        return Err(ManifestError::MissingId);
    }
    Ok(manifest)
}

/// Serialize a manifest to the bytes uploaded as `project.json`.
pub fn to_json_bytes(manifest: &ProjectManifest) -> Result<Vec<u8>, ManifestError> {
    Ok(serde_json::to_vec_pretty(manifest)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json(version: u32) -> String {
        format!(r#"{{"version":{},"id":"p1","name":"Test"}}"#, version)
    }

    #[test]
    fn test_parse_minimal_manifest() {
        let manifest = parse_manifest(minimal_json(1).as_bytes()).unwrap();
        assert_eq!(manifest.id, "p1");
        assert_eq!(manifest.name, "Test");
        assert!(manifest.sentences.is_empty());
        assert!(manifest.speakers.is_empty());
    }

    #[test]
    fn test_version_defaults_to_one() {
        let manifest = parse_manifest(br#"{"id":"p1","name":"Test"}"#).unwrap();
        assert_eq!(manifest.version, 1);
    }

    #[test]
    fn test_rejects_newer_version() {
        let result = parse_manifest(minimal_json(2).as_bytes());
        assert!(matches!(
            result.unwrap_err(),
            ManifestError::UnsupportedVersion {
                found: 2,
                supported: 1
            }
        ));
    }

    #[test]
    fn test_rejects_empty_id() {
        let result = parse_manifest(br#"{"id":"","name":"Test"}"#);
        assert!(matches!(result.unwrap_err(), ManifestError::MissingId));
    }

    #[test]
    fn test_ignores_unknown_fields() {
        let json = r#"{"id":"p1","name":"Test","future_field":"ignored","sentences":[
            {"id":"s1","index":0,"text":"Hallo","brand_new_flag":true}
        ]}"#;
        let manifest = parse_manifest(json.as_bytes()).unwrap();
        assert_eq!(manifest.sentences.len(), 1);
        assert_eq!(manifest.sentences[0].text, "Hallo");
        assert!(!manifest.sentences[0].learned);
    }

    #[test]
    fn test_round_trip() {
        let mut manifest = ProjectManifest {
            version: 1,
            id: "p1".to_string(),
            name: "Nieuws van vandaag".to_string(),
            created_at: None,
            updated_at: None,
            speakers: vec![],
            sentences: vec![SentenceEntry {
                id: "s1".to_string(),
                index: 0,
                text: "Goedemorgen".to_string(),
                start_time: Some(0.0),
                end_time: Some(1.4),
                translation_en: Some("Good morning".to_string()),
                explanation_nl: None,
                explanation_en: None,
                speaker_id: None,
                learned: true,
                learn_count: 3,
                is_difficult: false,
                review_count: 1,
                last_reviewed: None,
                keywords: vec![KeywordEntry {
                    word: "goedemorgen".to_string(),
                    meaning_nl: Some("groet in de ochtend".to_string()),
                    meaning_en: Some("morning greeting".to_string()),
                }],
            }],
            progress: ProgressSummary::default(),
        };
        manifest.recompute_progress();

        let bytes = to_json_bytes(&manifest).unwrap();
        let parsed = parse_manifest(&bytes).unwrap();
        assert_eq!(parsed, manifest);
        assert_eq!(parsed.progress.total_sentences, 1);
        assert_eq!(parsed.progress.learned_sentences, 1);
    }
}
