//! Snapshot export/import for the SQLite store.
//!
//! Export is a denormalized read of one project into a [`ProjectManifest`].
//! Import replaces a project's content rows inside a single transaction, so
//! an interruption never leaves half-merged sentences beside stale ones.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::warn;

use super::SqliteStore;
use crate::db::{DbError, DbResult, LocalStore, Project};
use crate::manifest::{
    KeywordEntry, ProgressSummary, ProjectManifest, SentenceEntry, SpeakerEntry,
};

impl LocalStore for SqliteStore {
    async fn list_project_ids(&self) -> DbResult<Vec<String>> {
        let ids = sqlx::query_scalar("SELECT id FROM project ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn export_snapshot(&self, project_id: &str) -> DbResult<ProjectManifest> {
        let project = self.get_project(project_id).await?;

        let speaker_rows = sqlx::query(
            "SELECT id, label, display_name, confidence, evidence, is_manual \
             FROM speaker WHERE project_id = ? ORDER BY label",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        let speakers = speaker_rows
            .iter()
            .map(|row| SpeakerEntry {
                id: row.get("id"),
                label: row.get("label"),
                display_name: row.get("display_name"),
                confidence: row.get("confidence"),
                evidence: row.get("evidence"),
                is_manual: row.get("is_manual"),
            })
            .collect();

        // One query for all keywords of the project, grouped per sentence.
        let keyword_rows = sqlx::query(
            "SELECT k.sentence_id, k.word, k.meaning_nl, k.meaning_en \
             FROM keyword k \
             JOIN sentence s ON s.id = k.sentence_id \
             WHERE s.project_id = ? \
             ORDER BY k.id",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        let mut keywords_by_sentence: HashMap<String, Vec<KeywordEntry>> = HashMap::new();
        for row in &keyword_rows {
            keywords_by_sentence
                .entry(row.get("sentence_id"))
                .or_default()
                .push(KeywordEntry {
                    word: row.get("word"),
                    meaning_nl: row.get("meaning_nl"),
                    meaning_en: row.get("meaning_en"),
                });
        }

        let sentence_rows = sqlx::query(
            "SELECT id, idx, text, start_time, end_time, translation_en, explanation_nl, \
             explanation_en, speaker_id, learned, learn_count, is_difficult, review_count, \
             last_reviewed \
             FROM sentence WHERE project_id = ? ORDER BY idx",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        let sentences: Vec<SentenceEntry> = sentence_rows
            .iter()
            .map(|row| {
                let id: String = row.get("id");
                let keywords = keywords_by_sentence.remove(&id).unwrap_or_default();
                SentenceEntry {
                    id,
                    index: row.get("idx"),
                    text: row.get("text"),
                    start_time: row.get("start_time"),
                    end_time: row.get("end_time"),
                    translation_en: row.get("translation_en"),
                    explanation_nl: row.get("explanation_nl"),
                    explanation_en: row.get("explanation_en"),
                    speaker_id: row.get("speaker_id"),
                    learned: row.get("learned"),
                    learn_count: row.get("learn_count"),
                    is_difficult: row.get("is_difficult"),
                    review_count: row.get("review_count"),
                    last_reviewed: row.get("last_reviewed"),
                    keywords,
                }
            })
            .collect();

        let mut manifest = ProjectManifest {
            version: crate::manifest::SUPPORTED_MANIFEST_VERSION,
            id: project.id,
            name: project.name,
            created_at: project.created_at,
            updated_at: project.updated_at,
            speakers,
            sentences,
            progress: ProgressSummary::default(),
        };
        manifest.recompute_progress();
        Ok(manifest)
    }

    async fn import_or_replace_snapshot(
        &self,
        snapshot: &ProjectManifest,
        audio_path: Option<&Path>,
    ) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let audio = audio_path.map(|p| p.to_string_lossy().into_owned());

        // On replace, COALESCE keeps the existing audio path and created_at
        // when the new row carries none; imported_at is absent from the
        // update list, so the first import time stands.
        sqlx::query(
            "INSERT INTO project \
             (id, name, sentence_count, audio_path, imported_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET \
             name = excluded.name, \
             sentence_count = excluded.sentence_count, \
             audio_path = COALESCE(excluded.audio_path, project.audio_path), \
             created_at = COALESCE(project.created_at, excluded.created_at), \
             updated_at = excluded.updated_at",
        )
        .bind(&snapshot.id)
        .bind(&snapshot.name)
        .bind(snapshot.sentences.len() as i64)
        .bind(&audio)
        .bind(now)
        .bind(snapshot.created_at)
        .bind(snapshot.updated_at.unwrap_or(now))
        .execute(&mut *tx)
        .await?;

        // Replace content rows wholesale; the snapshot already carries the
        // merged progress fields.
        sqlx::query(
            "DELETE FROM keyword WHERE sentence_id IN \
             (SELECT id FROM sentence WHERE project_id = ?)",
        )
        .bind(&snapshot.id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM sentence WHERE project_id = ?")
            .bind(&snapshot.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM speaker WHERE project_id = ?")
            .bind(&snapshot.id)
            .execute(&mut *tx)
            .await?;

        for speaker in &snapshot.speakers {
            sqlx::query(
                "INSERT INTO speaker \
                 (id, project_id, label, display_name, confidence, evidence, is_manual) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&speaker.id)
            .bind(&snapshot.id)
            .bind(&speaker.label)
            .bind(&speaker.display_name)
            .bind(speaker.confidence)
            .bind(&speaker.evidence)
            .bind(speaker.is_manual)
            .execute(&mut *tx)
            .await?;
        }

        for sentence in &snapshot.sentences {
            sqlx::query(
                "INSERT INTO sentence \
                 (id, project_id, idx, text, start_time, end_time, translation_en, \
                 explanation_nl, explanation_en, speaker_id, learned, learn_count, \
                 is_difficult, review_count, last_reviewed) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&sentence.id)
            .bind(&snapshot.id)
            .bind(sentence.index)
            .bind(&sentence.text)
            .bind(sentence.start_time)
            .bind(sentence.end_time)
            .bind(&sentence.translation_en)
            .bind(&sentence.explanation_nl)
            .bind(&sentence.explanation_en)
            .bind(&sentence.speaker_id)
            .bind(sentence.learned)
            .bind(sentence.learn_count)
            .bind(sentence.is_difficult)
            .bind(sentence.review_count)
            .bind(sentence.last_reviewed)
            .execute(&mut *tx)
            .await?;

            for (i, keyword) in sentence.keywords.iter().enumerate() {
                // Keyword ids are derived so re-imports stay stable.
                sqlx::query(
                    "INSERT INTO keyword (id, sentence_id, word, meaning_nl, meaning_en) \
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(format!("{}-kw{}", sentence.id, i))
                .bind(&sentence.id)
                .bind(&keyword.word)
                .bind(&keyword.meaning_nl)
                .bind(&keyword.meaning_en)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn local_audio_path(&self, project_id: &str) -> DbResult<Option<PathBuf>> {
        let project = self.get_project(project_id).await?;
        Ok(project.audio_path.map(PathBuf::from))
    }

    async fn set_remote_id(&self, project_id: &str, remote_id: Option<&str>) -> DbResult<()> {
        sqlx::query("UPDATE project SET remote_id = ? WHERE id = ?")
            .bind(remote_id)
            .bind(project_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_local_audio_file(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %e, "could not remove local audio file");
        }
    }
}

impl SqliteStore {
    /// Load one project row.
    pub async fn get_project(&self, id: &str) -> DbResult<Project> {
        let row = sqlx::query(
            "SELECT id, remote_id, name, sentence_count, audio_path, imported_at, \
             last_played_at, last_sentence_index, created_at, updated_at \
             FROM project WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| DbError::NotFound {
            entity_type: "Project".to_string(),
            id: id.to_string(),
        })?;

        Ok(project_from_row(&row))
    }

    /// All project rows, ordered by import time (newest first).
    pub async fn list_projects(&self) -> DbResult<Vec<Project>> {
        let rows = sqlx::query(
            "SELECT id, remote_id, name, sentence_count, audio_path, imported_at, \
             last_played_at, last_sentence_index, created_at, updated_at \
             FROM project ORDER BY imported_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(project_from_row).collect())
    }

    /// Delete a project and all of its rows. Only ever driven by an
    /// explicit user action, never by sync.
    pub async fn delete_project(&self, project_id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "DELETE FROM keyword WHERE sentence_id IN \
             (SELECT id FROM sentence WHERE project_id = ?)",
        )
        .bind(project_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM sentence WHERE project_id = ?")
            .bind(project_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM speaker WHERE project_id = ?")
            .bind(project_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM project WHERE id = ?")
            .bind(project_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

fn project_from_row(row: &sqlx::sqlite::SqliteRow) -> Project {
    Project {
        id: row.get("id"),
        remote_id: row.get("remote_id"),
        name: row.get("name"),
        sentence_count: row.get("sentence_count"),
        audio_path: row.get("audio_path"),
        imported_at: row.get::<DateTime<Utc>, _>("imported_at"),
        last_played_at: row.get("last_played_at"),
        last_sentence_index: row.get("last_sentence_index"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
