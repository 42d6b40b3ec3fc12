//! Study-action mutators.
//!
//! These are the only writes the app performs between syncs. Each one only
//! moves progress fields forward, so local state always merges cleanly.

use chrono::Utc;

use super::SqliteStore;
use crate::db::{DbError, DbResult};

impl SqliteStore {
    /// Bump the review counter and stamp the review time.
    pub async fn mark_reviewed(&self, sentence_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE sentence SET review_count = review_count + 1, last_reviewed = ? \
             WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(sentence_id)
        .execute(&self.pool)
        .await?;

        ensure_sentence_found(result.rows_affected(), sentence_id)
    }

    /// Set or clear the learned flag. Setting it also bumps `learn_count`.
    pub async fn mark_learned(&self, sentence_id: &str, learned: bool) -> DbResult<()> {
        let result = if learned {
            sqlx::query(
                "UPDATE sentence SET learned = 1, learn_count = learn_count + 1 WHERE id = ?",
            )
            .bind(sentence_id)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query("UPDATE sentence SET learned = 0 WHERE id = ?")
                .bind(sentence_id)
                .execute(&self.pool)
                .await?
        };

        ensure_sentence_found(result.rows_affected(), sentence_id)
    }

    /// Toggle the difficult bookmark.
    pub async fn set_difficult(&self, sentence_id: &str, difficult: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE sentence SET is_difficult = ? WHERE id = ?")
            .bind(difficult)
            .bind(sentence_id)
            .execute(&self.pool)
            .await?;

        ensure_sentence_found(result.rows_affected(), sentence_id)
    }

    /// Remember where playback stopped.
    pub async fn touch_last_played(
        &self,
        project_id: &str,
        sentence_index: i64,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE project SET last_played_at = ?, last_sentence_index = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(sentence_index)
        .bind(project_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity_type: "Project".to_string(),
                id: project_id.to_string(),
            });
        }
        Ok(())
    }
}

fn ensure_sentence_found(rows_affected: u64, sentence_id: &str) -> DbResult<()> {
    if rows_affected == 0 {
        return Err(DbError::NotFound {
            entity_type: "Sentence".to_string(),
            id: sentence_id.to_string(),
        });
    }
    Ok(())
}
