use lab_core::model::LabId;

use super::{SqliteRepository, mapping::map_attempt_row};
use crate::repository::{QuizAttemptRecord, QuizAttemptRepository, StorageError};

#[async_trait::async_trait]
impl QuizAttemptRepository for SqliteRepository {
    async fn append_attempt(&self, attempt: &QuizAttemptRecord) -> Result<i64, StorageError> {
        if attempt.correct > attempt.total {
            return Err(StorageError::Conflict);
        }

        let res = sqlx::query(
            r"
                INSERT INTO quiz_attempts (
                    lab_id, session_id, attempt, correct, total, submitted_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(attempt.lab_id.as_str())
        .bind(attempt.session_id.value().to_string())
        .bind(i64::from(attempt.attempt))
        .bind(i64::from(attempt.correct))
        .bind(i64::from(attempt.total))
        .bind(attempt.submitted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(res.last_insert_rowid())
    }

    async fn attempts_for_lab(
        &self,
        lab_id: &LabId,
    ) -> Result<Vec<QuizAttemptRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, lab_id, session_id, attempt, correct, total, submitted_at
                FROM quiz_attempts
                WHERE lab_id = ?1
                ORDER BY submitted_at ASC, id ASC
            ",
        )
        .bind(lab_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_attempt_row(&row)?);
        }
        Ok(out)
    }
}
