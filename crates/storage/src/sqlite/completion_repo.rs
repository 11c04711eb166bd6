use lab_core::model::{CompletionRecord, LabId};

use super::{
    SqliteRepository,
    mapping::{map_completion_row, u64_to_i64},
};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn insert_completion_if_absent(
        &self,
        record: &CompletionRecord,
    ) -> Result<bool, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO lab_completions (
                    lab_id, completed_at, score, xp_earned, time_spent_secs
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(lab_id) DO NOTHING
            ",
        )
        .bind(record.lab_id().as_str())
        .bind(record.completed_at())
        .bind(i64::from(record.score()))
        .bind(i64::from(record.xp_earned()))
        .bind(u64_to_i64("time_spent_secs", record.time_spent_secs())?)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(res.rows_affected() == 1)
    }

    async fn get_completion(
        &self,
        lab_id: &LabId,
    ) -> Result<Option<CompletionRecord>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT lab_id, completed_at, score, xp_earned, time_spent_secs
                FROM lab_completions
                WHERE lab_id = ?1
            ",
        )
        .bind(lab_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_completion_row).transpose()
    }

    async fn list_completions(&self) -> Result<Vec<CompletionRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT lab_id, completed_at, score, xp_earned, time_spent_secs
                FROM lab_completions
                ORDER BY completed_at ASC, lab_id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_completion_row(&row)?);
        }
        Ok(out)
    }
}
