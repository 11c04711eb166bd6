use lab_core::model::{CompletionRecord, LabId, LabSessionId};
use sqlx::Row;
use uuid::Uuid;

use crate::repository::{QuizAttemptRecord, StorageError};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to<T: TryFrom<i64>>(field: &'static str, v: i64) -> Result<T, StorageError> {
    T::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn lab_id_from_str(raw: String) -> Result<LabId, StorageError> {
    LabId::new(raw).map_err(ser)
}

pub(crate) fn map_completion_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<CompletionRecord, StorageError> {
    let lab_id = lab_id_from_str(row.try_get("lab_id").map_err(ser)?)?;
    let score: u8 = i64_to("score", row.try_get("score").map_err(ser)?)?;
    let xp_earned: u32 = i64_to("xp_earned", row.try_get("xp_earned").map_err(ser)?)?;
    let time_spent_secs: u64 =
        i64_to("time_spent_secs", row.try_get("time_spent_secs").map_err(ser)?)?;

    CompletionRecord::from_persisted(
        lab_id,
        row.try_get("completed_at").map_err(ser)?,
        score,
        xp_earned,
        time_spent_secs,
    )
    .map_err(ser)
}

pub(crate) fn map_attempt_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<QuizAttemptRecord, StorageError> {
    let session: String = row.try_get("session_id").map_err(ser)?;
    let session_id = LabSessionId::from_uuid(Uuid::parse_str(&session).map_err(ser)?);

    Ok(QuizAttemptRecord {
        id: Some(row.try_get("id").map_err(ser)?),
        lab_id: lab_id_from_str(row.try_get("lab_id").map_err(ser)?)?,
        session_id,
        attempt: i64_to("attempt", row.try_get("attempt").map_err(ser)?)?,
        correct: i64_to("correct", row.try_get("correct").map_err(ser)?)?,
        total: i64_to("total", row.try_get("total").map_err(ser)?)?,
        submitted_at: row.try_get("submitted_at").map_err(ser)?,
    })
}
