use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lab_core::model::{CompletionRecord, LabId, LabSessionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// One graded quiz submission, kept for every attempt whether or not it passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAttemptRecord {
    pub id: Option<i64>,
    pub lab_id: LabId,
    pub session_id: LabSessionId,
    pub attempt: u32,
    pub correct: u32,
    pub total: u32,
    pub submitted_at: DateTime<Utc>,
}

impl QuizAttemptRecord {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.total > 0 && self.correct == self.total
    }
}

/// Persistence contract for the per-lab completion records.
///
/// A lab has at most one record; once written it is never overwritten.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Store `record` unless the lab already has one.
    ///
    /// Returns `true` if the record was inserted, `false` if an earlier record
    /// was kept.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn insert_completion_if_absent(
        &self,
        record: &CompletionRecord,
    ) -> Result<bool, StorageError>;

    /// Fetch the completion record for a lab, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn get_completion(&self, lab_id: &LabId)
    -> Result<Option<CompletionRecord>, StorageError>;

    /// All completion records, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn list_completions(&self) -> Result<Vec<CompletionRecord>, StorageError>;
}

#[async_trait]
pub trait QuizAttemptRepository: Send + Sync {
    /// Append a graded attempt, returning its row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn append_attempt(&self, attempt: &QuizAttemptRecord) -> Result<i64, StorageError>;

    /// Attempts for a lab across all sessions, in submission order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn attempts_for_lab(&self, lab_id: &LabId)
    -> Result<Vec<QuizAttemptRecord>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    completions: Arc<Mutex<BTreeMap<LabId, CompletionRecord>>>,
    attempts: Arc<Mutex<Vec<QuizAttemptRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn insert_completion_if_absent(
        &self,
        record: &CompletionRecord,
    ) -> Result<bool, StorageError> {
        let mut guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.contains_key(record.lab_id()) {
            return Ok(false);
        }
        guard.insert(record.lab_id().clone(), record.clone());
        Ok(true)
    }

    async fn get_completion(
        &self,
        lab_id: &LabId,
    ) -> Result<Option<CompletionRecord>, StorageError> {
        let guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(lab_id).cloned())
    }

    async fn list_completions(&self) -> Result<Vec<CompletionRecord>, StorageError> {
        let guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut records: Vec<_> = guard.values().cloned().collect();
        records.sort_by_key(CompletionRecord::completed_at);
        Ok(records)
    }
}

#[async_trait]
impl QuizAttemptRepository for InMemoryRepository {
    async fn append_attempt(&self, attempt: &QuizAttemptRecord) -> Result<i64, StorageError> {
        let mut guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let id = i64::try_from(guard.len() + 1)
            .map_err(|_| StorageError::Serialization("attempt id overflow".into()))?;
        let mut stored = attempt.clone();
        stored.id = Some(id);
        guard.push(stored);
        Ok(id)
    }

    async fn attempts_for_lab(
        &self,
        lab_id: &LabId,
    ) -> Result<Vec<QuizAttemptRecord>, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .iter()
            .filter(|a| &a.lab_id == lab_id)
            .cloned()
            .collect())
    }
}

/// Aggregates the progress repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub attempts: Arc<dyn QuizAttemptRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let attempts: Arc<dyn QuizAttemptRepository> = Arc::new(repo);
        Self { progress, attempts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lab_core::time::fixed_now;

    fn record(slug: &str, score: u8, offset_secs: i64) -> CompletionRecord {
        CompletionRecord::new(
            LabId::new(slug).unwrap(),
            score,
            u32::from(score),
            90,
            fixed_now() + Duration::seconds(offset_secs),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn first_completion_wins() {
        let repo = InMemoryRepository::new();
        assert!(repo
            .insert_completion_if_absent(&record("flame-test", 100, 0))
            .await
            .unwrap());
        assert!(!repo
            .insert_completion_if_absent(&record("flame-test", 60, 10))
            .await
            .unwrap());

        let stored = repo
            .get_completion(&LabId::new("flame-test").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.score(), 100);
        assert_eq!(stored.completed_at(), fixed_now());
    }

    #[tokio::test]
    async fn missing_lab_has_no_completion() {
        let repo = InMemoryRepository::new();
        let found = repo
            .get_completion(&LabId::new("refraction").unwrap())
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn completions_list_oldest_first() {
        let repo = InMemoryRepository::new();
        repo.insert_completion_if_absent(&record("water-test", 100, 50))
            .await
            .unwrap();
        repo.insert_completion_if_absent(&record("refraction", 80, 5))
            .await
            .unwrap();
        let all = repo.list_completions().await.unwrap();
        let slugs: Vec<_> = all.iter().map(|r| r.lab_id().as_str()).collect();
        assert_eq!(slugs, ["refraction", "water-test"]);
    }

    #[tokio::test]
    async fn attempts_are_filtered_by_lab() {
        let repo = InMemoryRepository::new();
        let session = LabSessionId::generate();
        for (slug, correct) in [("flame-test", 2), ("refraction", 3), ("flame-test", 3)] {
            repo.append_attempt(&QuizAttemptRecord {
                id: None,
                lab_id: LabId::new(slug).unwrap(),
                session_id: session,
                attempt: 1,
                correct,
                total: 3,
                submitted_at: fixed_now(),
            })
            .await
            .unwrap();
        }
        let flame = repo
            .attempts_for_lab(&LabId::new("flame-test").unwrap())
            .await
            .unwrap();
        assert_eq!(flame.len(), 2);
        assert!(!flame[0].passed());
        assert!(flame[1].passed());
        assert_eq!(flame[1].id, Some(3));
    }
}
