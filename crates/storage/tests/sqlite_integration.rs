use chrono::Duration;
use lab_core::model::{CompletionRecord, LabId, LabSessionId};
use lab_core::time::fixed_now;
use storage::repository::{
    ProgressRepository, QuizAttemptRecord, QuizAttemptRepository, Storage,
};
use storage::sqlite::{SqliteRepository, shared_memory_url};

fn completion(slug: &str, score: u8, offset_secs: i64) -> CompletionRecord {
    CompletionRecord::new(
        LabId::new(slug).unwrap(),
        score,
        u32::from(score),
        240,
        fixed_now() + Duration::seconds(offset_secs),
    )
    .unwrap()
}

#[tokio::test]
async fn sqlite_keeps_first_completion() {
    let repo = SqliteRepository::connect(&shared_memory_url("memdb_first_completion"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let first = completion("acid-base-neutralization", 100, 0);
    assert!(repo.insert_completion_if_absent(&first).await.unwrap());
    assert!(!repo
        .insert_completion_if_absent(&completion("acid-base-neutralization", 60, 30))
        .await
        .unwrap());

    let stored = repo
        .get_completion(first.lab_id())
        .await
        .unwrap()
        .expect("record");
    assert_eq!(stored, first);
    assert_eq!(stored.time_spent_secs(), 240);
}

#[tokio::test]
async fn sqlite_lists_completions_in_order() {
    let repo = SqliteRepository::connect(&shared_memory_url("memdb_list_completions"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    repo.insert_completion_if_absent(&completion("water-test", 100, 120))
        .await
        .unwrap();
    repo.insert_completion_if_absent(&completion("flame-test", 80, 10))
        .await
        .unwrap();

    let all = repo.list_completions().await.unwrap();
    let slugs: Vec<_> = all.iter().map(|r| r.lab_id().as_str()).collect();
    assert_eq!(slugs, ["flame-test", "water-test"]);

    let missing = repo
        .get_completion(&LabId::new("refraction").unwrap())
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn sqlite_appends_quiz_attempts() {
    let repo = SqliteRepository::connect(&shared_memory_url("memdb_quiz_attempts"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let lab = LabId::new("refraction").unwrap();
    let session = LabSessionId::generate();
    for (attempt, correct) in [(1, 2), (2, 3)] {
        repo.append_attempt(&QuizAttemptRecord {
            id: None,
            lab_id: lab.clone(),
            session_id: session,
            attempt,
            correct,
            total: 3,
            submitted_at: fixed_now() + Duration::seconds(i64::from(attempt)),
        })
        .await
        .unwrap();
    }

    let attempts = repo.attempts_for_lab(&lab).await.unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].attempt, 1);
    assert!(!attempts[0].passed());
    assert!(attempts[1].passed());
    assert_eq!(attempts[1].session_id, session);
    assert!(attempts.iter().all(|a| a.id.is_some()));
}

#[tokio::test]
async fn sqlite_rejects_impossible_attempt() {
    let repo = SqliteRepository::connect(&shared_memory_url("memdb_bad_attempt"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let err = repo
        .append_attempt(&QuizAttemptRecord {
            id: None,
            lab_id: LabId::new("flame-test").unwrap(),
            session_id: LabSessionId::generate(),
            attempt: 1,
            correct: 4,
            total: 3,
            submitted_at: fixed_now(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, storage::StorageError::Conflict));
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = SqliteRepository::connect(&shared_memory_url("memdb_migrate_twice"))
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.migrate().await.expect("second migrate");
}

#[tokio::test]
async fn storage_sqlite_wires_both_repositories() {
    let storage = Storage::sqlite(&shared_memory_url("memdb_storage_wiring"))
        .await
        .expect("storage");
    let record = completion("flame-test", 100, 0);
    assert!(storage.progress.insert_completion_if_absent(&record).await.unwrap());
    assert_eq!(storage.progress.list_completions().await.unwrap().len(), 1);
    assert!(storage
        .attempts
        .attempts_for_lab(record.lab_id())
        .await
        .unwrap()
        .is_empty());
}
