//! Shared error types for the services crate.

use thiserror::Error;

use lab_core::labs::ExperimentError;
use lab_core::model::{CompletionError, LabStep, QuizError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by lab sessions.
///
/// Everything except `Progress` is a rejected learner action: the session is
/// left exactly as it was.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("{action} is not available during the {step} step")]
    WrongStep { action: &'static str, step: LabStep },
    #[error("collect all supplies first ({remaining} still missing)")]
    SuppliesMissing { remaining: usize },
    #[error("complete all {required} trials first ({completed} done)")]
    TrialsIncomplete { completed: usize, required: usize },
    #[error("answer every question correctly to finish the lab")]
    QuizNotPassed,
    #[error("your result is still being saved; try again in a moment")]
    CompletionNotRecorded,
    #[error("the lab is already complete")]
    AlreadyComplete,
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Experiment(#[from] ExperimentError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
}

impl SessionError {
    /// True for rejected actions that should surface as a warning, not abort.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        !matches!(self, SessionError::Progress(_))
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
