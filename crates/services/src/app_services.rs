use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::error::AppServicesError;
use crate::feedback::FeedbackSink;
use crate::labs::LabLoopService;
use crate::progress_service::ProgressService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    progress: Arc<ProgressService>,
    lab_loop: Arc<LabLoopService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        feedback: Arc<dyn FeedbackSink>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, feedback))
    }

    /// Build services over in-memory storage.
    #[must_use]
    pub fn in_memory(clock: Clock, feedback: Arc<dyn FeedbackSink>) -> Self {
        Self::from_storage(&Storage::in_memory(), clock, feedback)
    }

    fn from_storage(storage: &Storage, clock: Clock, feedback: Arc<dyn FeedbackSink>) -> Self {
        let progress = Arc::new(ProgressService::new(
            clock,
            Arc::clone(&storage.progress),
            Arc::clone(&storage.attempts),
        ));
        let lab_loop = Arc::new(LabLoopService::new(clock, Arc::clone(&progress), feedback));
        Self { progress, lab_loop }
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn lab_loop(&self) -> Arc<LabLoopService> {
        Arc::clone(&self.lab_loop)
    }
}
