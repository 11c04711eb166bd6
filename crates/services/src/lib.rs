#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod feedback;
pub mod labs;
pub mod progress_service;

pub use lab_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, ProgressError, SessionError};
pub use feedback::{
    FeedbackRecord, FeedbackSink, Notification, RecordingFeedback, Severity, TracingFeedback,
};
pub use labs::{LabEvent, LabLoopService, LabProgress, LabSession, QuizSubmission};
pub use progress_service::{CompletionReceipt, ProgressOverview, ProgressService};
