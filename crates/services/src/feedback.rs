//! Fire-and-forget feedback: notifications, narration and celebrations.

use std::sync::Mutex;

use lab_core::model::{Emotion, LabId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

/// A toast-style message with an optional description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: Option<String>,
    pub severity: Severity,
}

impl Notification {
    #[must_use]
    pub fn new(severity: Severity, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            severity,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Receives feedback emitted by lab sessions. Calls never fail.
pub trait FeedbackSink: Send + Sync {
    fn notify(&self, notification: &Notification);

    fn narrate(&self, lab_id: &LabId, message: &str, emotion: Emotion);

    /// Purely cosmetic burst shown on a perfect quiz.
    fn celebrate(&self, lab_id: &LabId);
}

/// Default sink: every call becomes a log event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFeedback;

impl FeedbackSink for TracingFeedback {
    fn notify(&self, notification: &Notification) {
        let description = notification.description.as_deref().unwrap_or_default();
        match notification.severity {
            Severity::Info | Severity::Success => {
                tracing::info!(title = %notification.title, description, "notification");
            }
            Severity::Warning => {
                tracing::warn!(title = %notification.title, description, "notification");
            }
            Severity::Error => {
                tracing::error!(title = %notification.title, description, "notification");
            }
        }
    }

    fn narrate(&self, lab_id: &LabId, message: &str, emotion: Emotion) {
        tracing::debug!(lab_id = %lab_id, ?emotion, message, "narration");
    }

    fn celebrate(&self, lab_id: &LabId) {
        tracing::info!(lab_id = %lab_id, "celebration");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackRecord {
    Notified(Notification),
    Narrated { message: String, emotion: Emotion },
    Celebrated,
}

/// Keeps everything it receives; handy for tests and transcripts.
#[derive(Debug, Default)]
pub struct RecordingFeedback {
    records: Mutex<Vec<FeedbackRecord>>,
}

impl RecordingFeedback {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, record: FeedbackRecord) {
        // A poisoned lock only means another recorder panicked; keep recording.
        let mut guard = self
            .records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.push(record);
    }

    #[must_use]
    pub fn records(&self) -> Vec<FeedbackRecord> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                FeedbackRecord::Notified(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn celebrations(&self) -> usize {
        self.records()
            .iter()
            .filter(|r| matches!(r, FeedbackRecord::Celebrated))
            .count()
    }
}

impl FeedbackSink for RecordingFeedback {
    fn notify(&self, notification: &Notification) {
        self.push(FeedbackRecord::Notified(notification.clone()));
    }

    fn narrate(&self, _lab_id: &LabId, message: &str, emotion: Emotion) {
        self.push(FeedbackRecord::Narrated {
            message: message.to_string(),
            emotion,
        });
    }

    fn celebrate(&self, _lab_id: &LabId) {
        self.push(FeedbackRecord::Celebrated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingFeedback::new();
        let lab = LabId::new("flame-test").unwrap();
        sink.notify(&Notification::new(Severity::Success, "Collected goggles"));
        sink.narrate(&lab, "Hello", Emotion::Happy);
        sink.celebrate(&lab);

        assert_eq!(sink.records().len(), 3);
        assert_eq!(sink.notifications()[0].title, "Collected goggles");
        assert_eq!(sink.celebrations(), 1);
    }
}
