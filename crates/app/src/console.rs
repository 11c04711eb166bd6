use lab_core::model::{Emotion, LabId};
use services::{FeedbackSink, Notification, Severity, TracingFeedback};

/// Prints narration and notifications for a terminal walkthrough.
///
/// Everything is also forwarded to `TracingFeedback` so `RUST_LOG` still sees it.
#[derive(Debug, Default)]
pub struct ConsoleFeedback {
    log: TracingFeedback,
}

impl FeedbackSink for ConsoleFeedback {
    fn notify(&self, notification: &Notification) {
        let tag = match notification.severity {
            Severity::Info => "info",
            Severity::Success => "ok",
            Severity::Warning => "warn",
            Severity::Error => "error",
        };
        match &notification.description {
            Some(description) => println!("  [{tag}] {}: {description}", notification.title),
            None => println!("  [{tag}] {}", notification.title),
        }
        self.log.notify(notification);
    }

    fn narrate(&self, lab_id: &LabId, message: &str, emotion: Emotion) {
        let mood = match emotion {
            Emotion::Explaining => "teacher",
            Emotion::Encouraging => "teacher:encouraging",
            Emotion::Happy => "teacher:happy",
            Emotion::Celebrating => "teacher:celebrating",
        };
        println!("{mood}> {message}");
        self.log.narrate(lab_id, message, emotion);
    }

    fn celebrate(&self, lab_id: &LabId) {
        println!("  * * * perfect score * * *");
        self.log.celebrate(lab_id);
    }
}
