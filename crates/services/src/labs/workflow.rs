use std::sync::Arc;

use lab_core::labs::{Experiment, LabDefinition, Outcome};
use lab_core::model::{CollectOutcome, LabStep, QuizAction, SupplyId};
use storage::repository::QuizAttemptRecord;
use tracing::{error, info, warn};

use super::session::{LabEvent, LabSession};
use crate::Clock;
use crate::error::SessionError;
use crate::feedback::{FeedbackSink, Notification, Severity};
use crate::progress_service::{CompletionReceipt, ProgressService};

/// Result of pressing the quiz submit button through the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSubmission {
    pub action: QuizAction,
    /// Set when this submission recorded the lab's completion.
    pub receipt: Option<CompletionReceipt>,
}

/// Drives lab sessions against the progress store and a feedback sink.
///
/// Rejected learner actions become warning notifications and `Ok(None)`;
/// only progress-store failures come back as `Err`.
#[derive(Clone)]
pub struct LabLoopService {
    clock: Clock,
    progress: Arc<ProgressService>,
    feedback: Arc<dyn FeedbackSink>,
}

impl LabLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        progress: Arc<ProgressService>,
        feedback: Arc<dyn FeedbackSink>,
    ) -> Self {
        Self {
            clock,
            progress,
            feedback,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    /// Open a session in the intro step and play its welcome narration.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Quiz` if the definition's quiz is malformed.
    pub fn open<E: Experiment>(
        &self,
        definition: LabDefinition,
        experiment: E,
    ) -> Result<LabSession<E>, SessionError> {
        let mut session = LabSession::new(definition, experiment)?;
        info!(lab_id = %session.lab_id(), session_id = %session.id(), "lab opened");
        self.dispatch(&mut session);
        Ok(session)
    }

    /// # Errors
    ///
    /// Never fails for rejected actions; see the type docs.
    pub fn start<E: Experiment>(
        &self,
        session: &mut LabSession<E>,
    ) -> Result<Option<()>, SessionError> {
        let result = session.start(self.clock.now());
        self.settle(session, result)
    }

    /// # Errors
    ///
    /// Never fails for rejected actions; see the type docs.
    pub fn collect<E: Experiment>(
        &self,
        session: &mut LabSession<E>,
        id: &SupplyId,
    ) -> Result<Option<CollectOutcome>, SessionError> {
        let result = session.collect(id);
        self.settle(session, result)
    }

    /// # Errors
    ///
    /// Never fails for rejected actions; see the type docs.
    pub fn advance<E: Experiment>(
        &self,
        session: &mut LabSession<E>,
    ) -> Result<Option<LabStep>, SessionError> {
        let result = session.advance(self.clock.now());
        self.settle(session, result)
    }

    /// # Errors
    ///
    /// Never fails for rejected actions; see the type docs.
    pub fn act<E: Experiment>(
        &self,
        session: &mut LabSession<E>,
        action: E::Action,
    ) -> Result<Option<Outcome<E::Observation>>, SessionError> {
        let result = session.act(action, self.clock.now());
        self.settle(session, result)
    }

    /// Advance timers; returns the experiment's tick outcome, if any.
    pub fn tick<E: Experiment>(
        &self,
        session: &mut LabSession<E>,
    ) -> Option<Outcome<E::Observation>> {
        let outcome = session.tick(self.clock.now());
        self.dispatch(session);
        outcome
    }

    pub fn narration_finished<E: Experiment>(
        &self,
        session: &mut LabSession<E>,
        revision: u64,
    ) -> Option<LabStep> {
        let step = session.narration_finished(revision, self.clock.now());
        self.dispatch(session);
        step
    }

    /// # Errors
    ///
    /// Never fails for rejected actions; see the type docs.
    pub fn take_quiz<E: Experiment>(
        &self,
        session: &mut LabSession<E>,
    ) -> Result<Option<bool>, SessionError> {
        let result = session.take_quiz(self.clock.now());
        self.settle(session, result)
    }

    /// # Errors
    ///
    /// Never fails for rejected actions; see the type docs.
    pub fn finish<E: Experiment>(
        &self,
        session: &mut LabSession<E>,
    ) -> Result<Option<bool>, SessionError> {
        let result = session.finish(self.clock.now());
        self.settle(session, result)
    }

    /// # Errors
    ///
    /// Never fails for rejected actions; see the type docs.
    pub fn answer<E: Experiment>(
        &self,
        session: &mut LabSession<E>,
        question: usize,
        option: usize,
    ) -> Result<Option<()>, SessionError> {
        let result = session.answer(question, option);
        self.settle(session, result)
    }

    /// Press the submit/retry button, logging graded attempts and recording
    /// the completion on the first perfect score.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Progress` if the attempt log or the progress
    /// store fails. The quiz state is kept, so `finalize_completion` can retry.
    pub async fn submit_quiz<E: Experiment>(
        &self,
        session: &mut LabSession<E>,
    ) -> Result<Option<QuizSubmission>, SessionError> {
        let now = self.clock.now();
        let result = session.submit_quiz(now);
        let Some(action) = self.settle(session, result)? else {
            return Ok(None);
        };

        if let QuizAction::Graded(grade) = action {
            info!(
                lab_id = %session.lab_id(),
                attempt = grade.attempt,
                correct = grade.correct,
                total = grade.total,
                "quiz graded"
            );
            self.progress
                .record_attempt(&QuizAttemptRecord {
                    id: None,
                    lab_id: session.lab_id().clone(),
                    session_id: session.id(),
                    attempt: grade.attempt,
                    correct: grade.correct,
                    total: grade.total,
                    submitted_at: now,
                })
                .await
                .map_err(|err| self.report_failure(session, err.into()))?;
        }

        let receipt = self.finalize_completion(session).await?;
        Ok(Some(QuizSubmission { action, receipt }))
    }

    /// Record the completion of a passed quiz if it is not recorded yet.
    ///
    /// Safe to call repeatedly: the session keeps the first receipt and the
    /// progress store never awards XP twice for a lab.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Progress` if the progress store fails.
    pub async fn finalize_completion<E: Experiment>(
        &self,
        session: &mut LabSession<E>,
    ) -> Result<Option<CompletionReceipt>, SessionError> {
        if !session.needs_completion() {
            return Ok(None);
        }
        let Some(score) = session.passing_score() else {
            return Ok(None);
        };
        let time_spent = session
            .started_at()
            .map_or(0, |started| self.clock.seconds_since(started));

        let receipt = self
            .progress
            .mark_lab_complete(session.lab_id(), score, time_spent)
            .await
            .map_err(|err| self.report_failure(session, err.into()))?;
        info!(
            lab_id = %session.lab_id(),
            score,
            xp = receipt.xp_awarded,
            newly_completed = receipt.newly_completed,
            "completion recorded"
        );
        session.record_completion(receipt.clone());
        self.dispatch(session);
        Ok(Some(receipt))
    }

    pub fn reset<E: Experiment>(&self, session: &mut LabSession<E>) {
        session.reset();
        self.dispatch(session);
    }

    /// Tell the learner their result was not saved. The session keeps its
    /// state, so `finalize_completion` can be retried.
    fn report_failure<E: Experiment>(
        &self,
        session: &LabSession<E>,
        err: SessionError,
    ) -> SessionError {
        error!(lab_id = %session.lab_id(), error = %err, "progress not saved");
        self.feedback.notify(
            &Notification::new(Severity::Error, "Could not save your progress")
                .with_description(err.to_string()),
        );
        err
    }

    /// Dispatch pending events, turning rejections into warnings.
    fn settle<E: Experiment, T>(
        &self,
        session: &mut LabSession<E>,
        result: Result<T, SessionError>,
    ) -> Result<Option<T>, SessionError> {
        self.dispatch(session);
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_rejection() => {
                warn!(
                    lab_id = %session.lab_id(),
                    step = %session.step(),
                    error = %err,
                    "action rejected"
                );
                self.feedback
                    .notify(&Notification::new(Severity::Warning, err.to_string()));
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn dispatch<E: Experiment>(&self, session: &mut LabSession<E>) {
        let lab_id = session.lab_id().clone();
        for event in session.drain_events() {
            match event {
                LabEvent::StepChanged { from, to } => {
                    info!(lab_id = %lab_id, from = %from, to = %to, "step changed");
                }
                LabEvent::Narration {
                    message, emotion, ..
                } => self.feedback.narrate(&lab_id, &message, emotion),
                LabEvent::Notify(notification) => self.feedback.notify(&notification),
                LabEvent::Celebrate => self.feedback.celebrate(&lab_id),
            }
        }
    }
}
