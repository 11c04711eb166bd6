use chrono::{DateTime, Utc};
use lab_core::labs::{Experiment, LabDefinition, Outcome};
use lab_core::model::{
    CollectOutcome, Emotion, LabId, LabSessionId, LabStep, Narrator, PendingTransition, Quiz,
    QuizAction, QuizGrade, SupplyGate, SupplyId,
};
use tracing::debug;

use super::progress::LabProgress;
use crate::error::SessionError;
use crate::feedback::{Notification, Severity};
use crate::progress_service::CompletionReceipt;

//
// ─── EVENTS ────────────────────────────────────────────────────────────────────
//

/// Side effects produced by a session, drained and dispatched by the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabEvent {
    StepChanged { from: LabStep, to: LabStep },
    Narration {
        message: String,
        emotion: Emotion,
        revision: u64,
    },
    Notify(Notification),
    Celebrate,
}

/// Failed attempts at or above this share get the "most answers correct" hint.
const MOSTLY_CORRECT_PERCENT: u8 = 60;

/// A pending transition, optionally tied to the narration that announced it.
#[derive(Debug, Clone)]
struct Scheduled {
    transition: PendingTransition,
    on_narration: Option<u64>,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One learner's run through a lab.
///
/// Owns the current step and every piece of per-run state. Steps only move
/// forward; `reset` is the single way back to `Intro`. Rejected actions return
/// `Err` and leave the session untouched.
#[derive(Debug)]
pub struct LabSession<E: Experiment> {
    id: LabSessionId,
    definition: LabDefinition,
    step: LabStep,
    supplies: SupplyGate,
    experiment: E,
    quiz: Quiz,
    narrator: Narrator,
    pending: Option<Scheduled>,
    started_at: Option<DateTime<Utc>>,
    completion: Option<CompletionReceipt>,
    events: Vec<LabEvent>,
}

impl<E: Experiment> LabSession<E> {
    /// Create a session in the `Intro` step.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Quiz` if the definition's questions are invalid.
    pub fn new(definition: LabDefinition, experiment: E) -> Result<Self, SessionError> {
        let quiz = Quiz::new(definition.questions.clone())?;
        let supplies = SupplyGate::new(definition.supplies.clone());
        let mut session = Self {
            id: LabSessionId::generate(),
            step: LabStep::Intro,
            supplies,
            experiment,
            quiz,
            narrator: Narrator::default(),
            pending: None,
            started_at: None,
            completion: None,
            events: Vec::new(),
            definition,
        };
        session.say(session.definition.intro_message.clone(), Emotion::Explaining);
        Ok(session)
    }

    #[must_use]
    pub fn id(&self) -> LabSessionId {
        self.id
    }

    #[must_use]
    pub fn lab_id(&self) -> &LabId {
        &self.definition.id
    }

    #[must_use]
    pub fn definition(&self) -> &LabDefinition {
        &self.definition
    }

    #[must_use]
    pub fn step(&self) -> LabStep {
        self.step
    }

    #[must_use]
    pub fn supplies(&self) -> &SupplyGate {
        &self.supplies
    }

    #[must_use]
    pub fn experiment(&self) -> &E {
        &self.experiment
    }

    #[must_use]
    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    #[must_use]
    pub fn narrator(&self) -> &Narrator {
        &self.narrator
    }

    #[must_use]
    pub fn pending(&self) -> Option<&PendingTransition> {
        self.pending.as_ref().map(|s| &s.transition)
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn completion(&self) -> Option<&CompletionReceipt> {
        self.completion.as_ref()
    }

    #[must_use]
    pub fn progress(&self) -> LabProgress {
        LabProgress {
            step: self.step,
            supplies_collected: self.supplies.collected_count(),
            supplies_required: self.supplies.required_count(),
            trials_completed: self.experiment.completed_trials(),
            trials_required: self.experiment.required_trials(),
            quiz_answered: self.quiz.answered_count(),
            quiz_questions: self.quiz.questions().len(),
            quiz_attempts: self.quiz.attempts(),
            quiz_score: self.quiz.score(),
            xp_earned: self.completion.as_ref().map(|c| c.xp_awarded),
        }
    }

    /// Take the events produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<LabEvent> {
        std::mem::take(&mut self.events)
    }

    //
    // ─── TRANSITIONS ───────────────────────────────────────────────────────────
    //

    /// Leave the intro and open the supply shelf.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::WrongStep` outside `Intro`.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.ensure_step(LabStep::Intro, "start")?;
        self.advance(now).map(|_| ())
    }

    /// Move to the next step if the current step's precondition holds.
    ///
    /// # Errors
    ///
    /// Returns the unmet precondition, or `AlreadyComplete` in the last step.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<LabStep, SessionError> {
        match self.step {
            LabStep::Intro | LabStep::Setup | LabStep::Results => {}
            LabStep::CollectSupplies => {
                if !self.supplies.is_complete() {
                    return Err(SessionError::SuppliesMissing {
                        remaining: self.supplies.remaining_count(),
                    });
                }
            }
            LabStep::Experiment => {
                if !self.experiment.is_finished() {
                    return Err(SessionError::TrialsIncomplete {
                        completed: self.experiment.completed_trials(),
                        required: self.experiment.required_trials(),
                    });
                }
            }
            LabStep::Quiz => {
                if !self.quiz.is_passed() {
                    return Err(SessionError::QuizNotPassed);
                }
                if self.completion.is_none() {
                    return Err(SessionError::CompletionNotRecorded);
                }
            }
            LabStep::Complete => return Err(SessionError::AlreadyComplete),
        }
        let next = self
            .step
            .next(self.definition.has_setup)
            .ok_or(SessionError::AlreadyComplete)?;
        if self.step == LabStep::Intro {
            self.started_at = Some(now);
        }
        self.move_to(next, now);
        Ok(next)
    }

    /// The "Take Quiz" button.
    ///
    /// Returns `Ok(false)` when the results timer already opened the quiz.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::WrongStep` before the results step.
    pub fn take_quiz(&mut self, now: DateTime<Utc>) -> Result<bool, SessionError> {
        match self.step {
            LabStep::Results => self.advance(now).map(|_| true),
            step if step > LabStep::Results => Ok(false),
            step => Err(SessionError::WrongStep {
                action: "take quiz",
                step,
            }),
        }
    }

    /// The "Continue" button after a passed quiz.
    ///
    /// Returns `Ok(false)` when the celebration already moved on.
    ///
    /// # Errors
    ///
    /// Returns `QuizNotPassed` in the quiz step without a perfect score and
    /// `WrongStep` before the quiz.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<bool, SessionError> {
        match self.step {
            LabStep::Quiz => self.advance(now).map(|_| true),
            LabStep::Complete => Ok(false),
            step => Err(SessionError::WrongStep {
                action: "finish",
                step,
            }),
        }
    }

    /// Drive timers: the experiment's own ramps and any due pending transition.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Outcome<E::Observation>> {
        let outcome = if self.step == LabStep::Experiment {
            self.experiment.tick(now)
        } else {
            None
        };
        if let Some(outcome) = &outcome {
            self.absorb(outcome);
        }
        self.fire_pending(now, |p| p.fire_if_due(now));
        outcome
    }

    /// Read-through callback for the narration with `revision`.
    ///
    /// Fires the pending transition tied to that narration, if it is still
    /// the message on screen.
    pub fn narration_finished(&mut self, revision: u64, now: DateTime<Utc>) -> Option<LabStep> {
        let tied = self
            .pending
            .as_ref()
            .is_some_and(|s| s.on_narration == Some(revision));
        if !tied || !self.narrator.is_current(revision) {
            return None;
        }
        self.fire_pending(now, PendingTransition::fire_now)
    }

    /// Return to `Intro`, clearing every piece of session state.
    ///
    /// The replay gets a fresh session id so its quiz attempts are logged
    /// apart from the previous run's.
    pub fn reset(&mut self) {
        let from = self.step;
        self.id = LabSessionId::generate();
        self.step = LabStep::Intro;
        self.supplies.reset();
        self.experiment.reset();
        self.quiz.reset();
        self.pending = None;
        self.started_at = None;
        self.completion = None;
        self.events.clear();
        if from != LabStep::Intro {
            self.events.push(LabEvent::StepChanged {
                from,
                to: LabStep::Intro,
            });
        }
        self.say(self.definition.intro_message.clone(), Emotion::Explaining);
        debug!(lab_id = %self.definition.id, from = %from, "session reset");
    }

    //
    // ─── STEP ACTIONS ──────────────────────────────────────────────────────────
    //

    /// Collect a supply. Repeats and unknown ids are no-ops.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::WrongStep` outside `CollectSupplies`.
    pub fn collect(&mut self, id: &SupplyId) -> Result<CollectOutcome, SessionError> {
        self.ensure_step(LabStep::CollectSupplies, "collect supplies")?;
        let outcome = self.supplies.collect(id);
        match outcome {
            CollectOutcome::Collected { remaining } => {
                let name = self
                    .supplies
                    .item(id)
                    .map_or_else(|| id.to_string(), |item| item.name.clone());
                let description = if remaining == 0 {
                    "All supplies collected".to_string()
                } else {
                    format!("{remaining} more to go")
                };
                self.notify(
                    Notification::new(Severity::Success, format!("Collected {name}"))
                        .with_description(description),
                );
                if remaining == 0 {
                    self.say(
                        "Perfect! Now that we have all our supplies, we're ready to continue.",
                        Emotion::Happy,
                    );
                }
            }
            CollectOutcome::AlreadyCollected => {}
            CollectOutcome::Unknown => {
                debug!(lab_id = %self.definition.id, supply = %id, "ignoring unknown supply");
            }
        }
        Ok(outcome)
    }

    /// Apply an experiment action.
    ///
    /// # Errors
    ///
    /// Returns `WrongStep` outside `Experiment`, or the experiment's rejection.
    pub fn act(
        &mut self,
        action: E::Action,
        now: DateTime<Utc>,
    ) -> Result<Outcome<E::Observation>, SessionError> {
        self.ensure_step(LabStep::Experiment, "experiment")?;
        let outcome = self.experiment.apply(action, now)?;
        self.absorb(&outcome);
        Ok(outcome)
    }

    /// Select an option for a quiz question.
    ///
    /// # Errors
    ///
    /// Returns `WrongStep` outside `Quiz`, or `SessionError::Quiz` when the
    /// sheet is locked or the indices are out of range.
    pub fn answer(&mut self, question: usize, option: usize) -> Result<(), SessionError> {
        self.ensure_step(LabStep::Quiz, "answer")?;
        self.quiz.answer(question, option)?;
        Ok(())
    }

    /// The dual-purpose submit/retry button.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::WrongStep` outside `Quiz`.
    pub fn submit_quiz(&mut self, now: DateTime<Utc>) -> Result<QuizAction, SessionError> {
        self.ensure_step(LabStep::Quiz, "submit quiz")?;
        let action = self.quiz.submit();
        match action {
            QuizAction::Graded(grade) if grade.is_perfect() => self.on_passed(grade, now),
            QuizAction::Graded(grade) => self.on_failed(grade),
            QuizAction::Retried => {
                self.say(
                    "Let's try again. Your previous answers have been cleared.",
                    Emotion::Encouraging,
                );
            }
            QuizAction::AlreadyPassed => {}
        }
        Ok(action)
    }

    //
    // ─── COMPLETION ────────────────────────────────────────────────────────────
    //

    /// Score to record for a passed quiz, per the lab's score policy.
    #[must_use]
    pub fn passing_score(&self) -> Option<u8> {
        self.quiz.is_passed().then(|| {
            self.definition
                .score_policy
                .score_for_attempt(self.quiz.attempts())
        })
    }

    /// True when the quiz is passed but the completion is not yet recorded.
    #[must_use]
    pub fn needs_completion(&self) -> bool {
        self.quiz.is_passed() && self.completion.is_none()
    }

    /// Attach the progress store's receipt. Only the first receipt is kept.
    pub fn record_completion(&mut self, receipt: CompletionReceipt) {
        if self.completion.is_some() {
            return;
        }
        if receipt.xp_awarded > 0 {
            self.notify(
                Notification::new(Severity::Success, format!("+{} XP", receipt.xp_awarded))
                    .with_description(format!("{} complete", self.definition.title)),
            );
        }
        self.completion = Some(receipt);
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────────
    //

    fn ensure_step(&self, expected: LabStep, action: &'static str) -> Result<(), SessionError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(SessionError::WrongStep {
                action,
                step: self.step,
            })
        }
    }

    fn say(&mut self, message: impl Into<String>, emotion: Emotion) -> u64 {
        let message = message.into();
        let revision = self.narrator.say(message.clone(), emotion);
        self.events.push(LabEvent::Narration {
            message,
            emotion,
            revision,
        });
        revision
    }

    fn notify(&mut self, notification: Notification) {
        self.events.push(LabEvent::Notify(notification));
    }

    fn schedule(&mut self, to: LabStep, now: DateTime<Utc>, on_narration: Option<u64>) {
        let delay = match self.step {
            LabStep::Results => self.definition.results_delay,
            _ => self.definition.celebration_delay,
        };
        self.pending = Some(Scheduled {
            transition: PendingTransition::new(self.step, to, now + delay),
            on_narration,
        });
    }

    /// Fire the pending transition through `trigger`; it only lands if the
    /// session is still in the step it was scheduled from.
    ///
    /// Completion stays armed until the progress store has a record, so a
    /// failed save never shows the finish screen without XP.
    fn fire_pending(
        &mut self,
        now: DateTime<Utc>,
        trigger: impl FnOnce(&mut PendingTransition) -> Option<LabStep>,
    ) -> Option<LabStep> {
        let completion_missing = self.completion.is_none();
        let scheduled = self.pending.as_mut()?;
        if scheduled.transition.to() == LabStep::Complete && completion_missing {
            return None;
        }
        let from = scheduled.transition.from();
        let to = trigger(&mut scheduled.transition)?;
        if self.step != from {
            return None;
        }
        self.move_to(to, now);
        Some(to)
    }

    /// The only place `step` moves forward.
    fn move_to(&mut self, to: LabStep, now: DateTime<Utc>) {
        let from = self.step;
        if to <= from {
            debug_assert!(false, "backward transition {from} -> {to}");
            return;
        }
        self.step = to;
        self.pending = None;
        self.events.push(LabEvent::StepChanged { from, to });
        debug!(lab_id = %self.definition.id, from = %from, to = %to, "step changed");

        match to {
            LabStep::Intro => {}
            LabStep::CollectSupplies => {
                self.say(
                    "Before we begin, let's gather all the materials we'll need. Click each item to collect it!",
                    Emotion::Explaining,
                );
            }
            LabStep::Setup => {
                self.say(
                    "Let's review the procedure and set up the apparatus before we start.",
                    Emotion::Explaining,
                );
            }
            LabStep::Experiment => {
                self.say(
                    "Now for the exciting part! Follow the procedure and observe carefully.",
                    Emotion::Encouraging,
                );
            }
            LabStep::Results => {
                self.say(
                    "Outstanding work! Let's look at what the results tell us.",
                    Emotion::Happy,
                );
                self.schedule(LabStep::Quiz, now, None);
            }
            LabStep::Quiz => {
                self.say(
                    "Time to test your understanding! Answer every question correctly to finish the lab.",
                    Emotion::Explaining,
                );
            }
            LabStep::Complete => {
                let message = match &self.completion {
                    Some(receipt) if receipt.xp_awarded > 0 => format!(
                        "Congratulations! You've successfully completed {} and earned {} XP.",
                        self.definition.title, receipt.xp_awarded
                    ),
                    _ => format!(
                        "Congratulations! You've successfully completed {}.",
                        self.definition.title
                    ),
                };
                self.say(message, Emotion::Celebrating);
            }
        }
    }

    fn absorb(&mut self, outcome: &Outcome<E::Observation>) {
        if let Some(narration) = &outcome.narration {
            self.say(narration.clone(), Emotion::Encouraging);
        }
        if !outcome.trial_completed {
            return;
        }
        let completed = self.experiment.completed_trials();
        let required = self.experiment.required_trials();
        if completed == required {
            self.notify(
                Notification::new(Severity::Success, "All trials complete")
                    .with_description("Continue to the results"),
            );
        } else if completed < required {
            self.notify(
                Notification::new(Severity::Info, "Trial recorded")
                    .with_description(format!("{completed} of {required} complete")),
            );
        }
    }

    fn on_passed(&mut self, grade: QuizGrade, now: DateTime<Utc>) {
        self.events.push(LabEvent::Celebrate);
        self.notify(
            Notification::new(Severity::Success, "Perfect score!")
                .with_description(format!("{}/{} correct", grade.correct, grade.total)),
        );
        let revision = self.say(
            format!(
                "Perfect score! You've mastered {}. Excellent work!",
                self.definition.title
            ),
            Emotion::Celebrating,
        );
        self.schedule(LabStep::Complete, now, Some(revision));
    }

    fn on_failed(&mut self, grade: QuizGrade) {
        let message = if grade.percent() >= MOSTLY_CORRECT_PERCENT {
            "Good effort! You got most of the answers correct. Review the material, then press submit again to retry."
        } else {
            "Keep learning! Review what we observed, then press submit again to retry."
        };
        self.notify(
            Notification::new(
                Severity::Warning,
                format!("Score: {}/{}", grade.correct, grade.total),
            )
            .with_description(format!(
                "{}% correct. Press submit again to retry",
                grade.percent()
            )),
        );
        self.say(message, Emotion::Encouraging);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lab_core::labs::titration::{self, Titration, TitrationAction};
    use lab_core::labs::water::{self, WaterAction, WaterTest, WaterTestBench};
    use lab_core::model::{CompletionRecord, QuizError, ScorePolicy};
    use lab_core::time::fixed_now;

    const TITRATION_KEY: [usize; 3] = [0, 0, 1];

    fn titration_session() -> LabSession<Titration> {
        LabSession::new(titration::definition(), Titration::new()).unwrap()
    }

    fn collect_all<E: Experiment>(session: &mut LabSession<E>) {
        let ids: Vec<SupplyId> = session
            .definition()
            .supplies
            .iter()
            .map(|item| item.id.clone())
            .collect();
        for id in &ids {
            session.collect(id).unwrap();
        }
    }

    fn run_trials(session: &mut LabSession<Titration>, trials: usize) {
        for trial in 1..=trials {
            session
                .act(TitrationAction::Start(trial), fixed_now())
                .unwrap();
            for _ in 0..titration::EQUIVALENCE_POINT_ML {
                session.act(TitrationAction::AddBase, fixed_now()).unwrap();
            }
            session.act(TitrationAction::Complete, fixed_now()).unwrap();
        }
    }

    fn at_results() -> LabSession<Titration> {
        let mut session = titration_session();
        session.start(fixed_now()).unwrap();
        collect_all(&mut session);
        session.advance(fixed_now()).unwrap();
        run_trials(&mut session, titration::TRIALS);
        session.advance(fixed_now()).unwrap();
        assert_eq!(session.step(), LabStep::Results);
        session
    }

    fn at_quiz() -> LabSession<Titration> {
        let mut session = at_results();
        assert!(session.take_quiz(fixed_now()).unwrap());
        session
    }

    fn answer_with(session: &mut LabSession<Titration>, key: [usize; 3]) {
        for (question, option) in key.into_iter().enumerate() {
            session.answer(question, option).unwrap();
        }
    }

    fn record_perfect(session: &mut LabSession<Titration>) {
        let record =
            CompletionRecord::new(session.lab_id().clone(), 100, 100, 60, fixed_now()).unwrap();
        session.record_completion(CompletionReceipt {
            record,
            xp_awarded: 100,
            newly_completed: true,
        });
    }

    fn step_changes(events: &[LabEvent]) -> Vec<(LabStep, LabStep)> {
        events
            .iter()
            .filter_map(|e| match e {
                LabEvent::StepChanged { from, to } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn walkthrough_only_moves_forward() {
        let mut session = at_quiz();
        answer_with(&mut session, TITRATION_KEY);
        session.submit_quiz(fixed_now()).unwrap();
        record_perfect(&mut session);
        assert!(session.finish(fixed_now()).unwrap());

        let changes = step_changes(&session.drain_events());
        let visited: Vec<LabStep> = changes.iter().map(|(_, to)| *to).collect();
        assert_eq!(
            visited,
            [
                LabStep::CollectSupplies,
                LabStep::Experiment,
                LabStep::Results,
                LabStep::Quiz,
                LabStep::Complete,
            ]
        );
        assert!(changes.iter().all(|(from, to)| to > from));
        assert!(session.progress().is_complete());
    }

    #[test]
    fn every_trigger_is_forward_only() {
        let mut session = titration_session();
        let far = fixed_now() + Duration::hours(1);
        let mut last = session.step();
        let mut check = |session: &mut LabSession<Titration>| {
            let _ = session.advance(fixed_now());
            let _ = session.take_quiz(fixed_now());
            let _ = session.finish(fixed_now());
            let _ = session.tick(far);
            let revision = session.narrator().revision();
            let _ = session.narration_finished(revision, far);
            assert!(session.step() >= last, "{} went back to {}", last, session.step());
            last = session.step();
        };

        check(&mut session);
        collect_all(&mut session);
        check(&mut session);
        run_trials(&mut session, titration::TRIALS);
        check(&mut session);
        check(&mut session);
        answer_with(&mut session, TITRATION_KEY);
        session.submit_quiz(fixed_now()).unwrap();
        check(&mut session);
        assert_eq!(session.step(), LabStep::Quiz);
        record_perfect(&mut session);
        check(&mut session);
        assert_eq!(session.step(), LabStep::Complete);

        session.reset();
        assert_eq!(session.step(), LabStep::Intro);
    }

    #[test]
    fn supplies_gate_blocks_advance() {
        let mut session = titration_session();
        session.start(fixed_now()).unwrap();
        session.collect(&SupplyId::new("hcl")).unwrap();
        session.collect(&SupplyId::new("naoh")).unwrap();

        let err = session.advance(fixed_now()).unwrap_err();
        assert!(matches!(err, SessionError::SuppliesMissing { remaining: 2 }));
        assert_eq!(session.step(), LabStep::CollectSupplies);
    }

    #[test]
    fn unknown_and_repeated_supplies_are_noops() {
        let mut session = titration_session();
        session.start(fixed_now()).unwrap();
        session.drain_events();

        assert_eq!(
            session.collect(&SupplyId::new("bunsen-burner")).unwrap(),
            CollectOutcome::Unknown
        );
        session.collect(&SupplyId::new("hcl")).unwrap();
        assert_eq!(
            session.collect(&SupplyId::new("hcl")).unwrap(),
            CollectOutcome::AlreadyCollected
        );
        assert_eq!(session.supplies().collected_count(), 1);

        let notifications = session
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, LabEvent::Notify(_)))
            .count();
        assert_eq!(notifications, 1, "only the first collect confirms");
    }

    #[test]
    fn actions_are_rejected_outside_their_step() {
        let mut session = titration_session();
        assert!(matches!(
            session.act(TitrationAction::AddBase, fixed_now()),
            Err(SessionError::WrongStep { step: LabStep::Intro, .. })
        ));
        assert!(matches!(
            session.collect(&SupplyId::new("hcl")),
            Err(SessionError::WrongStep { .. })
        ));
        assert!(matches!(
            session.take_quiz(fixed_now()),
            Err(SessionError::WrongStep { .. })
        ));

        session.start(fixed_now()).unwrap();
        assert!(matches!(
            session.start(fixed_now()),
            Err(SessionError::WrongStep { .. })
        ));
        assert!(matches!(
            session.answer(0, 0),
            Err(SessionError::WrongStep { .. })
        ));
    }

    #[test]
    fn trials_gate_blocks_results() {
        let mut session = titration_session();
        session.start(fixed_now()).unwrap();
        collect_all(&mut session);
        session.advance(fixed_now()).unwrap();
        run_trials(&mut session, 2);

        let err = session.advance(fixed_now()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::TrialsIncomplete {
                completed: 2,
                required: 3
            }
        ));
        assert_eq!(err.to_string(), "complete all 3 trials first (2 done)");
        assert_eq!(session.step(), LabStep::Experiment);
    }

    #[test]
    fn experiment_rejection_leaves_session_alone() {
        let mut session = titration_session();
        session.start(fixed_now()).unwrap();
        collect_all(&mut session);
        session.advance(fixed_now()).unwrap();
        session.act(TitrationAction::Start(1), fixed_now()).unwrap();

        let err = session.act(TitrationAction::Complete, fixed_now()).unwrap_err();
        assert!(matches!(err, SessionError::Experiment(_)));
        assert!(err.is_rejection());
        assert_eq!(session.experiment().active_trial(), Some(1));
    }

    #[test]
    fn explicit_take_quiz_beats_results_timer() {
        let mut session = at_results();
        let t0 = fixed_now();

        assert!(session.tick(t0 + Duration::seconds(24)).is_none());
        assert_eq!(session.step(), LabStep::Results);

        assert!(session.take_quiz(t0 + Duration::seconds(24)).unwrap());
        assert_eq!(session.step(), LabStep::Quiz);
        session.drain_events();

        session.tick(t0 + Duration::seconds(30));
        assert_eq!(session.step(), LabStep::Quiz);
        assert!(step_changes(&session.drain_events()).is_empty());
    }

    #[test]
    fn results_timer_beats_take_quiz() {
        let mut session = at_results();
        session.tick(fixed_now() + titration::definition().results_delay);
        assert_eq!(session.step(), LabStep::Quiz);
        session.drain_events();

        assert!(!session.take_quiz(fixed_now()).unwrap());
        assert!(step_changes(&session.drain_events()).is_empty());
    }

    #[test]
    fn partial_quiz_then_retry_clears_answers() {
        let mut session = at_quiz();
        answer_with(&mut session, [0, 0, 0]);
        session.drain_events();

        let action = session.submit_quiz(fixed_now()).unwrap();
        let QuizAction::Graded(grade) = action else {
            panic!("expected a grade, got {action:?}");
        };
        assert_eq!((grade.correct, grade.total), (2, 3));
        assert!(session.quiz().is_submitted());
        assert!(!session.needs_completion());

        let warned = session.drain_events().into_iter().any(|e| {
            matches!(e, LabEvent::Notify(n) if n.severity == Severity::Warning
                && n.title == "Score: 2/3"
                && n.description.as_deref() == Some("66% correct. Press submit again to retry"))
        });
        assert!(warned);
        assert!(session.narrator().message().starts_with("Good effort!"));
        assert!(matches!(
            session.answer(2, 1),
            Err(SessionError::Quiz(QuizError::Locked))
        ));
        assert!(matches!(
            session.finish(fixed_now()),
            Err(SessionError::QuizNotPassed)
        ));

        assert_eq!(session.submit_quiz(fixed_now()).unwrap(), QuizAction::Retried);
        assert!(!session.quiz().is_submitted());
        assert_eq!(session.quiz().answered_count(), 0);
        assert_eq!(session.step(), LabStep::Quiz);
    }

    #[test]
    fn perfect_quiz_celebrates_then_completes_on_narration() {
        let mut session = at_quiz();
        answer_with(&mut session, TITRATION_KEY);
        session.drain_events();

        session.submit_quiz(fixed_now()).unwrap();
        assert!(session.drain_events().contains(&LabEvent::Celebrate));
        let pending = session.pending().unwrap();
        assert_eq!((pending.from(), pending.to()), (LabStep::Quiz, LabStep::Complete));
        record_perfect(&mut session);

        let revision = session.narrator().revision();
        assert!(session.narration_finished(revision - 1, fixed_now()).is_none());
        assert_eq!(
            session.narration_finished(revision, fixed_now()),
            Some(LabStep::Complete)
        );

        session.drain_events();
        session.tick(fixed_now() + Duration::seconds(10));
        assert_eq!(session.narration_finished(revision, fixed_now()), None);
        assert!(step_changes(&session.drain_events()).is_empty());
    }

    #[test]
    fn celebration_timer_completes_the_lab() {
        let mut session = at_quiz();
        answer_with(&mut session, TITRATION_KEY);
        session.submit_quiz(fixed_now()).unwrap();
        record_perfect(&mut session);

        session.tick(fixed_now() + Duration::seconds(1));
        assert_eq!(session.step(), LabStep::Quiz);
        session.tick(fixed_now() + Duration::seconds(2));
        assert_eq!(session.step(), LabStep::Complete);
        assert!(!session.finish(fixed_now()).unwrap());
    }

    #[test]
    fn completion_waits_for_a_recorded_receipt() {
        let mut session = at_quiz();
        answer_with(&mut session, TITRATION_KEY);
        session.submit_quiz(fixed_now()).unwrap();
        let revision = session.narrator().revision();
        session.drain_events();

        assert_eq!(session.narration_finished(revision, fixed_now()), None);
        session.tick(fixed_now() + Duration::seconds(3));
        assert!(matches!(
            session.finish(fixed_now()),
            Err(SessionError::CompletionNotRecorded)
        ));
        assert_eq!(session.step(), LabStep::Quiz);
        assert!(session.needs_completion());
        assert!(step_changes(&session.drain_events()).is_empty());

        record_perfect(&mut session);
        session.tick(fixed_now() + Duration::seconds(4));
        assert_eq!(session.step(), LabStep::Complete);
        assert!(session.narrator().message().contains("earned 100 XP"));
    }

    #[test]
    fn repeated_perfect_submit_is_a_noop() {
        let mut session = at_quiz();
        answer_with(&mut session, TITRATION_KEY);
        session.submit_quiz(fixed_now()).unwrap();
        assert_eq!(
            session.submit_quiz(fixed_now()).unwrap(),
            QuizAction::AlreadyPassed
        );
        assert_eq!(session.quiz().attempts(), 1);
    }

    #[test]
    fn tiered_policy_scores_later_attempts_lower() {
        let definition = titration::definition().with_score_policy(ScorePolicy::AttemptTiered);
        let mut session = LabSession::new(definition, Titration::new()).unwrap();
        session.start(fixed_now()).unwrap();
        collect_all(&mut session);
        session.advance(fixed_now()).unwrap();
        run_trials(&mut session, titration::TRIALS);
        session.advance(fixed_now()).unwrap();
        session.take_quiz(fixed_now()).unwrap();

        answer_with(&mut session, [1, 1, 1]);
        session.submit_quiz(fixed_now()).unwrap();
        assert_eq!(session.passing_score(), None);
        session.submit_quiz(fixed_now()).unwrap();
        answer_with(&mut session, TITRATION_KEY);
        session.submit_quiz(fixed_now()).unwrap();

        assert_eq!(session.passing_score(), Some(75));
        assert!(session.needs_completion());
    }

    #[test]
    fn only_the_first_receipt_is_kept() {
        let mut session = at_quiz();
        answer_with(&mut session, TITRATION_KEY);
        session.submit_quiz(fixed_now()).unwrap();

        let record =
            CompletionRecord::new(session.lab_id().clone(), 100, 100, 60, fixed_now()).unwrap();
        session.record_completion(CompletionReceipt {
            record: record.clone(),
            xp_awarded: 100,
            newly_completed: true,
        });
        session.record_completion(CompletionReceipt {
            record,
            xp_awarded: 0,
            newly_completed: false,
        });

        assert!(!session.needs_completion());
        assert_eq!(session.progress().xp_earned, Some(100));
    }

    #[test]
    fn reset_returns_to_a_fresh_intro() {
        let mut session = at_quiz();
        answer_with(&mut session, [0, 0, 0]);
        session.submit_quiz(fixed_now()).unwrap();
        let first_run = session.id();

        session.reset();
        assert_ne!(session.id(), first_run);
        assert_eq!(session.step(), LabStep::Intro);
        assert_eq!(session.supplies().collected_count(), 0);
        assert_eq!(session.experiment().completed_trials(), 0);
        assert_eq!(session.quiz().attempts(), 0);
        assert!(session.pending().is_none());
        assert!(session.started_at().is_none());
        assert_eq!(
            session.narrator().message(),
            titration::definition().intro_message
        );
    }

    #[test]
    fn labs_with_setup_pass_through_it() {
        let mut session = LabSession::new(water::definition(), WaterTestBench::new()).unwrap();
        let now = fixed_now();
        session.start(now).unwrap();
        collect_all(&mut session);
        assert_eq!(session.advance(now).unwrap(), LabStep::Setup);
        assert!(matches!(
            session.act(WaterAction::AddWater, now),
            Err(SessionError::WrongStep { step: LabStep::Setup, .. })
        ));
        assert_eq!(session.advance(now).unwrap(), LabStep::Experiment);

        session
            .act(WaterAction::Select(WaterTest::CopperSulfate), now)
            .unwrap();
        session.act(WaterAction::AddWater, now).unwrap();
        assert!(session.advance(now).is_err());

        let outcome = session.tick(now + Duration::seconds(2)).unwrap();
        assert!(outcome.trial_completed);
        assert_eq!(session.advance(now).unwrap(), LabStep::Results);
    }
}
