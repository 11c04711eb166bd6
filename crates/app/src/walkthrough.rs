//! Scripted, simulated-time playthrough of a lab from intro to completion.

use std::fmt;

use chrono::Duration;
use lab_core::Clock;
use lab_core::labs::flame::{
    FULL_INTENSITY, FlameAction, FlameTest, HEAT_STEP_MILLIS, HEAT_STEP_PERCENT, MetalSalt,
};
use lab_core::labs::refraction::{Medium, RefractionAction, RefractionBench};
use lab_core::labs::titration::{
    BASE_INCREMENT_ML, EQUIVALENCE_POINT_ML, TRIALS, Titration, TitrationAction,
};
use lab_core::labs::water::{HYDRATION_DELAY_MILLIS, WaterAction, WaterTest, WaterTestBench};
use lab_core::labs::{Experiment, LabDefinition, LabKind};
use lab_core::model::{LabId, LabStep, QuizQuestion, SupplyId};
use services::{CompletionReceipt, LabLoopService, LabSession, SessionError};
use tracing::debug;

/// Simulated time between two learner actions.
const ACTION_PACE_SECS: i64 = 2;

#[derive(Debug)]
pub enum WalkthroughError {
    Session(SessionError),
    Stuck { lab_id: LabId, step: LabStep },
}

impl fmt::Display for WalkthroughError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalkthroughError::Session(err) => write!(f, "{err}"),
            WalkthroughError::Stuck { lab_id, step } => {
                write!(f, "walkthrough of {lab_id} stalled at step {step}")
            }
        }
    }
}

impl std::error::Error for WalkthroughError {}

impl From<SessionError> for WalkthroughError {
    fn from(err: SessionError) -> Self {
        WalkthroughError::Session(err)
    }
}

#[derive(Debug, Clone)]
pub enum ScriptStep<A> {
    Act(A),
    /// Let simulated time pass, then tick the session.
    Wait(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkthroughReport {
    pub lab_id: LabId,
    pub title: String,
    pub final_step: LabStep,
    pub quiz_attempts: u32,
    pub receipt: Option<CompletionReceipt>,
}

/// Play `kind` through every step on a simulated clock starting at `start`.
///
/// # Errors
///
/// Returns `WalkthroughError::Session` if the progress store fails, and
/// `WalkthroughError::Stuck` if a scripted action is rejected.
pub async fn run(
    kind: LabKind,
    lab_loop: &LabLoopService,
    start: Clock,
) -> Result<WalkthroughReport, WalkthroughError> {
    let mut driver = Driver {
        lab_loop: lab_loop.clone().with_clock(start),
        clock: start,
    };
    let definition = kind.definition();
    match kind {
        LabKind::Titration => {
            driver
                .drive(definition, Titration::new(), titration_script())
                .await
        }
        LabKind::FlameTest => {
            driver
                .drive(definition, FlameTest::new(), flame_script())
                .await
        }
        LabKind::Refraction => {
            driver
                .drive(definition, RefractionBench::new(), refraction_script())
                .await
        }
        LabKind::WaterTest => {
            driver
                .drive(definition, WaterTestBench::new(), water_script())
                .await
        }
    }
}

// ─── SCRIPTS ────────────────────────────────────────────────────────────────

fn titration_script() -> Vec<ScriptStep<TitrationAction>> {
    let drops = EQUIVALENCE_POINT_ML / BASE_INCREMENT_ML;
    let mut script = Vec::new();
    for trial in 1..=TRIALS {
        script.push(ScriptStep::Act(TitrationAction::Start(trial)));
        script.extend((0..drops).map(|_| ScriptStep::Act(TitrationAction::AddBase)));
        script.push(ScriptStep::Act(TitrationAction::Complete));
    }
    script
}

fn flame_script() -> Vec<ScriptStep<FlameAction>> {
    let steps = FULL_INTENSITY / HEAT_STEP_PERCENT;
    let mut script = vec![
        ScriptStep::Act(FlameAction::Select(MetalSalt::SodiumChloride)),
        ScriptStep::Act(FlameAction::StartHeating),
    ];
    script.extend(
        (0..steps).map(|_| ScriptStep::Wait(Duration::milliseconds(HEAT_STEP_MILLIS))),
    );
    script
}

fn refraction_script() -> Vec<ScriptStep<RefractionAction>> {
    vec![
        ScriptStep::Act(RefractionAction::Measure),
        ScriptStep::Act(RefractionAction::SetMedium(Medium::Water)),
        ScriptStep::Act(RefractionAction::SetIncidentAngle(45.0)),
        ScriptStep::Act(RefractionAction::Measure),
        ScriptStep::Act(RefractionAction::SetMedium(Medium::Glass)),
        ScriptStep::Act(RefractionAction::SetIncidentAngle(60.0)),
        ScriptStep::Act(RefractionAction::Measure),
    ]
}

fn water_script() -> Vec<ScriptStep<WaterAction>> {
    let reaction = Duration::milliseconds(HYDRATION_DELAY_MILLIS);
    WaterTest::ALL
        .into_iter()
        .flat_map(|test| {
            [
                ScriptStep::Act(WaterAction::Select(test)),
                ScriptStep::Act(WaterAction::AddWater),
                ScriptStep::Wait(reaction),
            ]
        })
        .collect()
}

// ─── DRIVER ─────────────────────────────────────────────────────────────────

struct Driver {
    lab_loop: LabLoopService,
    clock: Clock,
}

impl Driver {
    fn wait(&mut self, delta: Duration) {
        self.clock.advance(delta);
        self.lab_loop = self.lab_loop.clone().with_clock(self.clock);
    }

    async fn drive<E: Experiment>(
        &mut self,
        definition: LabDefinition,
        experiment: E,
        script: Vec<ScriptStep<E::Action>>,
    ) -> Result<WalkthroughReport, WalkthroughError> {
        let mut session = self.lab_loop.open(definition, experiment)?;
        self.wait(Duration::seconds(ACTION_PACE_SECS));
        self.lab_loop
            .start(&mut session)?
            .ok_or_else(|| stuck(&session))?;

        let supplies: Vec<SupplyId> = session
            .supplies()
            .required()
            .iter()
            .map(|item| item.id.clone())
            .collect();
        for id in &supplies {
            self.wait(Duration::seconds(ACTION_PACE_SECS));
            self.lab_loop
                .collect(&mut session, id)?
                .ok_or_else(|| stuck(&session))?;
        }
        while session.step() < LabStep::Experiment {
            self.lab_loop
                .advance(&mut session)?
                .ok_or_else(|| stuck(&session))?;
        }

        for step in script {
            match step {
                ScriptStep::Act(action) => {
                    self.wait(Duration::seconds(ACTION_PACE_SECS));
                    self.lab_loop
                        .act(&mut session, action)?
                        .ok_or_else(|| stuck(&session))?;
                }
                ScriptStep::Wait(delta) => {
                    self.wait(delta);
                    self.lab_loop.tick(&mut session);
                }
            }
        }

        self.lab_loop
            .advance(&mut session)?
            .ok_or_else(|| stuck(&session))?;
        let results_delay = session.definition().results_delay;
        self.wait(results_delay);
        self.lab_loop.tick(&mut session);
        if session.step() == LabStep::Results {
            self.lab_loop
                .take_quiz(&mut session)?
                .ok_or_else(|| stuck(&session))?;
        }

        let answers: Vec<usize> = session
            .quiz()
            .questions()
            .iter()
            .map(QuizQuestion::correct_option)
            .collect();
        for (question, option) in answers.into_iter().enumerate() {
            self.wait(Duration::seconds(ACTION_PACE_SECS));
            self.lab_loop
                .answer(&mut session, question, option)?
                .ok_or_else(|| stuck(&session))?;
        }
        let submission = self
            .lab_loop
            .submit_quiz(&mut session)
            .await?
            .ok_or_else(|| stuck(&session))?;
        debug!(lab_id = %session.lab_id(), action = ?submission.action, "quiz submitted");

        let revision = session.narrator().revision();
        self.lab_loop.narration_finished(&mut session, revision);
        if session.step() == LabStep::Quiz {
            let celebration = session.definition().celebration_delay;
            self.wait(celebration);
            self.lab_loop.tick(&mut session);
        }
        if session.step() != LabStep::Complete {
            return Err(stuck(&session));
        }

        Ok(WalkthroughReport {
            lab_id: session.lab_id().clone(),
            title: session.definition().title.clone(),
            final_step: session.step(),
            quiz_attempts: session.quiz().attempts(),
            receipt: submission.receipt.or_else(|| session.completion().cloned()),
        })
    }
}

fn stuck<E: Experiment>(session: &LabSession<E>) -> WalkthroughError {
    WalkthroughError::Stuck {
        lab_id: session.lab_id().clone(),
        step: session.step(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lab_core::time::fixed_clock;
    use services::{AppServices, RecordingFeedback};

    use super::*;

    fn services() -> (AppServices, Arc<RecordingFeedback>) {
        let feedback = Arc::new(RecordingFeedback::new());
        let services = AppServices::in_memory(fixed_clock(), feedback.clone());
        (services, feedback)
    }

    #[tokio::test]
    async fn every_lab_plays_through_to_completion() {
        let (services, feedback) = services();
        for kind in LabKind::ALL {
            let report = run(kind, &services.lab_loop(), fixed_clock())
                .await
                .expect("walkthrough");
            assert_eq!(report.lab_id, kind.id());
            assert_eq!(report.final_step, LabStep::Complete);
            assert_eq!(report.quiz_attempts, 1);
            let receipt = report.receipt.expect("receipt");
            assert!(receipt.newly_completed);
            assert_eq!(receipt.record.score(), 100);
            assert_eq!(receipt.xp_awarded, 100);
            assert!(receipt.record.time_spent_secs() > 0);
        }
        assert_eq!(feedback.celebrations(), LabKind::ALL.len());

        let overview = services.progress().overview().await.expect("overview");
        assert_eq!(overview.completed_labs, LabKind::ALL.len());
        assert_eq!(overview.total_xp, 400);
    }

    #[tokio::test]
    async fn replaying_a_completed_lab_awards_no_xp() {
        let (services, _feedback) = services();
        let lab_loop = services.lab_loop();
        run(LabKind::WaterTest, &lab_loop, fixed_clock())
            .await
            .expect("first run");
        let replay = run(LabKind::WaterTest, &lab_loop, fixed_clock())
            .await
            .expect("replay");

        let receipt = replay.receipt.expect("receipt");
        assert!(!receipt.newly_completed);
        assert_eq!(receipt.xp_awarded, 0);
        let overview = services.progress().overview().await.expect("overview");
        assert_eq!(overview.total_xp, 100);
    }

    #[test]
    fn titration_script_reaches_equivalence_each_trial() {
        let script = titration_script();
        let drops = script
            .iter()
            .filter(|step| matches!(step, ScriptStep::Act(TitrationAction::AddBase)))
            .count();
        assert_eq!(drops, TRIALS * EQUIVALENCE_POINT_ML as usize);
    }
}
