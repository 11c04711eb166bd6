mod completion;
mod ids;
mod narration;
mod pending;
mod quiz;
mod step;
mod supplies;

pub use completion::{CompletionError, CompletionRecord, MAX_SCORE, XpPolicy};
pub use ids::{LabId, LabIdError, LabSessionId, SupplyId};
pub use narration::{Emotion, Narrator};
pub use pending::PendingTransition;
pub use quiz::{Quiz, QuizAction, QuizError, QuizGrade, QuizQuestion, ScorePolicy};
pub use step::{LabStep, StepParseError};
pub use supplies::{CollectOutcome, SupplyGate, SupplyItem};
