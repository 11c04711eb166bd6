mod progress;
mod session;
mod workflow;

// Public API of the lab subsystem.
pub use crate::error::SessionError;
pub use progress::LabProgress;
pub use session::{LabEvent, LabSession};
pub use workflow::{LabLoopService, QuizSubmission};
