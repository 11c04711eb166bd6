/// Mood hint rendered next to the narrator's message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Emotion {
    #[default]
    Explaining,
    Encouraging,
    Happy,
    Celebrating,
}

/// The teacher-voice message currently on screen.
///
/// Each `set_message` bumps `revision`, so a read-through callback can tell
/// whether it belongs to the message that is still displayed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Narrator {
    message: String,
    emotion: Emotion,
    revision: u64,
}

impl Narrator {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        let mut narrator = Self::default();
        narrator.set_message(message);
        narrator
    }

    /// Replace the displayed message, keeping the current emotion.
    pub fn set_message(&mut self, message: impl Into<String>) -> u64 {
        self.message = message.into();
        self.revision += 1;
        self.revision
    }

    pub fn say(&mut self, message: impl Into<String>, emotion: Emotion) -> u64 {
        self.emotion = emotion;
        self.set_message(message)
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn emotion(&self) -> Emotion {
        self.emotion
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// True if `revision` refers to the message currently displayed.
    #[must_use]
    pub fn is_current(&self, revision: u64) -> bool {
        revision == self.revision
    }
}
