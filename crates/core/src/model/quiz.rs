use std::collections::BTreeMap;

use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz needs at least one question")]
    Empty,
    #[error("question {question} marks option {correct} correct but only has {options} options")]
    InvalidAnswerKey {
        question: usize,
        correct: usize,
        options: usize,
    },
    #[error("answers are locked until the quiz is retried")]
    Locked,
    #[error("question {0} does not exist")]
    UnknownQuestion(usize),
    #[error("question {question} has no option {option}")]
    UnknownOption { question: usize, option: usize },
}

//
// ─── QUESTIONS ────────────────────────────────────────────────────────────────
//

/// A fixed multiple-choice question with a single correct option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    prompt: String,
    options: Vec<String>,
    correct: usize,
}

impl QuizQuestion {
    #[must_use]
    pub fn new<I, S>(prompt: impl Into<String>, options: I, correct: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prompt: prompt.into(),
            options: options.into_iter().map(Into::into).collect(),
            correct,
        }
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_option(&self) -> usize {
        self.correct
    }

    #[must_use]
    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct
    }
}

//
// ─── SCORING ──────────────────────────────────────────────────────────────────
//

/// How the completion score depends on the attempt that passed the quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScorePolicy {
    /// Any passing attempt scores 100.
    #[default]
    Flat,
    /// First attempt scores 100, any later one 75.
    AttemptTiered,
}

impl ScorePolicy {
    #[must_use]
    pub fn score_for_attempt(self, attempt: u32) -> u8 {
        match self {
            ScorePolicy::Flat => 100,
            ScorePolicy::AttemptTiered => {
                if attempt <= 1 {
                    100
                } else {
                    75
                }
            }
        }
    }
}

/// Result of grading one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizGrade {
    pub correct: u32,
    pub total: u32,
    pub attempt: u32,
}

impl QuizGrade {
    #[must_use]
    pub fn is_perfect(&self) -> bool {
        self.correct == self.total
    }

    /// Share of correct answers, 0-100, rounded down.
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        u8::try_from(self.correct * 100 / self.total).unwrap_or(100)
    }
}

/// What the dual-purpose submit button did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizAction {
    /// Answers were graded; the quiz is now locked.
    Graded(QuizGrade),
    /// A failed submission was cleared for a new attempt.
    Retried,
    /// The quiz was already passed; nothing changed.
    AlreadyPassed,
}

//
// ─── QUIZ ─────────────────────────────────────────────────────────────────────
//

/// Answer sheet for a fixed question set.
///
/// `score` is only set while `submitted` is true. A failed submission is
/// cleared by submitting again, which acts as the retry trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    questions: Vec<QuizQuestion>,
    answers: BTreeMap<usize, usize>,
    submitted: bool,
    attempts: u32,
    score: Option<u32>,
}

impl Quiz {
    /// Build a quiz, validating every answer key.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Empty` for an empty question list and
    /// `QuizError::InvalidAnswerKey` if a correct option is out of range.
    pub fn new(questions: Vec<QuizQuestion>) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizError::Empty);
        }
        for (idx, q) in questions.iter().enumerate() {
            if q.correct >= q.options.len() {
                return Err(QuizError::InvalidAnswerKey {
                    question: idx,
                    correct: q.correct,
                    options: q.options.len(),
                });
            }
        }
        Ok(Self {
            questions,
            answers: BTreeMap::new(),
            submitted: false,
            attempts: 0,
            score: None,
        })
    }

    /// Select an option for a question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Locked` after submission, or an out-of-range error
    /// for unknown questions/options. The answer sheet is left unchanged.
    pub fn answer(&mut self, question: usize, option: usize) -> Result<(), QuizError> {
        if self.submitted {
            return Err(QuizError::Locked);
        }
        let q = self
            .questions
            .get(question)
            .ok_or(QuizError::UnknownQuestion(question))?;
        if option >= q.options.len() {
            return Err(QuizError::UnknownOption { question, option });
        }
        self.answers.insert(question, option);
        Ok(())
    }

    /// Grade the sheet, or clear a failed submission for another attempt.
    pub fn submit(&mut self) -> QuizAction {
        if self.submitted {
            if self.is_passed() {
                return QuizAction::AlreadyPassed;
            }
            self.answers.clear();
            self.submitted = false;
            self.score = None;
            return QuizAction::Retried;
        }

        let correct = self
            .questions
            .iter()
            .enumerate()
            .filter(|(idx, q)| self.answers.get(idx).is_some_and(|opt| q.is_correct(*opt)))
            .count();
        let correct = u32::try_from(correct).unwrap_or(u32::MAX);

        self.attempts += 1;
        self.submitted = true;
        self.score = Some(correct);

        QuizAction::Graded(QuizGrade {
            correct,
            total: self.max_score(),
            attempt: self.attempts,
        })
    }

    #[must_use]
    pub fn is_passed(&self) -> bool {
        self.submitted && self.score == Some(self.max_score())
    }

    #[must_use]
    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    #[must_use]
    pub fn selected(&self, question: usize) -> Option<usize> {
        self.answers.get(&question).copied()
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Finalized score of the current submission, if any.
    #[must_use]
    pub fn score(&self) -> Option<u32> {
        self.score
    }

    #[must_use]
    pub fn max_score(&self) -> u32 {
        u32::try_from(self.questions.len()).unwrap_or(u32::MAX)
    }

    pub fn reset(&mut self) {
        self.answers.clear();
        self.submitted = false;
        self.attempts = 0;
        self.score = None;
    }
}
