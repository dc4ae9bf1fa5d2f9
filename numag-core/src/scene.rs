use crate::stimulus::{Dot, MaskPattern};

pub const INSTRUCTIONS: &str = "Hello!\n\nIn the images you will see, answer:\n\nWhich group has more dots?\n\nThe one on the\n    LEFT  (press the left arrow)\n    RIGHT (press the right arrow)";
pub const INSTRUCTIONS_HINT: &str = "Press SPACE to continue";
pub const FAREWELL: &str = "Thank you very much for participating!\n\n:-)";
pub const FAREWELL_HINT: &str = "Press any key or wait a few seconds to exit";

/// Feedback shown after the response windows close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Correct,
    Incorrect,
    /// Response given on a trial without a larger side
    Recorded,
    NoResponse,
}

impl FeedbackKind {
    pub fn from_outcome(correct: Option<bool>, responded: bool) -> Self {
        match (responded, correct) {
            (false, _) => FeedbackKind::NoResponse,
            (true, Some(true)) => FeedbackKind::Correct,
            (true, Some(false)) => FeedbackKind::Incorrect,
            (true, None) => FeedbackKind::Recorded,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            FeedbackKind::Correct => "Correct",
            FeedbackKind::Incorrect => "Incorrect",
            FeedbackKind::Recorded => "Response recorded",
            FeedbackKind::NoResponse => "No response",
        }
    }
}

/// Everything the renderer needs for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scene<'a> {
    Instructions,
    Fixation,
    Blank,
    Dots(&'a [Dot]),
    Feedback(FeedbackKind),
    Mask(&'a MaskPattern),
    Farewell,
}
