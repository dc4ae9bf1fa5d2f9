use crate::config::{nanos, TimingConfig};
use numag_core::{Dot, FeedbackKind, MaskPattern, TrialRecord, TrialState};

/// The trial currently on screen
#[derive(Debug, Clone)]
pub struct ActiveTrial {
    pub record: TrialRecord,
    pub dots: Vec<Dot>,
    pub mask: Option<MaskPattern>,
    pub feedback: Option<FeedbackKind>,
    pub timestamps: TrialTimestamps,
    pub state: TrialState,
}

/// Phase durations in timer nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialDurations {
    pub fixation: u64,
    pub pre_stimulus_blank: u64,
    pub dots_wait: u64,
    pub max_wait: u64,
    pub feedback: u64,
    pub post_feedback_blank: u64,
    pub mask: u64,
}

impl From<&TimingConfig> for TrialDurations {
    fn from(t: &TimingConfig) -> Self {
        Self {
            fixation: nanos(t.fixation_secs),
            pre_stimulus_blank: nanos(t.pre_stimulus_blank_secs),
            dots_wait: nanos(t.dots_wait_secs),
            max_wait: nanos(t.max_wait_secs),
            feedback: nanos(t.feedback_secs),
            post_feedback_blank: nanos(t.post_feedback_blank_secs),
            mask: nanos(t.mask_secs),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrialTimestamps {
    pub fixation_start: u64,
    /// Stimulus onset; replaced by the presentation time once the first
    /// stimulus frame is on screen
    pub onset: Option<u64>,
    pub feedback_start: Option<u64>,
    pub mask_start: Option<u64>,
}

impl ActiveTrial {
    pub fn new(record: TrialRecord, dots: Vec<Dot>, fixation_start: u64) -> Self {
        Self {
            record,
            dots,
            mask: None,
            feedback: None,
            timestamps: TrialTimestamps {
                fixation_start,
                ..Default::default()
            },
            state: TrialState::Fixation,
        }
    }

    /// Time since onset, zero before the stimulus appeared
    pub fn since_onset(&self, now: u64) -> u64 {
        self.timestamps
            .onset
            .map_or(0, |onset| now.saturating_sub(onset))
    }
}
