use crate::participant::{Gender, ParticipantInfo};
use crate::stimulus::{DotCounts, Rgb, Side};
use serde::{Deserialize, Serialize};

/// Per-trial state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Fixation,
    StimulusVisible,
    AwaitingResponseWhileVisible,
    AwaitingResponseAfterHidden,
    Feedback,
    Mask,
    Done,
}

impl TrialState {
    pub fn awaits_response(&self) -> bool {
        matches!(
            self,
            Self::StimulusVisible
                | Self::AwaitingResponseWhileVisible
                | Self::AwaitingResponseAfterHidden
        )
    }

    pub fn shows_dots(&self) -> bool {
        matches!(
            self,
            Self::StimulusVisible | Self::AwaitingResponseWhileVisible
        )
    }
}

/// Participant input after mapping from the windowing layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Left,
    Right,
    Continue,
    Abort,
    Other,
}

impl Key {
    pub fn side(&self) -> Option<Side> {
        match self {
            Key::Left => Some(Side::Left),
            Key::Right => Some(Side::Right),
            _ => None,
        }
    }
}

/// Whether choosing `chosen` picked the larger cluster.
///
/// Equal counts have no larger side, so the trial is left unscored.
pub fn judge(chosen: Side, counts: DotCounts) -> Option<bool> {
    let mine = counts.on(chosen);
    let other = counts.on(chosen.opposite());
    if mine == other {
        None
    } else {
        Some(mine > other)
    }
}

/// Recorded result per trial. Flat so it maps onto one CSV row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub order: usize,
    pub trial: usize,
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub date: String,
    #[serde(rename = "lDots")]
    pub l_dots: u32,
    #[serde(rename = "rDots")]
    pub r_dots: u32,
    #[serde(rename = "lColor")]
    pub l_color: Rgb,
    #[serde(rename = "rColor")]
    pub r_color: Rgb,
    pub response: Option<Side>,
    #[serde(rename = "respTime")]
    pub resp_time: Option<f64>,
    pub correct: Option<bool>,
}

impl TrialRecord {
    /// Record for a trial whose response is not known yet
    pub fn pending(
        order: usize,
        trial: usize,
        participant: &ParticipantInfo,
        counts: DotCounts,
        colors: (Rgb, Rgb),
    ) -> Self {
        Self {
            order,
            trial,
            name: participant.name.clone(),
            age: participant.age,
            gender: participant.gender,
            date: participant.date.clone(),
            l_dots: counts.left,
            r_dots: counts.right,
            l_color: colors.0,
            r_color: colors.1,
            response: None,
            resp_time: None,
            correct: None,
        }
    }

    pub fn counts(&self) -> DotCounts {
        DotCounts {
            left: self.l_dots,
            right: self.r_dots,
        }
    }

    pub fn is_no_response(&self) -> bool {
        self.response.is_none()
    }
}
