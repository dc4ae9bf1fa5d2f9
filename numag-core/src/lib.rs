pub mod participant;
pub mod phase;
pub mod scene;
pub mod stimulus;
pub mod trial;

pub use participant::{Gender, ParticipantInfo};
pub use phase::ExperimentPhase;
pub use scene::{FeedbackKind, Scene};
pub use stimulus::{Dot, DotCounts, MaskPattern, ParseColorError, Rgb, Side};
pub use trial::{judge, Key, TrialRecord, TrialState};
