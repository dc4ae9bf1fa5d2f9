pub mod conditions;
pub mod config;
pub mod dots;
pub mod error;
pub mod participant;
pub mod results;
pub mod session;
pub mod trial;

pub use conditions::{TrialList, TrialTemplate};
pub use config::{DotGeometry, ExperimentConfig, TimingConfig, ToneConfig};
pub use dots::{generate_dots, overlaps, pick_counts, random_color, random_mask};
pub use error::{ConditionsError, ConfigError, ExperimentError, LayoutError};
pub use participant::{prompt_participant, ParticipantForm, PromptOutcome, ValidationError};
pub use results::{CsvResultSink, ResultSink};
pub use session::{SessionEvent, TrialSequencer};
pub use trial::{ActiveTrial, TrialDurations, TrialTimestamps};
