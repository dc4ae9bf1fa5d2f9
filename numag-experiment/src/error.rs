use numag_core::Side;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error(
        "could not place dot {} on the {side} side after {attempts} attempts; the dot geometry is too dense",
        .placed + 1
    )]
    Exhausted {
        side: Side,
        placed: usize,
        attempts: u32,
    },
}

#[derive(Debug, Error)]
pub enum ConditionsError {
    #[error("failed to read condition table: {0}")]
    Csv(#[from] csv::Error),

    #[error("condition table has no rows")]
    Empty,

    #[error("condition row {row}: {reason}")]
    Invalid { row: usize, reason: String },
}

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("failed to write results: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write session dump: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExperimentError {
    /// Errors caused by the configuration rather than the environment
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Layout(_))
    }
}
