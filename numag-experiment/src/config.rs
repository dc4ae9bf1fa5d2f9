use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::Range;
use std::path::Path;
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "numag.toml";

/// Immutable experiment parameters shared by the sequencer and the generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub exp_name: String,
    /// Synthesized templates when no condition table is available
    pub n_trials: usize,
    /// Presentations of every template
    pub n_reps: usize,
    pub min_dots: u32,
    pub max_dots: u32,
    pub mask_size: u32,
    pub timing: TimingConfig,
    pub geometry: DotGeometry,
    pub tone: ToneConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            exp_name: "numMagExp".to_string(),
            n_trials: 2,
            n_reps: 2,
            min_dots: 1,
            max_dots: 10,
            mask_size: 256,
            timing: TimingConfig::default(),
            geometry: DotGeometry::default(),
            tone: ToneConfig::default(),
        }
    }
}

/// Dwell times, all in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub fixation_secs: f64,
    pub pre_stimulus_blank_secs: f64,
    /// First response window, stimulus on screen
    pub dots_wait_secs: f64,
    /// Total response budget measured from stimulus onset
    pub max_wait_secs: f64,
    pub feedback_secs: f64,
    pub post_feedback_blank_secs: f64,
    pub mask_secs: f64,
    pub farewell_secs: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fixation_secs: 0.5,
            pre_stimulus_blank_secs: 0.25,
            dots_wait_secs: 1.0,
            max_wait_secs: 2.0,
            feedback_secs: 1.0,
            post_feedback_blank_secs: 0.5,
            mask_secs: 0.25,
            farewell_secs: 6.0,
        }
    }
}

/// Placement bounds for the dot arrays. Lengths are pixels of a
/// `screen_width` × `screen_height` centre-origin canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DotGeometry {
    pub screen_width: f32,
    pub screen_height: f32,
    pub x_min_frac: f32,
    pub x_max_frac: f32,
    pub y_frac: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    /// Extra clearance between dots, percent of the summed radii
    pub extra_distance_pct: f32,
    pub max_attempts_per_dot: u32,
}

impl Default for DotGeometry {
    fn default() -> Self {
        Self {
            screen_width: 1366.0,
            screen_height: 768.0,
            x_min_frac: 0.2,
            x_max_frac: 0.8,
            y_frac: 0.7,
            min_radius: 20.0,
            max_radius: 30.0,
            extra_distance_pct: 20.0,
            max_attempts_per_dot: 10_000,
        }
    }
}

impl DotGeometry {
    /// Magnitude of x for dots on either side; left dots are mirrored
    pub fn x_range(&self) -> Range<f32> {
        let half = self.screen_width / 2.0;
        self.x_min_frac * half..self.x_max_frac * half
    }

    pub fn y_range(&self) -> Range<f32> {
        let lim = self.y_frac * self.screen_height / 2.0;
        -lim..lim
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    pub enabled: bool,
    pub frequency_hz: f32,
    pub duration_secs: f32,
    pub volume: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency_hz: 4000.0,
            duration_secs: 0.25,
            volume: 0.3,
        }
    }
}

impl ExperimentConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// An explicit path must load. Without one, `numag.toml` in the working
    /// directory is used when present and readable, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        let implicit = Path::new(DEFAULT_CONFIG_PATH);
        if !implicit.exists() {
            return Ok(Self::default());
        }
        match Self::load(implicit) {
            Ok(cfg) => Ok(cfg),
            Err(err @ ConfigError::Invalid(_)) => Err(err),
            Err(err) => {
                warn!("{err}. Using defaults.");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        let g = &self.geometry;
        let t = &self.timing;

        if self.n_trials == 0 || self.n_reps == 0 {
            return invalid("n_trials and n_reps must be at least 1".into());
        }
        if self.min_dots == 0 {
            return invalid("min_dots must be at least 1".into());
        }
        if self.max_dots <= self.min_dots {
            return invalid(format!(
                "max_dots ({}) must exceed min_dots ({}) so both sides can differ",
                self.max_dots, self.min_dots
            ));
        }
        if self.mask_size == 0 {
            return invalid("mask_size must be positive".into());
        }
        if !(g.screen_width > 0.0 && g.screen_height > 0.0) {
            return invalid("screen size must be positive".into());
        }
        if !(0.0 <= g.x_min_frac && g.x_min_frac < g.x_max_frac && g.x_max_frac <= 1.0) {
            return invalid(format!(
                "x fractions must satisfy 0 <= x_min_frac < x_max_frac <= 1, got {} and {}",
                g.x_min_frac, g.x_max_frac
            ));
        }
        if !(g.y_frac > 0.0 && g.y_frac <= 1.0) {
            return invalid(format!("y_frac must be in (0, 1], got {}", g.y_frac));
        }
        if !(g.min_radius > 0.0 && g.min_radius <= g.max_radius) {
            return invalid(format!(
                "radii must satisfy 0 < min_radius <= max_radius, got {} and {}",
                g.min_radius, g.max_radius
            ));
        }
        if !(g.extra_distance_pct >= 0.0) {
            return invalid("extra_distance_pct must not be negative".into());
        }
        if g.max_attempts_per_dot == 0 {
            return invalid("max_attempts_per_dot must be at least 1".into());
        }
        if !(t.dots_wait_secs > 0.0 && t.dots_wait_secs <= t.max_wait_secs) {
            return invalid(format!(
                "timing must satisfy 0 < dots_wait_secs <= max_wait_secs, got {} and {}",
                t.dots_wait_secs, t.max_wait_secs
            ));
        }
        let dwell = [
            t.fixation_secs,
            t.pre_stimulus_blank_secs,
            t.feedback_secs,
            t.post_feedback_blank_secs,
            t.mask_secs,
            t.farewell_secs,
        ];
        if dwell.iter().any(|d| !(*d >= 0.0)) {
            return invalid("dwell times must not be negative".into());
        }
        Ok(())
    }
}

/// Seconds to timer nanoseconds
pub fn nanos(secs: f64) -> u64 {
    (secs * 1e9).round() as u64
}
