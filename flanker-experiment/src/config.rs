use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Per-trial timing, geometry and probabilities.
///
/// Durations are frame counts at the display's refresh rate. Angles are in
/// degrees of visual angle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct TrialConfig {
    pub pre_stim_time: u32,
    pub cue_time: u32,
    pub cue_to_stim_time: u32,
    pub stim_time: u32,
    pub reaction_time: u32,
    pub variable_time: u32,

    pub stim_hor_angle: f32,
    pub stim_hor_angle_shift: f32,
    pub stim_ver_angle: f32,

    pub car_shift_probability: f64,
    pub cue_probability: f64,
    /// Read against the same draw as `cue_probability`, so it is a sub-range
    /// of the cued trials rather than an independent probability.
    pub incorrect_cue_probability: f64,

    pub reaction_keys: Vec<String>,
}

impl TrialConfig {
    /// Frames rendered by every trial, whatever the jitter draw.
    ///
    /// Saturates on configs that [`TrialConfig::validate`] rejects.
    pub fn total_frames(&self) -> u32 {
        self.checked_total_frames().unwrap_or(u32::MAX)
    }

    fn checked_total_frames(&self) -> Option<u32> {
        [
            self.variable_time,
            self.cue_time,
            self.cue_to_stim_time,
            self.stim_time,
            self.reaction_time,
        ]
        .into_iter()
        .try_fold(self.pre_stim_time, u32::checked_add)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, p) in [
            ("CAR_SHIFT_PROBABILITY", self.car_shift_probability),
            ("CUE_PROBABILITY", self.cue_probability),
            ("INCORRECT_CUE_PROBABILITY", self.incorrect_cue_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::invalid(format!(
                    "{name} must lie in [0, 1], got {p}"
                )));
            }
        }
        if self.incorrect_cue_probability > self.cue_probability {
            return Err(ConfigError::invalid(format!(
                "INCORRECT_CUE_PROBABILITY ({}) must not exceed CUE_PROBABILITY ({})",
                self.incorrect_cue_probability, self.cue_probability
            )));
        }
        for (name, a) in [
            ("STIM_HOR_ANGLE", self.stim_hor_angle),
            ("STIM_HOR_ANGLE_SHIFT", self.stim_hor_angle_shift),
            ("STIM_VER_ANGLE", self.stim_ver_angle),
        ] {
            if !a.is_finite() {
                return Err(ConfigError::invalid(format!("{name} must be finite")));
            }
        }
        // `top` rows must sit above centre.
        if self.stim_ver_angle <= 0.0 {
            return Err(ConfigError::invalid(format!(
                "STIM_VER_ANGLE must be positive, got {}",
                self.stim_ver_angle
            )));
        }
        if self.checked_total_frames().is_none() {
            return Err(ConfigError::invalid("phase durations overflow a frame count"));
        }
        if self.reaction_keys.is_empty() {
            return Err(ConfigError::invalid("REACTION_KEYS must not be empty"));
        }
        Ok(())
    }
}

/// Whole-session configuration, one TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ExperimentConfig {
    #[serde(flatten)]
    pub trial: TrialConfig,

    pub no_training_trials: usize,
    pub no_blocks: usize,
    pub no_trials_in_block: usize,
    /// Refresh rate the frame counts were designed for.
    pub frame_rate: u32,

    #[serde(default = "defaults::background_color")]
    pub background_color: [u8; 4],
    #[serde(default = "defaults::text_color")]
    pub text_color: [u8; 4],
    #[serde(default = "defaults::abort_key")]
    pub abort_key: String,
    #[serde(default = "defaults::feedback_time_ms")]
    pub feedback_time_ms: u64,
    #[serde(default = "defaults::pixels_per_degree")]
    pub pixels_per_degree: f32,
    #[serde(default = "defaults::info_text_height")]
    pub info_text_height: f32,
    #[serde(default = "defaults::feedback_text_height")]
    pub feedback_text_height: f32,
    #[serde(default = "defaults::calibration_frames")]
    pub calibration_frames: usize,

    #[serde(default = "defaults::background_image")]
    pub background_image: PathBuf,
    #[serde(default = "defaults::car_image")]
    pub car_image: PathBuf,
    #[serde(default = "defaults::font_path")]
    pub font_path: PathBuf,
    #[serde(default = "defaults::messages_dir")]
    pub messages_dir: PathBuf,
    #[serde(default = "defaults::results_dir")]
    pub results_dir: PathBuf,
}

mod defaults {
    use std::path::PathBuf;

    pub fn background_color() -> [u8; 4] {
        [128, 128, 128, 255]
    }
    pub fn text_color() -> [u8; 4] {
        [0, 0, 0, 255]
    }
    pub fn abort_key() -> String {
        "f7".to_string()
    }
    pub fn feedback_time_ms() -> u64 {
        1000
    }
    pub fn pixels_per_degree() -> f32 {
        40.0
    }
    pub fn info_text_height() -> f32 {
        20.0
    }
    pub fn feedback_text_height() -> f32 {
        50.0
    }
    pub fn calibration_frames() -> usize {
        120
    }
    pub fn background_image() -> PathBuf {
        PathBuf::from("images/fixation.bmp")
    }
    pub fn car_image() -> PathBuf {
        PathBuf::from("images/car.bmp")
    }
    pub fn font_path() -> PathBuf {
        PathBuf::from("fonts/DejaVuSans.ttf")
    }
    pub fn messages_dir() -> PathBuf {
        PathBuf::from("messages")
    }
    pub fn results_dir() -> PathBuf {
        PathBuf::from("results")
    }
}

impl ExperimentConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.trial.validate()?;
        if self.frame_rate == 0 {
            return Err(ConfigError::invalid("FRAME_RATE must be positive"));
        }
        if !(self.pixels_per_degree.is_finite() && self.pixels_per_degree > 0.0) {
            return Err(ConfigError::invalid("PIXELS_PER_DEGREE must be positive"));
        }
        if self.trial.reaction_keys.contains(&self.abort_key) {
            return Err(ConfigError::invalid(format!(
                "ABORT_KEY '{}' is also a reaction key",
                self.abort_key
            )));
        }
        Ok(())
    }

    /// Check that every image asset exists before any window is opened.
    pub fn check_assets(&self) -> Result<(), ConfigError> {
        for path in [&self.background_image, &self.car_image, &self.font_path] {
            if !path.is_file() {
                return Err(ConfigError::MissingAsset { path: path.clone() });
            }
        }
        Ok(())
    }

    /// Trials in the whole session, training included.
    pub fn total_trials(&self) -> usize {
        self.no_training_trials + self.no_blocks * self.no_trials_in_block
    }
}
