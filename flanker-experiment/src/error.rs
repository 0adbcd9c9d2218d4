//! Error types for configuration, trials and the session harness

use crate::io::DisplayError;
use flanker_core::TrialPhase;
use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading or validating the experiment configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML in {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value: {reason}")]
    Invalid { reason: String },

    #[error("stimulus asset {path} does not exist")]
    MissingAsset { path: PathBuf },
}

impl ConfigError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            reason: reason.into(),
        }
    }
}

/// A trial that failed mid-phase. Trials are never resumed.
#[derive(Debug, Error)]
pub enum TrialError {
    #[error("display failed during {phase:?} phase")]
    Display {
        phase: TrialPhase,
        #[source]
        source: DisplayError,
    },
}

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("failed to read message file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ResultsError {
    #[error("failed to create results file {path}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write results to {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to flush results to {path}")]
    Flush {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal session errors. User aborts are not errors, see [`crate::SessionEnd`].
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Trial(#[from] TrialError),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Results(#[from] ResultsError),

    #[error("display failure outside of a trial")]
    Display(#[from] DisplayError),

    #[error("wrong frame rate detected: {detected} Hz, experiment designed for {expected} Hz")]
    FrameRate { detected: u32, expected: u32 },
}
