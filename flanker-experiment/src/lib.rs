pub mod config;
pub mod error;
pub mod io;
pub mod messages;
pub mod results;
pub mod sequencer;
pub mod session;
pub mod threshold;
pub mod trial;

pub use config::{ExperimentConfig, TrialConfig};
pub use error::{ConfigError, MessageError, ResultsError, SessionError, TrialError};
pub use io::{Display, DisplayError, Keyboard};
pub use results::{BlockLabel, ResultRow, ResultsLog, ResultsSummary};
pub use sequencer::{TrialRunner, TrialStep};
pub use session::{Session, SessionEnd};
pub use trial::{TrialDurations, TrialParameters};
