pub mod input;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use input::KeyPress;
pub use phase::{Phase, SessionStage, TrialPhase};
pub use stimulus::{Stimulus, StimulusHandle, StimulusKind, StimulusSet, Units};
pub use trial::{CueCondition, Direction, Placement, ShiftCondition, TrialOutcome};
