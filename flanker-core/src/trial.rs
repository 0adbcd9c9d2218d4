use serde::{Deserialize, Serialize};
use std::fmt;

/// Horizontal orientation of a car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    /// Car images face left, so right-facing cars are mirrored.
    pub fn flips_image(&self) -> bool {
        matches!(self, Direction::Right)
    }
}

/// Vertical placement of the car row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Top,
    Down,
}

impl Placement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Placement::Top => "top",
            Placement::Down => "down",
        }
    }

    /// Signed vertical offset for a given angle magnitude.
    pub fn offset(&self, angle: f32) -> f32 {
        match self {
            Placement::Top => angle,
            Placement::Down => -angle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CueCondition {
    None,
    Correct,
    Incorrect,
}

impl CueCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            CueCondition::None => "none",
            CueCondition::Correct => "correct",
            CueCondition::Incorrect => "incorrect",
        }
    }

    pub fn is_shown(&self) -> bool {
        !matches!(self, CueCondition::None)
    }
}

/// Horizontal displacement of the middle car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftCondition {
    Middle,
    Left,
    Right,
}

impl ShiftCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftCondition::Middle => "middle",
            ShiftCondition::Left => "left",
            ShiftCondition::Right => "right",
        }
    }

    pub fn is_shifted(&self) -> bool {
        !matches!(self, ShiftCondition::Middle)
    }
}

macro_rules! impl_display_as_str {
    ($($t:ty),*) => {
        $(impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

impl_display_as_str!(Direction, Placement, CueCondition, ShiftCondition);

/// Recorded result of one trial.
///
/// Never partially filled: a timeout is encoded with [`TrialOutcome::NO_KEY`]
/// and [`TrialOutcome::TIMEOUT_RT`]. Serialized field names are the column
/// names in [`TrialOutcome::FIELD_NAMES`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome {
    #[serde(rename = "key pressed")]
    pub key: String,
    #[serde(rename = "reaction time")]
    pub reaction_time: f64,
    #[serde(rename = "cars left right orientation")]
    pub outer_orientation: Direction,
    #[serde(rename = "middle car left right orientation")]
    pub middle_orientation: Direction,
    #[serde(rename = "cars top down orientation")]
    pub placement: Placement,
    #[serde(rename = "cue position or absence")]
    pub cue: CueCondition,
    #[serde(rename = "middle car position (shift)")]
    pub shift: ShiftCondition,
}

impl TrialOutcome {
    pub const NO_KEY: &'static str = "no_key";
    pub const TIMEOUT_RT: f64 = -1.0;

    pub const FIELD_NAMES: [&'static str; 7] = [
        "key pressed",
        "reaction time",
        "cars left right orientation",
        "middle car left right orientation",
        "cars top down orientation",
        "cue position or absence",
        "middle car position (shift)",
    ];

    pub fn is_timeout(&self) -> bool {
        self.key == Self::NO_KEY
    }
}
