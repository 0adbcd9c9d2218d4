use crate::config::TrialConfig;
use crate::threshold::ThresholdTable;
use flanker_core::{
    CueCondition, Direction, Placement, ShiftCondition, StimulusSet, TrialOutcome, TrialPhase,
};
use rand::Rng;

/// Vertical offset of the cue below the row it points at, in degrees.
pub const CUE_MARGIN: f32 = 0.25;

/// Condition tables derived once per configuration.
#[derive(Debug, Clone)]
pub struct ConditionTables {
    shift: ThresholdTable<ShiftCondition, 2>,
    cue: ThresholdTable<CueCondition, 2>,
}

impl ConditionTables {
    pub fn new(config: &TrialConfig) -> Self {
        let p = config.car_shift_probability;
        let incorrect = config.incorrect_cue_probability;
        Self {
            shift: ThresholdTable::new(
                [
                    (0.0, p / 2.0, ShiftCondition::Right),
                    (p / 2.0, p, ShiftCondition::Left),
                ],
                ShiftCondition::Middle,
            ),
            // Both cue ranges are read off the same draw, so the total chance
            // of a visible cue is CUE_PROBABILITY.
            cue: ThresholdTable::new(
                [
                    (0.0, incorrect, CueCondition::Incorrect),
                    (incorrect, config.cue_probability, CueCondition::Correct),
                ],
                CueCondition::None,
            ),
        }
    }
}

/// Randomized conditions of one trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialParameters {
    pub outer: Direction,
    pub middle: Direction,
    pub placement: Placement,
    pub shift: ShiftCondition,
    /// Frames moved from the response window into the pre-fixation phase.
    pub jitter: u32,
    pub cue: CueCondition,
}

impl TrialParameters {
    /// Draw every condition, always consuming the RNG in the same order.
    pub fn draw<R: Rng + ?Sized>(
        rng: &mut R,
        config: &TrialConfig,
        tables: &ConditionTables,
    ) -> Self {
        let outer = coin_direction(rng);
        let middle = coin_direction(rng);
        let placement = if rng.random_bool(0.5) {
            Placement::Top
        } else {
            Placement::Down
        };
        let shift = tables.shift.classify(rng.random::<f64>());
        let jitter = rng.random_range(0..=config.variable_time);
        let cue = tables.cue.classify(rng.random::<f64>());

        Self {
            outer,
            middle,
            placement,
            shift,
            jitter,
            cue,
        }
    }

    /// Write orientation and positions into the session's stimulus handles.
    pub fn apply(&self, stimuli: &mut StimulusSet, config: &TrialConfig) {
        let y = self.placement.offset(config.stim_ver_angle);
        let h = config.stim_hor_angle;

        for (car, slot) in stimuli.outer_mut().zip([-2.0, -1.0, 1.0, 2.0]) {
            car.flip_horiz = self.outer.flips_image();
            car.pos = (slot * h, y);
        }

        let middle_x = match self.shift {
            ShiftCondition::Right => config.stim_hor_angle_shift,
            ShiftCondition::Left => -config.stim_hor_angle_shift,
            ShiftCondition::Middle => 0.0,
        };
        let middle = stimuli.middle_mut();
        middle.flip_horiz = self.middle.flips_image();
        middle.pos = (middle_x, y);

        match self.cue {
            CueCondition::Incorrect => stimuli.cue.pos = (0.0, -y - CUE_MARGIN),
            CueCondition::Correct => stimuli.cue.pos = (0.0, y - CUE_MARGIN),
            CueCondition::None => {}
        }
    }

    pub fn outcome(&self, key: String, reaction_time: f64) -> TrialOutcome {
        TrialOutcome {
            key,
            reaction_time,
            outer_orientation: self.outer,
            middle_orientation: self.middle,
            placement: self.placement,
            cue: self.cue,
            shift: self.shift,
        }
    }
}

fn coin_direction<R: Rng + ?Sized>(rng: &mut R) -> Direction {
    if rng.random_bool(0.5) {
        Direction::Right
    } else {
        Direction::Left
    }
}

/// Frame counts of each display phase for one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialDurations {
    pub pre_fixation: u32,
    pub cue: u32,
    pub cue_to_stim: u32,
    pub stimulus: u32,
    pub response_window: u32,
}

impl TrialDurations {
    pub fn new(config: &TrialConfig, jitter: u32) -> Self {
        let jitter = jitter.min(config.variable_time);
        Self {
            pre_fixation: config.pre_stim_time.saturating_add(jitter),
            cue: config.cue_time,
            cue_to_stim: config.cue_to_stim_time,
            stimulus: config.stim_time,
            response_window: config
                .reaction_time
                .saturating_add(config.variable_time - jitter),
        }
    }

    pub fn frames(&self, phase: TrialPhase) -> u32 {
        match phase {
            TrialPhase::PreFixation => self.pre_fixation,
            TrialPhase::Cue => self.cue,
            TrialPhase::CueToStimGap => self.cue_to_stim,
            TrialPhase::Stimulus => self.stimulus,
            TrialPhase::ResponseWindow => self.response_window,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (TrialPhase, u32)> + '_ {
        TrialPhase::ALL.into_iter().map(|p| (p, self.frames(p)))
    }

    pub fn total(&self) -> u32 {
        self.iter().fold(0, |acc, (_, n)| acc.saturating_add(n))
    }
}
