/// Ordered stages of a state machine that the harness walks through
pub trait Phase: Copy + Clone + PartialEq + Send + Sync + std::fmt::Debug + Default {
    /// Whether keyboard responses are sampled while in this phase.
    fn allows_input(&self) -> bool;
    fn next(&self) -> Option<Self>;

    fn is_training(&self) -> bool {
        false
    }
    fn is_experiment(&self) -> bool {
        false
    }
}

/// Display phases of one trial, rendered strictly in this order.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TrialPhase {
    #[default]
    PreFixation,
    Cue,
    CueToStimGap,
    Stimulus,
    ResponseWindow,
}

impl TrialPhase {
    pub const ALL: [TrialPhase; 5] = [
        TrialPhase::PreFixation,
        TrialPhase::Cue,
        TrialPhase::CueToStimGap,
        TrialPhase::Stimulus,
        TrialPhase::ResponseWindow,
    ];

    pub fn shows_cars(&self) -> bool {
        matches!(self, Self::Stimulus)
    }

    pub fn shows_cue(&self) -> bool {
        matches!(self, Self::Cue)
    }
}

impl Phase for TrialPhase {
    fn allows_input(&self) -> bool {
        matches!(self, Self::Stimulus | Self::ResponseWindow)
    }

    fn next(&self) -> Option<Self> {
        use TrialPhase::*;
        Some(match self {
            PreFixation => Cue,
            Cue => CueToStimGap,
            CueToStimGap => Stimulus,
            Stimulus => ResponseWindow,
            ResponseWindow => return None,
        })
    }
}

/// Stages of the whole session.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionStage {
    #[default]
    Instructions,
    Training,
    Briefing,
    Experiment,
    Farewell,
}

impl Phase for SessionStage {
    fn allows_input(&self) -> bool {
        true
    }

    fn next(&self) -> Option<Self> {
        use SessionStage::*;
        Some(match self {
            Instructions => Training,
            Training => Briefing,
            Briefing => Experiment,
            Experiment => Farewell,
            Farewell => return None,
        })
    }

    fn is_training(&self) -> bool {
        matches!(self, SessionStage::Training)
    }

    fn is_experiment(&self) -> bool {
        matches!(self, SessionStage::Experiment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trial_phases_walk_in_order() {
        let mut walked = vec![TrialPhase::default()];
        while let Some(next) = walked.last().and_then(|p| p.next()) {
            walked.push(next);
        }
        assert_eq!(walked, TrialPhase::ALL.to_vec());
    }

    #[test]
    fn only_stimulus_and_response_window_sample_input() {
        let sampling: Vec<_> = TrialPhase::ALL
            .iter()
            .filter(|p| p.allows_input())
            .copied()
            .collect();
        assert_eq!(
            sampling,
            vec![TrialPhase::Stimulus, TrialPhase::ResponseWindow]
        );
    }

    #[test]
    fn session_ends_after_farewell() {
        let mut stage = SessionStage::default();
        let mut count = 1;
        while let Some(next) = stage.next() {
            stage = next;
            count += 1;
        }
        assert_eq!(stage, SessionStage::Farewell);
        assert_eq!(count, 5);
    }
}
