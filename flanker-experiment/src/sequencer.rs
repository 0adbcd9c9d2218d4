use crate::config::TrialConfig;
use crate::error::TrialError;
use crate::io::{Display, Keyboard};
use crate::trial::{ConditionTables, TrialDurations, TrialParameters};
use flanker_core::{KeyPress, Phase, StimulusSet, TrialOutcome, TrialPhase};
use flanker_timing::TrialClock;
use rand::Rng;

/// What a trial call hands back to the harness.
#[derive(Debug, Clone, PartialEq)]
pub enum TrialStep {
    Completed(TrialOutcome),
    /// The abort key was pressed; the session must stop.
    Aborted,
}

/// Keeps the first non-empty poll of a trial.
#[derive(Debug, Default)]
pub struct ResponseLatch {
    latched: Option<KeyPress>,
}

impl ResponseLatch {
    pub fn is_latched(&self) -> bool {
        self.latched.is_some()
    }

    /// Offer one poll's worth of presses. Ignored once something is latched.
    pub fn offer(&mut self, presses: Vec<KeyPress>) {
        if self.latched.is_none() {
            self.latched = presses.into_iter().next();
        }
    }

    /// Key name and reaction time against `clock`, or the timeout sentinels.
    pub fn resolve<C: TrialClock + ?Sized>(self, clock: &C) -> (String, f64) {
        match self.latched {
            Some(press) => {
                let rt = clock.time_of(press.at);
                (press.key, rt)
            }
            None => (TrialOutcome::NO_KEY.to_string(), TrialOutcome::TIMEOUT_RT),
        }
    }
}

/// Runs single trials against a display, keyboard and clock.
///
/// Owns its collaborators so the harness can only run one trial at a time.
pub struct TrialRunner<D, K, C, R>
where
    D: Display,
    K: Keyboard,
    C: TrialClock,
    R: Rng,
{
    pub display: D,
    pub keyboard: K,
    pub clock: C,
    pub rng: R,
    config: TrialConfig,
    tables: ConditionTables,
    abort_key: Vec<String>,
    pending_abort: bool,
    frames_rendered: u64,
}

impl<D, K, C, R> TrialRunner<D, K, C, R>
where
    D: Display,
    K: Keyboard,
    C: TrialClock,
    R: Rng,
{
    pub fn new(
        config: TrialConfig,
        abort_key: impl Into<String>,
        display: D,
        keyboard: K,
        clock: C,
        rng: R,
    ) -> Self {
        let tables = ConditionTables::new(&config);
        Self {
            display,
            keyboard,
            clock,
            rng,
            config,
            tables,
            abort_key: vec![abort_key.into()],
            pending_abort: false,
            frames_rendered: 0,
        }
    }

    pub fn config(&self) -> &TrialConfig {
        &self.config
    }

    pub fn abort_key(&self) -> &str {
        &self.abort_key[0]
    }

    /// Total flips issued by trials so far.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Whether the abort key was pressed since the last check.
    pub fn abort_requested(&mut self) -> bool {
        let pressed = !self.keyboard.get_keys(&self.abort_key).is_empty();
        std::mem::take(&mut self.pending_abort) || pressed
    }

    /// Clear pending input, remembering an abort press for the next check.
    pub fn clear_events(&mut self) {
        if !self.keyboard.get_keys(&self.abort_key).is_empty() {
            self.pending_abort = true;
        }
        self.keyboard.clear_events();
    }

    /// Present one trial end to end.
    pub fn run_trial(&mut self, stimuli: &mut StimulusSet) -> Result<TrialStep, TrialError> {
        if self.abort_requested() {
            tracing::error!(key = self.abort_key(), "experiment finished by user");
            return Ok(TrialStep::Aborted);
        }

        let params = TrialParameters::draw(&mut self.rng, &self.config, &self.tables);
        params.apply(stimuli, &self.config);
        let durations = TrialDurations::new(&self.config, params.jitter);
        tracing::debug!(?params, total_frames = durations.total(), "trial prepared");

        let mut latch = ResponseLatch::default();
        // Armed when stimulus presentation starts; fires on the next flip.
        let mut reset_on_flip = false;

        for (phase, frames) in durations.iter() {
            if phase == TrialPhase::Stimulus {
                self.clear_events();
                reset_on_flip = true;
            }
            for _ in 0..frames {
                if phase.allows_input() && !latch.is_latched() {
                    latch.offer(self.keyboard.get_keys(&self.config.reaction_keys));
                }
                self.draw_phase(phase, &params, stimuli)
                    .map_err(|source| TrialError::Display { phase, source })?;
                let flipped_at = self
                    .display
                    .flip()
                    .map_err(|source| TrialError::Display { phase, source })?;
                self.frames_rendered += 1;
                if reset_on_flip {
                    self.clock.reset_to(flipped_at);
                    reset_on_flip = false;
                }
            }
        }

        let (key, rt) = latch.resolve(&self.clock);
        let outcome = params.outcome(key, rt);
        tracing::debug!(
            key = %outcome.key,
            rt = outcome.reaction_time,
            cue = %outcome.cue,
            shift = %outcome.shift,
            "trial complete"
        );
        Ok(TrialStep::Completed(outcome))
    }

    fn draw_phase(
        &mut self,
        phase: TrialPhase,
        params: &TrialParameters,
        stimuli: &StimulusSet,
    ) -> Result<(), crate::io::DisplayError> {
        self.display.draw(&stimuli.background)?;
        if phase.shows_cue() && params.cue.is_shown() {
            self.display.draw(&stimuli.cue)?;
        }
        if phase.shows_cars() {
            for car in &stimuli.cars {
                self.display.draw(car)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flanker_timing::MonotonicClock;
    use std::time::{Duration, Instant};

    #[test]
    fn latch_keeps_first_press_of_first_nonempty_poll() {
        let t0 = Instant::now();
        let mut latch = ResponseLatch::default();
        latch.offer(vec![]);
        assert!(!latch.is_latched());
        latch.offer(vec![
            KeyPress::new("m", t0 + Duration::from_millis(300)),
            KeyPress::new("c", t0 + Duration::from_millis(310)),
        ]);
        latch.offer(vec![KeyPress::new("space", t0 + Duration::from_millis(100))]);

        let mut clock = MonotonicClock::new();
        clock.reset_to(t0);
        let (key, rt) = latch.resolve(&clock);
        assert_eq!(key, "m");
        assert!((rt - 0.3).abs() < 1e-9);
    }

    #[test]
    fn empty_latch_resolves_to_timeout_sentinels() {
        let (key, rt) = ResponseLatch::default().resolve(&MonotonicClock::new());
        assert_eq!(key, TrialOutcome::NO_KEY);
        assert_eq!(rt, TrialOutcome::TIMEOUT_RT);
    }
}
