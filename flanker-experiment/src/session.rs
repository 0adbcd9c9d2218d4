use crate::config::ExperimentConfig;
use crate::error::SessionError;
use crate::io::{Display, Keyboard};
use crate::messages::read_message;
use crate::results::{BlockLabel, ResultsLog};
use crate::sequencer::{TrialRunner, TrialStep};
use flanker_core::{
    Direction, Phase, SessionStage, StimulusHandle, StimulusKind, StimulusSet, TrialOutcome,
    Units,
};
use flanker_timing::{CalibrationStats, HighPrecisionTimer, Timer, TrialClock};
use rand::Rng;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::Duration;

/// Keys that dismiss an instruction screen.
const CONTINUE_KEYS: [&str; 4] = ["return", "space", "left", "right"];

const INSTRUCTIONS: [&str; 4] = ["ins1.txt", "ins2.txt", "ins3.txt", "ins4.txt"];
const BRIEFING: &str = "ins5.txt";
const FAREWELL: &str = "ins6.txt";

/// How a session ended when no fatal error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Completed,
    Aborted,
}

/// Key the participant should have pressed for a trial.
///
/// A shifted middle car asks for `space`; otherwise the middle car's
/// facing decides between `c` (left) and `m` (right).
pub fn expected_key(outcome: &TrialOutcome) -> &'static str {
    if outcome.shift.is_shifted() {
        "space"
    } else {
        match outcome.middle_orientation {
            Direction::Left => "c",
            Direction::Right => "m",
        }
    }
}

/// Build the drawables every trial reuses.
pub fn build_stimuli(config: &ExperimentConfig) -> StimulusSet {
    let background = StimulusHandle::new(
        StimulusKind::Image {
            path: config.background_image.clone(),
            size: None,
        },
        Units::Pixels,
    );
    let cue = StimulusHandle::new(
        StimulusKind::Text {
            content: "*".to_string(),
            height: 2.0,
            color: config.text_color,
        },
        Units::Degrees,
    );
    let car = StimulusHandle::new(
        StimulusKind::Image {
            path: config.car_image.clone(),
            size: None,
        },
        Units::Degrees,
    );
    StimulusSet::new(background, cue, car)
}

/// One participant's run: instructions, training, experiment blocks.
///
/// Owns the results table. Results are flushed by [`Session::finalize`] on
/// every exit path of [`Session::run`].
pub struct Session<D, K, C, R>
where
    D: Display,
    K: Keyboard,
    C: TrialClock,
    R: Rng,
{
    runner: TrialRunner<D, K, C, R>,
    config: ExperimentConfig,
    stimuli: StimulusSet,
    results: ResultsLog,
    timer: HighPrecisionTimer,
    trial_no: usize,
}

impl<D, K, C, R> Session<D, K, C, R>
where
    D: Display,
    K: Keyboard,
    C: TrialClock,
    R: Rng,
{
    pub fn new(
        config: ExperimentConfig,
        participant: impl Into<String>,
        display: D,
        keyboard: K,
        clock: C,
        rng: R,
    ) -> Self {
        let runner = TrialRunner::new(
            config.trial.clone(),
            config.abort_key.clone(),
            display,
            keyboard,
            clock,
            rng,
        );
        let results = ResultsLog::new(participant, config.results_dir.clone());
        Self {
            runner,
            stimuli: build_stimuli(&config),
            results,
            timer: HighPrecisionTimer::with_capacity(config.calibration_frames.max(1)),
            trial_no: 1,
            config,
        }
    }

    pub fn results(&self) -> &ResultsLog {
        &self.results
    }

    pub fn runner(&self) -> &TrialRunner<D, K, C, R> {
        &self.runner
    }

    pub fn runner_mut(&mut self) -> &mut TrialRunner<D, K, C, R> {
        &mut self.runner
    }

    /// Measure the refresh rate and compare it with `FRAME_RATE`.
    pub fn check_frame_rate(&mut self) -> Result<CalibrationStats, SessionError> {
        let mut last = None;
        for _ in 0..=self.config.calibration_frames {
            self.runner.display.draw(&self.stimuli.background)?;
            let flipped_at = self.runner.display.flip()?;
            if let Some(prev) = last.replace(flipped_at) {
                self.timer.record_frame(flipped_at.duration_since(prev));
            }
        }
        let stats = self.timer.calibration_stats();
        tracing::info!(
            frame_rate = stats.effective_fps,
            jitter_ms = stats.jitter_ns / 1_000_000.0,
            reported_period_ms = self.runner.display.frame_period().map(|p| p.as_secs_f64() * 1e3),
            "measured frame rate"
        );
        if stats.rounded_rate() != self.config.frame_rate {
            return Err(SessionError::FrameRate {
                detected: stats.rounded_rate(),
                expected: self.config.frame_rate,
            });
        }
        Ok(stats)
    }

    /// Run every stage, then flush results.
    pub fn run(&mut self) -> Result<SessionEnd, SessionError> {
        let mut stage = Some(SessionStage::default());
        let mut flow = ControlFlow::Continue(());

        while let Some(current) = stage.filter(|s| *s != SessionStage::Farewell) {
            tracing::info!(stage = ?current, "entering stage");
            match self.run_stage(current) {
                Ok(ControlFlow::Continue(())) => stage = current.next(),
                Ok(ControlFlow::Break(())) => {
                    flow = ControlFlow::Break(());
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, trial_no = self.trial_no, "session failed");
                    if let Err(flush_err) = self.finalize() {
                        tracing::error!(error = %flush_err, "could not save results");
                    }
                    return Err(e);
                }
            }
        }

        self.finalize()?;
        if flow.is_break() {
            return Ok(SessionEnd::Aborted);
        }
        // Results are already safe; an abort here only skips the goodbye.
        let _ = self.show_info(FAREWELL)?;
        Ok(SessionEnd::Completed)
    }

    /// Flush results and log a summary.
    pub fn finalize(&mut self) -> Result<PathBuf, SessionError> {
        let path = self.results.flush()?;
        if let Some(summary) = self.results.summary() {
            tracing::info!(
                trials = summary.trials,
                response_rate = summary.response_rate(),
                mean_rt = summary.mean_rt,
                min_rt = summary.min_rt,
                max_rt = summary.max_rt,
                "session summary"
            );
        }
        Ok(path)
    }

    fn run_stage(&mut self, stage: SessionStage) -> Result<ControlFlow<()>, SessionError> {
        match stage {
            SessionStage::Instructions => {
                for name in INSTRUCTIONS {
                    if self.show_info(name)?.is_break() {
                        return Ok(ControlFlow::Break(()));
                    }
                }
            }
            SessionStage::Training => {
                for _ in 0..self.config.no_training_trials {
                    let Some(outcome) = self.next_trial(BlockLabel::Training)? else {
                        return Ok(ControlFlow::Break(()));
                    };
                    self.show_feedback(&outcome)?;
                }
            }
            SessionStage::Briefing => return self.show_info(BRIEFING),
            SessionStage::Experiment => {
                for block in 0..self.config.no_blocks {
                    tracing::info!(block, "starting block");
                    for _ in 0..self.config.no_trials_in_block {
                        if self.next_trial(BlockLabel::Block(block))?.is_none() {
                            return Ok(ControlFlow::Break(()));
                        }
                    }
                }
            }
            SessionStage::Farewell => return self.show_info(FAREWELL),
        }
        if stage.is_training() || stage.is_experiment() {
            tracing::info!(?stage, trials = self.results.rows().len(), "stage done");
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Run and record one trial. `None` means the participant aborted.
    fn next_trial(&mut self, block: BlockLabel) -> Result<Option<TrialOutcome>, SessionError> {
        match self.runner.run_trial(&mut self.stimuli)? {
            TrialStep::Completed(outcome) => {
                self.results.push(block, self.trial_no, outcome.clone());
                self.trial_no += 1;
                Ok(Some(outcome))
            }
            TrialStep::Aborted => Ok(None),
        }
    }

    fn show_feedback(&mut self, outcome: &TrialOutcome) -> Result<(), SessionError> {
        let expected = expected_key(outcome);
        let text = if outcome.key == expected {
            "Correct!".to_string()
        } else {
            format!("Incorrect...\nCorrect answer: [{expected}]")
        };
        let handle = self.text_handle(text, self.config.feedback_text_height);
        self.runner.display.draw(&handle)?;
        self.runner.display.flip()?;
        self.timer
            .sleep(Duration::from_millis(self.config.feedback_time_ms));
        self.runner.display.flip()?;
        Ok(())
    }

    /// Show a message file until a continue key or the abort key is pressed.
    fn show_info(&mut self, name: &str) -> Result<ControlFlow<()>, SessionError> {
        let path = self.config.messages_dir.join(name);
        let text = read_message(&path, "")?;
        let handle = self.text_handle(text, self.config.info_text_height);

        if self.runner.abort_requested() {
            return Ok(ControlFlow::Break(()));
        }
        self.runner.keyboard.clear_events();

        let mut keys: Vec<String> = CONTINUE_KEYS.iter().map(|k| k.to_string()).collect();
        keys.push(self.config.abort_key.clone());

        loop {
            if let Some(press) = self.runner.keyboard.get_keys(&keys).into_iter().next() {
                self.runner.display.flip()?;
                if press.key == self.config.abort_key {
                    tracing::error!(screen = name, "experiment finished by user on info screen");
                    return Ok(ControlFlow::Break(()));
                }
                return Ok(ControlFlow::Continue(()));
            }
            self.runner.display.draw(&handle)?;
            self.runner.display.flip()?;
        }
    }

    fn text_handle(&self, content: String, height: f32) -> StimulusHandle {
        StimulusHandle::new(
            StimulusKind::Text {
                content,
                height,
                color: self.config.text_color,
            },
            Units::Pixels,
        )
    }
}
