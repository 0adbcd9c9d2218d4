mod common;

use common::{PERIOD, ScriptedKeyboard, SimDisplay, SharedTimeline, onset_frame, stimuli};
use flanker_core::{CueCondition, ShiftCondition, TrialOutcome, TrialPhase};
use flanker_experiment::{TrialConfig, TrialError, TrialRunner, TrialStep};
use flanker_timing::MonotonicClock;
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Duration;

type SimRunner = TrialRunner<SimDisplay, ScriptedKeyboard, MonotonicClock, StdRng>;

fn runner(config: TrialConfig, seed: u64) -> (SimRunner, SharedTimeline) {
    let timeline = common::timeline();
    let runner = TrialRunner::new(
        config,
        "f7",
        SimDisplay::new(timeline.clone()),
        ScriptedKeyboard::new(timeline.clone()),
        MonotonicClock::new(),
        StdRng::seed_from_u64(seed),
    );
    (runner, timeline)
}

fn completed(step: TrialStep) -> TrialOutcome {
    match step {
        TrialStep::Completed(outcome) => outcome,
        TrialStep::Aborted => panic!("trial was aborted"),
    }
}

fn frame_secs(frames: u32) -> f64 {
    (PERIOD * frames).as_secs_f64()
}

#[test]
fn every_trial_renders_the_same_number_of_frames() {
    let mut config = common::trial_config();
    config.variable_time = 10;
    let expected = config.total_frames() as u64;
    let (mut runner, timeline) = runner(config, 3);
    let mut set = stimuli();

    for n in 1..=25 {
        completed(runner.run_trial(&mut set).unwrap());
        assert_eq!(runner.frames_rendered(), n * expected);
        assert_eq!(timeline.borrow().flips, n * expected);
    }
}

#[test]
fn silence_yields_timeout_sentinels() {
    let (mut runner, _) = runner(common::trial_config(), 1);
    let outcome = completed(runner.run_trial(&mut stimuli()).unwrap());
    assert_eq!(outcome.key, "no_key");
    assert_eq!(outcome.reaction_time, -1.0);
    assert!(outcome.is_timeout());
}

#[test]
fn reaction_time_is_measured_from_stimulus_onset_flip() {
    let config = common::trial_config();
    let onset = onset_frame(&config, 0);
    let (mut runner, _) = runner(config, 1);
    runner.keyboard.press_at("c", onset + 1, Duration::ZERO);

    let outcome = completed(runner.run_trial(&mut stimuli()).unwrap());
    assert_eq!(outcome.key, "c");
    assert!((outcome.reaction_time - frame_secs(1)).abs() < 1e-6);
}

#[test]
fn press_in_response_window_is_latched() {
    let config = common::trial_config();
    let onset = onset_frame(&config, 0);
    let (mut runner, _) = runner(config, 1);
    runner.keyboard.press_at("space", onset + 4, Duration::ZERO);

    let outcome = completed(runner.run_trial(&mut stimuli()).unwrap());
    assert_eq!(outcome.key, "space");
    assert!((outcome.reaction_time - frame_secs(4)).abs() < 1e-6);
}

#[test]
fn first_response_wins() {
    let config = common::trial_config();
    let onset = onset_frame(&config, 0);
    let (mut runner, _) = runner(config, 1);
    runner.keyboard.press_at("m", onset + 1, Duration::ZERO);
    runner.keyboard.press_at("c", onset + 2, Duration::ZERO);
    runner.keyboard.press_at("space", onset + 6, Duration::ZERO);

    let outcome = completed(runner.run_trial(&mut stimuli()).unwrap());
    assert_eq!(outcome.key, "m");
    assert!((outcome.reaction_time - frame_secs(1)).abs() < 1e-6);
}

#[test]
fn presses_before_stimulus_phase_are_discarded() {
    let (mut runner, _) = runner(common::trial_config(), 1);
    runner.keyboard.press_at("c", 1, Duration::ZERO);
    let outcome = completed(runner.run_trial(&mut stimuli()).unwrap());
    assert!(outcome.is_timeout());
}

#[test]
fn press_between_clear_and_onset_reads_negative() {
    let config = common::trial_config();
    let onset = onset_frame(&config, 0);
    let (mut runner, _) = runner(config, 1);
    runner.keyboard.press_at("m", onset - 1, PERIOD / 2);

    let outcome = completed(runner.run_trial(&mut stimuli()).unwrap());
    assert_eq!(outcome.key, "m");
    assert!(outcome.reaction_time < 0.0);
    assert!((outcome.reaction_time + PERIOD.as_secs_f64() / 2.0).abs() < 1e-6);
}

#[test]
fn keys_outside_the_response_set_are_ignored() {
    let config = common::trial_config();
    let onset = onset_frame(&config, 0);
    let (mut runner, _) = runner(config, 1);
    runner.keyboard.press_at("x", onset + 1, Duration::ZERO);
    let outcome = completed(runner.run_trial(&mut stimuli()).unwrap());
    assert!(outcome.is_timeout());
}

#[test]
fn abort_before_entry_renders_nothing() {
    let (mut runner, timeline) = runner(common::trial_config(), 1);
    runner.keyboard.press_at("f7", 0, Duration::ZERO);
    assert_eq!(runner.run_trial(&mut stimuli()).unwrap(), TrialStep::Aborted);
    assert_eq!(timeline.borrow().flips, 0);
}

#[test]
fn abort_during_a_trial_stops_the_next_one() {
    let config = common::trial_config();
    let total = config.total_frames() as u64;
    let (mut runner, timeline) = runner(config, 1);
    let mut set = stimuli();
    // Lands during pre-fixation, before the stimulus-phase clear.
    runner.keyboard.press_at("f7", 1, Duration::ZERO);

    let first = completed(runner.run_trial(&mut set).unwrap());
    assert!(first.is_timeout(), "abort key is not a response");
    assert_eq!(runner.run_trial(&mut set).unwrap(), TrialStep::Aborted);
    assert_eq!(timeline.borrow().flips, total);
}

#[test]
fn abort_in_response_window_stops_the_next_trial() {
    let config = common::trial_config();
    let onset = onset_frame(&config, 0);
    let (mut runner, _) = runner(config, 1);
    let mut set = stimuli();
    runner.keyboard.press_at("f7", onset + 4, Duration::ZERO);

    completed(runner.run_trial(&mut set).unwrap());
    assert_eq!(runner.run_trial(&mut set).unwrap(), TrialStep::Aborted);
}

#[test]
fn zero_probabilities_never_shift_or_cue() {
    let mut config = common::trial_config();
    config.car_shift_probability = 0.0;
    config.cue_probability = 0.0;
    config.incorrect_cue_probability = 0.0;
    let (mut runner, _) = runner(config, 11);
    let mut set = stimuli();
    for _ in 0..200 {
        let outcome = completed(runner.run_trial(&mut set).unwrap());
        assert_eq!(outcome.shift, ShiftCondition::Middle);
        assert_eq!(outcome.cue, CueCondition::None);
    }
}

#[test]
fn condition_frequencies_follow_probabilities() {
    let mut config = common::trial_config();
    config.pre_stim_time = 0;
    config.cue_to_stim_time = 0;
    config.stim_time = 1;
    config.reaction_time = 0;
    let (mut runner, _) = runner(config, 2024);
    let mut set = stimuli();

    let n = 4000;
    let (mut incorrect, mut correct, mut left, mut right) = (0, 0, 0, 0);
    for _ in 0..n {
        let outcome = completed(runner.run_trial(&mut set).unwrap());
        match outcome.cue {
            CueCondition::Incorrect => incorrect += 1,
            CueCondition::Correct => correct += 1,
            CueCondition::None => {}
        }
        match outcome.shift {
            ShiftCondition::Left => left += 1,
            ShiftCondition::Right => right += 1,
            ShiftCondition::Middle => {}
        }
    }
    let rate = |k: i32| k as f64 / n as f64;
    assert!((rate(incorrect) - 0.33).abs() < 0.03);
    assert!((rate(correct) - 0.33).abs() < 0.03);
    assert!((rate(left) - 0.1).abs() < 0.02);
    assert!((rate(right) - 0.1).abs() < 0.02);
}

#[test]
fn frames_show_cue_and_cars_only_in_their_phases() {
    let mut config = common::trial_config();
    config.cue_probability = 1.0;
    config.incorrect_cue_probability = 0.0;
    let (mut runner, timeline) = runner(config, 5);
    let outcome = completed(runner.run_trial(&mut stimuli()).unwrap());
    assert_eq!(outcome.cue, CueCondition::Correct);

    let counts: Vec<usize> = timeline.borrow().frames.iter().map(Vec::len).collect();
    // pre 2, cue 1, gap 1, stimulus 3, response 5
    assert_eq!(counts, vec![1, 1, 2, 1, 6, 6, 6, 1, 1, 1, 1, 1]);
    assert!(common::is_text(&timeline.borrow().frames[2][1], "*"));
}

#[test]
fn uncued_trial_draws_background_during_cue_phase() {
    let mut config = common::trial_config();
    config.cue_probability = 0.0;
    config.incorrect_cue_probability = 0.0;
    let (mut runner, timeline) = runner(config, 5);
    completed(runner.run_trial(&mut stimuli()).unwrap());
    assert_eq!(timeline.borrow().frames[2].len(), 1);
}

#[test]
fn zero_stimulus_frames_anchor_rt_to_first_response_flip() {
    let mut config = common::trial_config();
    config.stim_time = 0;
    let onset = onset_frame(&config, 0);
    let (mut runner, timeline) = runner(config, 1);
    runner.keyboard.press_at("c", onset + 2, Duration::ZERO);

    let outcome = completed(runner.run_trial(&mut stimuli()).unwrap());
    assert!((outcome.reaction_time - frame_secs(2)).abs() < 1e-6);
    assert!(timeline.borrow().frames.iter().all(|f| f.len() <= 2));
}

#[test]
fn same_seed_replays_the_same_trials() {
    let (mut a, _) = runner(common::trial_config(), 99);
    let (mut b, _) = runner(common::trial_config(), 99);
    let (mut sa, mut sb) = (stimuli(), stimuli());
    for _ in 0..20 {
        assert_eq!(a.run_trial(&mut sa).unwrap(), b.run_trial(&mut sb).unwrap());
    }
}

#[test]
fn display_failure_names_the_phase() {
    let (mut runner, _) = runner(common::trial_config(), 1);
    runner.display.fail_after = Some(3);
    let err = runner.run_trial(&mut stimuli()).unwrap_err();
    assert!(matches!(
        err,
        TrialError::Display {
            phase: TrialPhase::CueToStimGap,
            ..
        }
    ));
}

proptest! {
    #[test]
    fn frame_total_is_independent_of_the_jitter_draw(
        pre in 0u32..6,
        cue in 0u32..4,
        gap in 0u32..4,
        stim in 0u32..4,
        reaction in 0u32..6,
        variable in 0u32..8,
        seed in any::<u64>(),
    ) {
        let mut config = common::trial_config();
        config.pre_stim_time = pre;
        config.cue_time = cue;
        config.cue_to_stim_time = gap;
        config.stim_time = stim;
        config.reaction_time = reaction;
        config.variable_time = variable;
        let expected = config.total_frames() as u64;

        let (mut runner, timeline) = runner(config, seed);
        let mut set = stimuli();
        for n in 1..=3u64 {
            let step = runner.run_trial(&mut set).unwrap();
            prop_assert!(matches!(step, TrialStep::Completed(_)));
            prop_assert_eq!(timeline.borrow().flips, n * expected);
        }
    }
}
