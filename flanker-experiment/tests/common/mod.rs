//! Headless doubles: a display that records frames on a synthetic 60 Hz
//! timeline and a keyboard that replays presses scheduled on that timeline.

#![allow(dead_code)]

use flanker_core::{KeyPress, StimulusHandle, StimulusKind};
use flanker_experiment::{Display, DisplayError, ExperimentConfig, Keyboard, TrialConfig};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

pub const PERIOD: Duration = Duration::from_nanos(16_666_667);

#[derive(Debug)]
pub struct Timeline {
    pub base: Instant,
    pub period: Duration,
    pub flips: u64,
    pub frames: Vec<Vec<StimulusHandle>>,
    pending: Vec<StimulusHandle>,
}

impl Timeline {
    pub fn now(&self) -> Instant {
        self.at_frame(self.flips)
    }

    pub fn at_frame(&self, frame: u64) -> Instant {
        self.base + self.period * frame as u32
    }
}

pub type SharedTimeline = Rc<RefCell<Timeline>>;

pub fn timeline() -> SharedTimeline {
    Rc::new(RefCell::new(Timeline {
        base: Instant::now(),
        period: PERIOD,
        flips: 0,
        frames: Vec::new(),
        pending: Vec::new(),
    }))
}

pub struct SimDisplay {
    pub timeline: SharedTimeline,
    pub fail_after: Option<u64>,
}

impl SimDisplay {
    pub fn new(timeline: SharedTimeline) -> Self {
        Self {
            timeline,
            fail_after: None,
        }
    }
}

impl Display for SimDisplay {
    fn draw(&mut self, handle: &StimulusHandle) -> Result<(), DisplayError> {
        self.timeline.borrow_mut().pending.push(handle.clone());
        Ok(())
    }

    fn flip(&mut self) -> Result<Instant, DisplayError> {
        let mut t = self.timeline.borrow_mut();
        if self.fail_after.is_some_and(|n| t.flips >= n) {
            return Err(DisplayError::new("surface lost"));
        }
        let frame = std::mem::take(&mut t.pending);
        t.frames.push(frame);
        t.flips += 1;
        Ok(t.now())
    }

    fn frame_period(&self) -> Option<Duration> {
        Some(self.timeline.borrow().period)
    }
}

pub struct ScriptedKeyboard {
    pub timeline: SharedTimeline,
    scheduled: Vec<KeyPress>,
    queue: Vec<KeyPress>,
    /// Answer immediately whenever this key is among the requested ones.
    pub auto_answer: Option<String>,
}

impl ScriptedKeyboard {
    pub fn new(timeline: SharedTimeline) -> Self {
        Self {
            timeline,
            scheduled: Vec::new(),
            queue: Vec::new(),
            auto_answer: None,
        }
    }

    /// Schedule a press at `frame` refreshes plus `offset` after the start.
    pub fn press_at(&mut self, key: &str, frame: u64, offset: Duration) {
        let at = self.timeline.borrow().at_frame(frame) + offset;
        self.scheduled.push(KeyPress::new(key, at));
        self.scheduled.sort_by_key(|p| p.at);
    }

    fn deliver_due(&mut self) {
        let now = self.timeline.borrow().now();
        let due = self.scheduled.iter().take_while(|p| p.at <= now).count();
        self.queue.extend(self.scheduled.drain(..due));
    }
}

impl Keyboard for ScriptedKeyboard {
    fn get_keys(&mut self, keys: &[String]) -> Vec<KeyPress> {
        self.deliver_due();
        if let Some(answer) = &self.auto_answer {
            if keys.contains(answer) {
                return vec![KeyPress::new(answer.clone(), self.timeline.borrow().now())];
            }
        }
        let (matching, rest): (Vec<_>, Vec<_>) =
            self.queue.drain(..).partition(|p| keys.contains(&p.key));
        self.queue = rest;
        matching
    }

    fn clear_events(&mut self) {
        self.deliver_due();
        self.queue.clear();
    }
}

pub fn trial_config() -> TrialConfig {
    TrialConfig {
        pre_stim_time: 2,
        cue_time: 1,
        cue_to_stim_time: 1,
        stim_time: 3,
        reaction_time: 5,
        variable_time: 0,
        stim_hor_angle: 2.5,
        stim_hor_angle_shift: 0.5,
        stim_ver_angle: 3.0,
        car_shift_probability: 0.2,
        cue_probability: 0.66,
        incorrect_cue_probability: 0.33,
        reaction_keys: vec!["c".into(), "m".into(), "space".into()],
    }
}

/// Frame index of the stimulus-onset flip for a zero-jitter trial that
/// starts after `start` flips.
pub fn onset_frame(config: &TrialConfig, start: u64) -> u64 {
    start + (config.pre_stim_time + config.cue_time + config.cue_to_stim_time) as u64 + 1
}

pub fn is_text(handle: &StimulusHandle, content: &str) -> bool {
    matches!(&handle.kind, StimulusKind::Text { content: c, .. } if c == content)
}

pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("flanker-it-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn write_messages(dir: &Path) {
    for i in 1..=6 {
        std::fs::write(dir.join(format!("ins{i}.txt")), format!("# screen {i}\nPage {i}\n"))
            .unwrap();
    }
}

pub fn experiment_config(root: &Path) -> ExperimentConfig {
    let messages = root.join("messages");
    std::fs::create_dir_all(&messages).unwrap();
    write_messages(&messages);
    ExperimentConfig {
        trial: trial_config(),
        no_training_trials: 2,
        no_blocks: 2,
        no_trials_in_block: 3,
        frame_rate: 60,
        background_color: [128, 128, 128, 255],
        text_color: [0, 0, 0, 255],
        abort_key: "f7".into(),
        feedback_time_ms: 0,
        pixels_per_degree: 40.0,
        info_text_height: 20.0,
        feedback_text_height: 50.0,
        calibration_frames: 30,
        background_image: root.join("fixation.bmp"),
        car_image: root.join("car.bmp"),
        font_path: root.join("font.ttf"),
        messages_dir: messages,
        results_dir: root.join("results"),
    }
}

pub fn stimuli() -> flanker_core::StimulusSet {
    use flanker_core::Units;
    let image = |p: &str| StimulusKind::Image {
        path: p.into(),
        size: None,
    };
    flanker_core::StimulusSet::new(
        StimulusHandle::new(image("fixation.bmp"), Units::Pixels),
        StimulusHandle::new(
            StimulusKind::Text {
                content: "*".into(),
                height: 2.0,
                color: [0, 0, 0, 255],
            },
            Units::Degrees,
        ),
        StimulusHandle::new(image("car.bmp"), Units::Degrees),
    )
}
