use flanker_cache::intern_text;
use std::path::PathBuf;

/// Defines stimuli and their render data
pub trait Stimulus: Clone + Send + Sync + std::fmt::Debug {
    fn cache_id(&self) -> usize;
    fn is_text(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub enum StimulusKind {
    /// Bitmap loaded from disk, drawn at its native size unless `size` is set.
    Image {
        path: PathBuf,
        size: Option<(f32, f32)>,
    },
    Text {
        content: String,
        height: f32,
        color: [u8; 4],
    },
}

impl Stimulus for StimulusKind {
    fn cache_id(&self) -> usize {
        match self {
            StimulusKind::Image { path, .. } => {
                intern_text(&format!("image:{}", path.display()))
            }
            StimulusKind::Text { content, .. } => intern_text(content),
        }
    }

    fn is_text(&self) -> bool {
        matches!(self, StimulusKind::Text { .. })
    }
}

/// Coordinate system of a handle's position and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Units {
    #[default]
    Pixels,
    /// Degrees of visual angle, converted by the display's pixels-per-degree.
    Degrees,
}

/// A positionable, orientable drawable.
///
/// Positions are relative to the screen centre with +y pointing up.
#[derive(Debug, Clone, PartialEq)]
pub struct StimulusHandle {
    pub kind: StimulusKind,
    pub units: Units,
    pub pos: (f32, f32),
    pub flip_horiz: bool,
}

impl StimulusHandle {
    pub fn new(kind: StimulusKind, units: Units) -> Self {
        Self {
            kind,
            units,
            pos: (0.0, 0.0),
            flip_horiz: false,
        }
    }

    pub fn cache_id(&self) -> usize {
        self.kind.cache_id()
    }
}

/// Drawables shared by every trial of a session.
///
/// Built once by the harness; the sequencer only rewrites position and flip
/// of the existing handles.
#[derive(Debug, Clone)]
pub struct StimulusSet {
    pub background: StimulusHandle,
    pub cue: StimulusHandle,
    /// Left to right; index 2 is the middle car.
    pub cars: [StimulusHandle; 5],
}

impl StimulusSet {
    pub const MIDDLE: usize = 2;
    pub const OUTER: [usize; 4] = [0, 1, 3, 4];

    pub fn new(background: StimulusHandle, cue: StimulusHandle, car: StimulusHandle) -> Self {
        Self {
            background,
            cue,
            cars: std::array::from_fn(|_| car.clone()),
        }
    }

    pub fn middle(&self) -> &StimulusHandle {
        &self.cars[Self::MIDDLE]
    }

    pub fn middle_mut(&mut self) -> &mut StimulusHandle {
        &mut self.cars[Self::MIDDLE]
    }

    pub fn outer_mut(&mut self) -> impl Iterator<Item = &mut StimulusHandle> {
        self.cars
            .iter_mut()
            .enumerate()
            .filter(|(i, _)| *i != Self::MIDDLE)
            .map(|(_, car)| car)
    }
}
