//! Collaborator seams between the sequencer and a presentation backend.

use flanker_core::{KeyPress, StimulusHandle};
use std::error::Error;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{message}")]
pub struct DisplayError {
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl DisplayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn backend(
        message: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// Frame-synchronized drawing surface.
///
/// Draw calls accumulate into the back buffer; `flip` presents it.
pub trait Display {
    fn draw(&mut self, handle: &StimulusHandle) -> Result<(), DisplayError>;

    /// Present the frame, blocking until the next vertical refresh.
    ///
    /// Returns the moment the refresh happened. Anything that must be tied to
    /// the flip, such as the stimulus-onset clock reset, is anchored to this
    /// timestamp rather than to when the caller regains control.
    fn flip(&mut self) -> Result<Instant, DisplayError>;

    /// Refresh period the backend reports, if it knows one.
    fn frame_period(&self) -> Option<Duration> {
        None
    }
}

/// Non-blocking keyboard event source.
pub trait Keyboard {
    /// Remove and return pending presses whose key is in `keys`, oldest
    /// first. Presses of other keys stay queued.
    fn get_keys(&mut self, keys: &[String]) -> Vec<KeyPress>;

    /// Drop every pending press.
    fn clear_events(&mut self);
}

impl<T: Display + ?Sized> Display for &mut T {
    fn draw(&mut self, handle: &StimulusHandle) -> Result<(), DisplayError> {
        (**self).draw(handle)
    }

    fn flip(&mut self) -> Result<Instant, DisplayError> {
        (**self).flip()
    }

    fn frame_period(&self) -> Option<Duration> {
        (**self).frame_period()
    }
}

impl<T: Keyboard + ?Sized> Keyboard for &mut T {
    fn get_keys(&mut self, keys: &[String]) -> Vec<KeyPress> {
        (**self).get_keys(keys)
    }

    fn clear_events(&mut self) {
        (**self).clear_events()
    }
}
