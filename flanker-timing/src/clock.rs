use std::time::Instant;

/// Resettable clock that reaction times are measured against.
///
/// Readings are signed seconds relative to the last reset, so an event
/// observed before the reset point reads negative.
pub trait TrialClock {
    /// Move the zero point to `origin`.
    fn reset_to(&mut self, origin: Instant);

    /// Seconds between the zero point and `at`.
    fn time_of(&self, at: Instant) -> f64;

    fn reset(&mut self) {
        self.reset_to(Instant::now());
    }

    fn get_time(&self) -> f64 {
        self.time_of(Instant::now())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn origin(&self) -> Instant {
        self.origin
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TrialClock for MonotonicClock {
    fn reset_to(&mut self, origin: Instant) {
        self.origin = origin;
    }

    fn time_of(&self, at: Instant) -> f64 {
        signed_secs(self.origin, at)
    }
}

fn signed_secs(origin: Instant, at: Instant) -> f64 {
    match at.checked_duration_since(origin) {
        Some(d) => d.as_secs_f64(),
        None => -origin.saturating_duration_since(at).as_secs_f64(),
    }
}
