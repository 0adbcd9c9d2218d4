use std::time::Instant;

/// A single key-down event as delivered by a keyboard source.
///
/// `key` uses lowercase names (`"space"`, `"c"`, `"f7"`, `"return"`).
/// `at` is the moment the event was observed; converting it to seconds is
/// the trial clock's job, so attribution can happen after the onset reset.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPress {
    pub key: String,
    pub at: Instant,
}

impl KeyPress {
    pub fn new(key: impl Into<String>, at: Instant) -> Self {
        Self {
            key: key.into(),
            at,
        }
    }
}
