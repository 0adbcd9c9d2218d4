pub mod keys;
pub mod window;

pub use keys::key_name;
pub use window::{WinitDisplay, WinitKeyboard};
