pub mod assets;
pub mod render;
pub mod text;

pub use render::{FrameStats, RenderSettings, SkiaRenderer};
pub use text::{load_font, render_text_pixmap};
