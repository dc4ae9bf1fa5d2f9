pub mod render;
pub mod text;

pub use render::{RenderTimings, SceneRenderer, SkiaRenderer, Viewport};
pub use text::{load_font, render_text_block, render_text_pixmap};
