pub mod text;
pub mod view;

pub use ab_glyph::FontArc;
pub use text::{load_font, render_text_pixmap};
pub use view::{Control, FrameStats, SkiaView};
