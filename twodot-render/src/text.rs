use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontArc, Glyph, PxScale, ScaleFont, point};
use tiny_skia::{Color, Pixmap, PremultipliedColorU8};
use tracing::{info, warn};

pub const FONT_FILE: &str = "DejaVuSans.ttf";

/// Loads the label font from `assets_dir`, falling back to the system copy
/// of DejaVu Sans. `None` means controls are drawn without labels.
pub fn load_font(assets_dir: &Path) -> Option<FontArc> {
    let candidates = [
        assets_dir.join(FONT_FILE),
        PathBuf::from("/usr/share/fonts/truetype/dejavu").join(FONT_FILE),
    ];
    for path in &candidates {
        let Ok(bytes) = std::fs::read(path) else {
            continue;
        };
        match FontArc::try_from_vec(bytes) {
            Ok(font) => {
                info!("Label font: {}", path.display());
                return Some(font);
            }
            Err(e) => warn!("Invalid font {}: {}", path.display(), e),
        }
    }
    warn!("No label font found; controls are drawn without text");
    None
}

/// Rasterizes `text` onto a transparent pixmap sized to its ink bounds.
/// Returns `None` for text with no visible glyphs.
pub fn render_text_pixmap(text: &str, font_size: f32, font: &FontArc, color: Color) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for out in &outlines {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }
    if outlines.is_empty() {
        return None;
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;
    let stride = w as usize;
    let dst = pm.pixels_mut();

    let cu = color.to_color_u8();
    for out in &outlines {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i32;
            let iy = (y as f32 + b.min.y - min_y).floor() as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize;

            // Source over, premultiplied.
            let a = (cov * cu.alpha() as f32 / 255.0).clamp(0.0, 1.0);
            let inv = 1.0 - a;
            let bg = dst[i];
            let blend = |s: u8, d: u8| ((s as f32 * a) + d as f32 * inv).round().min(255.0) as u8;
            let r = blend(cu.red(), bg.red());
            let g = blend(cu.green(), bg.green());
            let bl = blend(cu.blue(), bg.blue());
            let alpha = ((a * 255.0) + bg.alpha() as f32 * inv).round().min(255.0) as u8;
            if let Some(px) = PremultipliedColorU8::from_rgba(r.min(alpha), g.min(alpha), bl.min(alpha), alpha) {
                dst[i] = px;
            }
        });
    }
    Some(pm)
}
