use ab_glyph::{point, Font, FontVec, Glyph, PxScale, ScaleFont};
use anyhow::{Context, Result};
use std::path::Path;
use tiny_skia::{Color, Pixmap, PixmapPaint, PremultipliedColorU8, Transform};

pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes =
        std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
    FontVec::try_from_vec(bytes).with_context(|| format!("parsing font {}", path.display()))
}

/// Rasterizes one line of text onto a transparent, premultiplied pixmap.
///
/// The pixmap spans the full ascent-to-descent height so that lines rendered
/// separately share a baseline. Returns `None` for text without visible
/// advance.
pub fn render_text_pixmap<F: Font>(
    text: &str,
    font_size: f32,
    font: &F,
    color: Color,
) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    // Baseline sits at the ascent
    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(id.with_scale_and_position(scale, point(pen_x, sf.ascent())));
        pen_x += sf.h_advance(id);
    }

    if text.trim().is_empty() || pen_x < 1.0 {
        return None;
    }
    let w = pen_x.ceil() as u32;
    let h = sf.height().ceil().max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;

    let stride = w as usize;
    let dst = pm.pixels_mut();
    let cu = color.to_color_u8();

    for g in glyphs {
        let Some(out) = font.outline_glyph(g) else {
            continue;
        };
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = x as i32 + b.min.x.floor() as i32;
            let iy = y as i32 + b.min.y.floor() as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize;

            // Premultiply source by coverage and alpha
            let a_lin = (cov * cu.alpha() as f32 / 255.0).clamp(0.0, 1.0);
            let sa = (a_lin * 255.0) as u8;
            let Some(src) = PremultipliedColorU8::from_rgba(
                (cu.red() as f32 * a_lin) as u8,
                (cu.green() as f32 * a_lin) as u8,
                (cu.blue() as f32 * a_lin) as u8,
                sa,
            ) else {
                return;
            };

            // Overlapping glyph edges: out = src + bg * (1 - src.a)
            let bg = dst[i];
            let inv = 1.0 - sa as f32 / 255.0;
            let blended = PremultipliedColorU8::from_rgba(
                src.red().saturating_add((bg.red() as f32 * inv) as u8),
                src.green().saturating_add((bg.green() as f32 * inv) as u8),
                src.blue().saturating_add((bg.blue() as f32 * inv) as u8),
                src.alpha().saturating_add((bg.alpha() as f32 * inv) as u8),
            );
            if let Some(px) = blended {
                dst[i] = px;
            }
        });
    }

    Some(pm)
}

/// Multi-line text, each line centred within the block
pub fn render_text_block<F: Font>(
    text: &str,
    font_size: f32,
    font: &F,
    color: Color,
) -> Option<Pixmap> {
    let sf = font.as_scaled(PxScale::from(font_size));
    let advance = sf.height() + sf.line_gap();

    let lines: Vec<Option<Pixmap>> = text
        .lines()
        .map(|line| render_text_pixmap(line, font_size, font, color))
        .collect();
    let width = lines.iter().flatten().map(Pixmap::width).max()?;
    let height = (advance * lines.len() as f32).ceil() as u32;
    let mut block = Pixmap::new(width, height.max(1))?;

    for (i, line) in lines.iter().enumerate() {
        if let Some(line) = line {
            let x = (width - line.width()) / 2;
            let y = (advance * i as f32).round() as i32;
            block.draw_pixmap(
                x as i32,
                y,
                line.as_ref(),
                &PixmapPaint::default(),
                Transform::identity(),
                None,
            );
        }
    }
    Some(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_font_file_is_an_error() {
        let err = load_font(Path::new("/nonexistent/font.ttf")).unwrap_err();
        assert!(err.to_string().contains("reading font"));
    }

    #[test]
    fn garbage_font_file_is_an_error() {
        let dir = std::env::temp_dir().join(format!("numag-font-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        let err = load_font(&path).unwrap_err();
        assert!(err.to_string().contains("parsing font"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
