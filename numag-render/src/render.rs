use crate::text::render_text_block;
use ab_glyph::FontVec;
use anyhow::{Context, Result, ensure};
use bytemuck::{cast_slice, cast_slice_mut};
use numag_core::scene::{FAREWELL, FAREWELL_HINT, INSTRUCTIONS, INSTRUCTIONS_HINT};
use numag_core::{Dot, MaskPattern, Rgb, Scene};
use numag_timing::Timer;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tiny_skia::{
    Color, FillRule, FilterQuality, LineCap, Paint, PathBuilder, Pixmap, PixmapPaint, Rect,
    Stroke, Transform,
};
use tracing::{debug, warn};

const BACKGROUND: Rgb = Rgb::GREY;

// Logical pixels
const FIXATION_HALF: f32 = 24.0;
const FIXATION_WIDTH: f32 = 6.0;
const PARTITION_WIDTH: f32 = 10.0;

/// `(text, height, y)` in logical pixels
type TextLine = (&'static str, f32, f32);

const INSTRUCTION_LINES: [TextLine; 2] = [
    (INSTRUCTIONS, 32.0, 30.0),
    (INSTRUCTIONS_HINT, 20.0, -350.0),
];
const FAREWELL_LINES: [TextLine; 2] = [(FAREWELL, 36.0, 0.0), (FAREWELL_HINT, 18.0, -350.0)];
const FEEDBACK_HEIGHT: f32 = 40.0;

fn color(c: Rgb) -> Color {
    Color::from_rgba8(c.r, c.g, c.b, 255)
}

/// Maps centre-origin, y-up logical coordinates onto the window, scaled
/// uniformly so the whole logical screen fits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f32,
    pub center: (f32, f32),
    pub logical: (f32, f32),
}

impl Viewport {
    pub fn fit(width: u32, height: u32, logical: (f32, f32)) -> Self {
        let scale = (width as f32 / logical.0).min(height as f32 / logical.1);
        Self {
            scale,
            center: (width as f32 / 2.0, height as f32 / 2.0),
            logical,
        }
    }

    pub fn to_px(&self, x: f32, y: f32) -> (f32, f32) {
        (self.center.0 + x * self.scale, self.center.1 - y * self.scale)
    }

    pub fn px_len(&self, len: f32) -> f32 {
        len * self.scale
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderTimings {
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
}

pub trait SceneRenderer {
    /// Redraws the offscreen canvas for `scene`
    fn draw_scene(&mut self, scene: &Scene<'_>) -> Result<()>;
}

pub struct SkiaRenderer {
    width: u32,
    height: u32,
    viewport: Viewport,

    font: Option<FontVec>,
    warned_missing_font: bool,

    text_cache: HashMap<(&'static str, u32), Option<Arc<Pixmap>>>,
    mask_cache: Option<(Vec<u8>, Pixmap)>,

    canvas: Pixmap,
}

impl SkiaRenderer {
    pub fn new(width: u32, height: u32, logical: (f32, f32), font: Option<FontVec>) -> Result<Self> {
        ensure!(
            logical.0 > 0.0 && logical.1 > 0.0,
            "logical screen size must be positive, got {}x{}",
            logical.0,
            logical.1
        );
        let mut canvas = Pixmap::new(width, height)
            .with_context(|| format!("cannot allocate a {width}x{height} canvas"))?;
        canvas.fill(color(BACKGROUND));

        Ok(Self {
            width,
            height,
            viewport: Viewport::fit(width, height, logical),
            font,
            warned_missing_font: false,
            text_cache: HashMap::new(),
            mask_cache: None,
            canvas,
        })
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) -> Result<()> {
        self.canvas = Pixmap::new(new_width, new_height)
            .with_context(|| format!("cannot allocate a {new_width}x{new_height} canvas"))?;
        self.width = new_width;
        self.height = new_height;
        self.viewport = Viewport::fit(new_width, new_height, self.viewport.logical);
        // Text sizes follow the scale
        self.text_cache.clear();
        debug!("Canvas resized to {new_width}x{new_height}, scale {}", self.viewport.scale);
        Ok(())
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    /// Draws `scene` and copies the canvas into an RGBA frame of the same size.
    pub fn render_frame<T: Timer>(
        &mut self,
        scene: &Scene<'_>,
        frame_buffer: &mut [u8],
        timer: &T,
    ) -> Result<RenderTimings> {
        ensure!(
            frame_buffer.len() == self.canvas.data().len(),
            "frame buffer holds {} bytes, canvas needs {}",
            frame_buffer.len(),
            self.canvas.data().len()
        );

        let t = timer.now();
        self.draw_scene(scene)?;
        let draw = timer.elapsed(t);

        // Canvas pixels are opaque, so premultiplied equals straight RGBA
        let t = timer.now();
        frame_buffer.copy_from_slice(self.canvas.data());
        let copy = timer.elapsed(t);

        Ok(RenderTimings {
            draw,
            copy,
            total: draw + copy,
        })
    }

    fn draw_fixation(&mut self) {
        let (cx, cy) = self.viewport.to_px(0.0, 0.0);
        let h = self.viewport.px_len(FIXATION_HALF);

        let mut pb = PathBuilder::new();
        pb.move_to(cx - h, cy - h);
        pb.line_to(cx + h, cy + h);
        pb.move_to(cx - h, cy + h);
        pb.line_to(cx + h, cy - h);
        let Some(path) = pb.finish() else {
            return;
        };

        let mut paint = Paint::default();
        paint.set_color(color(Rgb::WHITE));
        let stroke = Stroke {
            width: self.viewport.px_len(FIXATION_WIDTH),
            line_cap: LineCap::Butt,
            ..Stroke::default()
        };
        self.canvas
            .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    fn draw_dots(&mut self, dots: &[Dot]) {
        let mut paint = Paint::default();
        for dot in dots {
            let (x, y) = self.viewport.to_px(dot.x, dot.y);
            let Some(path) = PathBuilder::from_circle(x, y, self.viewport.px_len(dot.radius)) else {
                continue;
            };
            paint.set_color(color(dot.color));
            self.canvas
                .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        }

        let (_, logical_h) = self.viewport.logical;
        let (x0, y0) = self.viewport.to_px(-PARTITION_WIDTH / 2.0, logical_h / 2.0);
        let partition = Rect::from_xywh(
            x0,
            y0,
            self.viewport.px_len(PARTITION_WIDTH),
            self.viewport.px_len(logical_h),
        );
        if let Some(rect) = partition {
            paint.set_color(color(Rgb::BLACK));
            paint.anti_alias = false;
            self.canvas
                .fill_rect(rect, &paint, Transform::identity(), None);
        }
    }

    /// Stretches the noise grid over the logical screen without smoothing
    fn draw_mask(&mut self, mask: &MaskPattern) {
        let stale = self
            .mask_cache
            .as_ref()
            .is_none_or(|(levels, _)| *levels != mask.levels);
        if stale {
            let Some(pixmap) = mask_pixmap(mask) else {
                warn!("Cannot build a {0}x{0} mask pixmap", mask.size);
                return;
            };
            self.mask_cache = Some((mask.levels.clone(), pixmap));
        }
        let Some((_, pixmap)) = &self.mask_cache else {
            return;
        };

        let (logical_w, logical_h) = self.viewport.logical;
        let (x0, y0) = self.viewport.to_px(-logical_w / 2.0, logical_h / 2.0);
        let sx = self.viewport.px_len(logical_w) / pixmap.width() as f32;
        let sy = self.viewport.px_len(logical_h) / pixmap.height() as f32;
        let paint = PixmapPaint {
            quality: FilterQuality::Nearest,
            ..PixmapPaint::default()
        };
        self.canvas.draw_pixmap(
            0,
            0,
            pixmap.as_ref(),
            &paint,
            Transform::from_row(sx, 0.0, 0.0, sy, x0, y0),
            None,
        );
    }

    fn draw_text(&mut self, (text, height, y): TextLine) {
        let Some(font) = &self.font else {
            if !self.warned_missing_font {
                warn!("No font loaded; text screens are shown blank");
                self.warned_missing_font = true;
            }
            return;
        };

        let px = self.viewport.px_len(height);
        let cached = self
            .text_cache
            .entry((text, px.round() as u32))
            .or_insert_with(|| render_text_block(text, px, font, Color::WHITE).map(Arc::new))
            .clone();
        if let Some(pixmap) = cached {
            let pos = self.viewport.to_px(0.0, y);
            self.blit(&pixmap, pos);
        }
    }

    /// Composites a premultiplied pixmap centred on `pos`, clipped to the
    /// canvas.
    fn blit(&mut self, pm: &Pixmap, pos: (f32, f32)) {
        let (w, h) = (pm.width() as i32, pm.height() as i32);
        let (cw, ch) = (self.width as i32, self.height as i32);

        let x = (pos.0 - w as f32 * 0.5).round() as i32;
        let y = (pos.1 - h as f32 * 0.5).round() as i32;
        if x + w <= 0 || y + h <= 0 || x >= cw || y >= ch {
            return;
        }

        let (dst_x, dst_y) = (x.max(0), y.max(0));
        let (src_x, src_y) = (dst_x - x, dst_y - y);
        let copy_w = (w - src_x).min(cw - dst_x) as usize;
        let copy_h = (h - src_y).min(ch - dst_y) as usize;

        let src: &[[u8; 4]] = cast_slice(pm.data());
        let dst: &mut [[u8; 4]] = cast_slice_mut(self.canvas.data_mut());
        for row in 0..copy_h {
            let s0 = (src_y as usize + row) * w as usize + src_x as usize;
            let d0 = (dst_y as usize + row) * cw as usize + dst_x as usize;
            for (d, s) in dst[d0..d0 + copy_w].iter_mut().zip(&src[s0..s0 + copy_w]) {
                *d = over(*s, *d);
            }
        }
    }
}

impl SceneRenderer for SkiaRenderer {
    fn draw_scene(&mut self, scene: &Scene<'_>) -> Result<()> {
        self.canvas.fill(color(BACKGROUND));
        match *scene {
            Scene::Instructions => INSTRUCTION_LINES.into_iter().for_each(|l| self.draw_text(l)),
            Scene::Farewell => FAREWELL_LINES.into_iter().for_each(|l| self.draw_text(l)),
            Scene::Feedback(kind) => self.draw_text((kind.message(), FEEDBACK_HEIGHT, 0.0)),
            Scene::Fixation => self.draw_fixation(),
            Scene::Dots(dots) => self.draw_dots(dots),
            Scene::Mask(mask) => self.draw_mask(mask),
            Scene::Blank => {}
        }
        Ok(())
    }
}

/// Premultiplied source-over
fn over(src: [u8; 4], dst: [u8; 4]) -> [u8; 4] {
    let inv = 255 - src[3] as u32;
    std::array::from_fn(|i| (src[i] as u32 + (dst[i] as u32 * inv + 127) / 255) as u8)
}

fn mask_pixmap(mask: &MaskPattern) -> Option<Pixmap> {
    let mut pm = Pixmap::new(mask.size, mask.size)?;
    let pixels: &mut [[u8; 4]] = cast_slice_mut(pm.data_mut());
    for (px, &level) in pixels.iter_mut().zip(&mask.levels) {
        *px = [level, level, level, 255];
    }
    Some(pm)
}
