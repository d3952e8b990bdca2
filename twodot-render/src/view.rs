use std::path::Path;
use std::time::Duration;

use ab_glyph::FontArc;
use anyhow::{Result, anyhow};
use tiny_skia::{
    Color, FillRule, FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Transform,
};
use tracing::warn;
use twodot_core::{PresentationView, TrialSpec};
use twodot_timing::Timer;

use crate::text::render_text_pixmap;

const BACKGROUND: [u8; 4] = [255, 255, 255, 255];
const MARKER_ACTIVE: [u8; 4] = [220, 30, 30, 255];
const MARKER_INACTIVE: [u8; 4] = [0, 0, 0, 255];
const PLACEHOLDER: [u8; 4] = [200, 200, 200, 255];
const CONTINUE_FILL: [u8; 4] = [40, 160, 70, 255];
const FEEDBACK_FILL: [u8; 4] = [40, 90, 200, 255];
const LABEL_SIZE_PX: f32 = 26.0;

const BUTTON_SIZE: (f32, f32) = (180.0, 56.0);
const BUTTON_GAP: f32 = 20.0;

/// Participant-facing controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Feedback,
}

impl Control {
    pub fn label(self) -> &'static str {
        match self {
            Control::Continue => "Continue",
            Control::Feedback => "Feedback",
        }
    }
}

#[derive(Default)]
struct Labels {
    continue_label: Option<Pixmap>,
    feedback_label: Option<Pixmap>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct ViewState {
    first_active: bool,
    second_active: bool,
    continuation_visible: bool,
    feedback_visible: bool,
}

#[derive(Debug, Clone, Copy)]
struct Layout {
    image: Rect,
    first_marker: (f32, f32),
    second_marker: (f32, f32),
    feedback_button: Rect,
    continue_button: Rect,
}

pub struct FrameStats {
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
    pub dirty_count: usize,
}

/// Trial screen painted with tiny-skia: the trial image, two markers under
/// it and the feedback/continue controls below them.
///
/// State changes only touch the elements that changed; `render_frame`
/// repaints those and copies the dirty rects into the frame buffer.
pub struct SkiaView {
    width: u32,
    height: u32,
    image: Option<Pixmap>,
    image_height_px: u32,
    show_markers: bool,
    marker_radius: f32,
    layout: Layout,
    labels: Labels,
    state: ViewState,
    drawn: Option<ViewState>,
    canvas: Pixmap,
    dirty_regions: Vec<Rect>,
}

impl SkiaView {
    pub fn new(
        width: u32,
        height: u32,
        image: Option<Pixmap>,
        image_height_px: u32,
        show_markers: bool,
        marker_radius: f32,
    ) -> Result<Self> {
        let canvas = Pixmap::new(width, height)
            .ok_or_else(|| anyhow!("cannot create {width}x{height} canvas"))?;
        let image_height_px = image_height_px.max(1);
        let layout = Self::layout(width, height, image.as_ref(), image_height_px, marker_radius)
            .ok_or_else(|| anyhow!("no layout fits a {width}x{height} window"))?;
        Ok(Self {
            width,
            height,
            image,
            image_height_px,
            show_markers,
            marker_radius,
            layout,
            labels: Labels::default(),
            state: ViewState::default(),
            drawn: None,
            canvas,
            dirty_regions: Vec::with_capacity(8),
        })
    }

    /// Rasterizes the control captions once; buttons are drawn plain
    /// without this.
    pub fn with_labels(mut self, font: &FontArc) -> Self {
        let white = Color::WHITE;
        self.labels = Labels {
            continue_label: render_text_pixmap(Control::Continue.label(), LABEL_SIZE_PX, font, white),
            feedback_label: render_text_pixmap(Control::Feedback.label(), LABEL_SIZE_PX, font, white),
        };
        self.drawn = None;
        self
    }

    /// View for one trial, loading its PNG image from `assets_dir`. An
    /// unreadable image is replaced by a placeholder.
    pub fn for_trial(
        width: u32,
        height: u32,
        spec: &TrialSpec,
        assets_dir: &Path,
        marker_radius: f32,
        font: Option<&FontArc>,
    ) -> Result<Self> {
        let path = assets_dir.join(spec.image.as_str());
        let image = match Pixmap::load_png(&path) {
            Ok(pixmap) => Some(pixmap),
            Err(e) => {
                warn!("Cannot load image {}: {}", path.display(), e);
                None
            }
        };
        let view = Self::new(
            width,
            height,
            image,
            spec.image_height_px,
            spec.has_markers(),
            marker_radius,
        )?;
        Ok(match font {
            Some(font) => view.with_labels(font),
            None => view,
        })
    }

    fn layout(
        width: u32,
        height: u32,
        image: Option<&Pixmap>,
        image_height_px: u32,
        marker_radius: f32,
    ) -> Option<Layout> {
        let (w, h) = (width as f32, height as f32);
        let cx = w / 2.0;

        // Image keeps its aspect ratio at the requested height, capped to
        // the upper part of the screen.
        let image_h = (image_height_px as f32).min(h * 0.55).max(1.0);
        let image_w = match image {
            Some(p) => p.width() as f32 * image_h / p.height().max(1) as f32,
            None => image_h,
        }
        .min(w);
        let image_top = h * 0.05;
        let image = rect(cx - image_w / 2.0, image_top, image_w, image_h)?;

        let marker_y = image_top + image_h + marker_radius * 2.5;
        let spread = (w * 0.15).max(marker_radius * 3.0);

        let (bw, bh) = BUTTON_SIZE;
        let feedback_top = marker_y + marker_radius * 2.5;
        let feedback_button = rect(cx - bw / 2.0, feedback_top, bw, bh)?;
        let continue_button = rect(cx - bw / 2.0, feedback_top + bh + BUTTON_GAP, bw, bh)?;

        Some(Layout {
            image,
            first_marker: (cx - spread, marker_y),
            second_marker: (cx + spread, marker_y),
            feedback_button,
            continue_button,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let canvas = Pixmap::new(width, height)
            .ok_or_else(|| anyhow!("cannot create {width}x{height} canvas"))?;
        self.layout = Self::layout(
            width,
            height,
            self.image.as_ref(),
            self.image_height_px,
            self.marker_radius,
        )
        .ok_or_else(|| anyhow!("no layout fits a {width}x{height} window"))?;
        self.canvas = canvas;
        self.width = width;
        self.height = height;
        self.drawn = None;
        Ok(())
    }

    /// Resizes only when the frame buffer size differs from the canvas.
    pub fn ensure_size(&mut self, width: u32, height: u32) -> Result<()> {
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        self.resize(width, height)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Control under the given pixel, if it is currently visible.
    pub fn hit_test(&self, x: f32, y: f32) -> Option<Control> {
        let inside = |r: &Rect| x >= r.left() && x < r.right() && y >= r.top() && y < r.bottom();
        if self.state.continuation_visible && inside(&self.layout.continue_button) {
            return Some(Control::Continue);
        }
        if self.state.feedback_visible && inside(&self.layout.feedback_button) {
            return Some(Control::Feedback);
        }
        None
    }

    pub fn is_visible(&self, control: Control) -> bool {
        match control {
            Control::Continue => self.state.continuation_visible,
            Control::Feedback => self.state.feedback_visible,
        }
    }

    /// Repaints what changed since the last frame and copies it into
    /// `frame_buffer` (RGBA8, `width * height * 4` bytes).
    pub fn render_frame<T: Timer<Timestamp = u64>>(
        &mut self,
        frame_buffer: &mut [u8],
        timer: &mut T,
    ) -> Result<FrameStats> {
        let expected = self.width as usize * self.height as usize * 4;
        if frame_buffer.len() != expected {
            return Err(anyhow!(
                "frame buffer holds {} bytes, expected {}",
                frame_buffer.len(),
                expected
            ));
        }

        let t_draw = timer.now();
        self.dirty_regions.clear();
        match self.drawn {
            None => self.draw_all(),
            Some(previous) if previous != self.state => self.draw_changes(previous),
            Some(_) => {}
        }
        self.drawn = Some(self.state);
        let draw = timer.elapsed(t_draw);

        let t_copy = timer.now();
        for i in 0..self.dirty_regions.len() {
            let dirty = self.dirty_regions[i];
            self.copy_dirty_region(dirty, frame_buffer);
        }
        let copy = timer.elapsed(t_copy);

        let total = draw + copy;
        timer.record_frame(total);
        Ok(FrameStats {
            draw,
            copy,
            total,
            dirty_count: self.dirty_regions.len(),
        })
    }

    fn draw_all(&mut self) {
        self.canvas.fill(color(BACKGROUND));
        self.draw_image();
        if self.show_markers {
            self.draw_marker(self.layout.first_marker, self.state.first_active);
            self.draw_marker(self.layout.second_marker, self.state.second_active);
        }
        self.draw_button(Control::Feedback, self.state.feedback_visible);
        self.draw_button(Control::Continue, self.state.continuation_visible);
        // One copy of the whole canvas covers the per-element rects.
        self.dirty_regions.clear();
        if let Some(all) = rect(0.0, 0.0, self.width as f32, self.height as f32) {
            self.dirty_regions.push(all);
        }
    }

    fn draw_changes(&mut self, previous: ViewState) {
        if self.show_markers && previous.first_active != self.state.first_active {
            self.draw_marker(self.layout.first_marker, self.state.first_active);
        }
        if self.show_markers && previous.second_active != self.state.second_active {
            self.draw_marker(self.layout.second_marker, self.state.second_active);
        }
        if previous.feedback_visible != self.state.feedback_visible {
            self.draw_button(Control::Feedback, self.state.feedback_visible);
        }
        if previous.continuation_visible != self.state.continuation_visible {
            self.draw_button(Control::Continue, self.state.continuation_visible);
        }
    }

    fn draw_image(&mut self) {
        let target = self.layout.image;
        match &self.image {
            Some(image) => {
                let sx = target.width() / image.width() as f32;
                let sy = target.height() / image.height() as f32;
                let paint = PixmapPaint {
                    quality: FilterQuality::Bilinear,
                    ..PixmapPaint::default()
                };
                self.canvas.draw_pixmap(
                    0,
                    0,
                    image.as_ref(),
                    &paint,
                    Transform::from_row(sx, 0.0, 0.0, sy, target.x(), target.y()),
                    None,
                );
            }
            None => {
                self.canvas
                    .fill_rect(target, &paint(PLACEHOLDER), Transform::identity(), None);
            }
        }
    }

    fn draw_marker(&mut self, center: (f32, f32), active: bool) {
        let r = self.marker_radius;
        let Some(bounds) = rect(center.0 - r - 1.0, center.1 - r - 1.0, 2.0 * r + 2.0, 2.0 * r + 2.0)
        else {
            return;
        };
        self.canvas
            .fill_rect(bounds, &paint(BACKGROUND), Transform::identity(), None);
        if let Some(circle) = PathBuilder::from_circle(center.0, center.1, r) {
            let fill = if active { MARKER_ACTIVE } else { MARKER_INACTIVE };
            self.canvas.fill_path(
                &circle,
                &paint(fill),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
        self.dirty_regions.push(bounds);
    }

    fn draw_button(&mut self, control: Control, visible: bool) {
        let (bounds, fill, label) = match control {
            Control::Continue => (
                self.layout.continue_button,
                CONTINUE_FILL,
                self.labels.continue_label.as_ref(),
            ),
            Control::Feedback => (
                self.layout.feedback_button,
                FEEDBACK_FILL,
                self.labels.feedback_label.as_ref(),
            ),
        };
        let fill = if visible { fill } else { BACKGROUND };
        self.canvas
            .fill_rect(bounds, &paint(fill), Transform::identity(), None);

        if let (true, Some(label)) = (visible, label) {
            let x = bounds.x() + (bounds.width() - label.width() as f32) / 2.0;
            let y = bounds.y() + (bounds.height() - label.height() as f32) / 2.0;
            self.canvas.draw_pixmap(
                x.round() as i32,
                y.round() as i32,
                label.as_ref(),
                &PixmapPaint::default(),
                Transform::identity(),
                None,
            );
        }
        self.dirty_regions.push(bounds);
    }

    fn copy_dirty_region(&self, dirty: Rect, frame_buffer: &mut [u8]) {
        let (x0, y0, x1, y1) = (
            dirty.x().floor().max(0.0).min(self.width as f32) as usize,
            dirty.y().floor().max(0.0).min(self.height as f32) as usize,
            (dirty.x() + dirty.width()).ceil().min(self.width as f32) as usize,
            (dirty.y() + dirty.height()).ceil().min(self.height as f32) as usize,
        );
        if x1 <= x0 || y1 <= y0 {
            return;
        }
        let row_bytes = self.width as usize * 4;
        let canvas_data = self.canvas.data();
        for row in y0..y1 {
            let start = row * row_bytes + x0 * 4;
            let end = row * row_bytes + x1 * 4;
            frame_buffer[start..end].copy_from_slice(&canvas_data[start..end]);
        }
    }
}

impl PresentationView for SkiaView {
    fn mark_first_active(&mut self) {
        self.state.first_active = true;
    }
    fn mark_first_inactive(&mut self) {
        self.state.first_active = false;
    }
    fn mark_second_active(&mut self) {
        self.state.second_active = true;
    }
    fn mark_second_inactive(&mut self) {
        self.state.second_active = false;
    }
    fn reveal_continuation(&mut self) {
        self.state.continuation_visible = true;
    }
    fn conceal_continuation(&mut self) {
        self.state.continuation_visible = false;
    }
    fn reveal_feedback_control(&mut self) {
        self.state.feedback_visible = true;
    }
    fn conceal_feedback_control(&mut self) {
        self.state.feedback_visible = false;
    }
}

fn color([r, g, b, a]: [u8; 4]) -> Color {
    Color::from_rgba8(r, g, b, a)
}

fn paint(rgba: [u8; 4]) -> Paint<'static> {
    let mut p = Paint::default();
    p.set_color(color(rgba));
    p.anti_alias = true;
    p
}

fn rect(x: f32, y: f32, w: f32, h: f32) -> Option<Rect> {
    Rect::from_xywh(x, y, w.max(1.0), h.max(1.0))
}
