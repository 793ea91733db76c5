use crate::draw::fade::{FadeOutcome, FadeSettings};
use crate::draw::input::InkInputState;
use crate::draw::model::{Point, StrokeStyle, FULL_ALPHA};
use std::time::Instant;

/// Drawing backend for one overlay frame.
pub trait InkPainter {
    /// Reset the whole surface to fully transparent.
    fn clear(&mut self);

    /// Draw an open polyline, no fill, at the given opacity.
    fn polyline(&mut self, points: &[Point], style: StrokeStyle, alpha: u8);
}

pub fn alpha_to_u8(alpha: f32) -> u8 {
    alpha.round().clamp(0.0, 255.0) as u8
}

/// Paints one frame: clear, fade, committed history, then the live gesture.
pub fn render_frame<P: InkPainter + ?Sized>(
    state: &mut InkInputState,
    painter: &mut P,
    style: StrokeStyle,
    fade: FadeSettings,
    now: Instant,
) -> FadeOutcome {
    painter.clear();
    let outcome = state.apply_fade(now, fade);

    let history_alpha = alpha_to_u8(state.global_alpha());
    for stroke in state.strokes() {
        if stroke.is_drawable() {
            painter.polyline(stroke.points(), style, history_alpha);
        }
    }

    if let Some(current) = state.current_stroke() {
        if current.is_drawable() {
            painter.polyline(current.points(), style, FULL_ALPHA);
        }
    }

    outcome
}

/// Far beyond any display; keeps rect extents well inside `i32`.
const COORD_LIMIT: f32 = 1.0e8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl DirtyRect {
    pub fn around_points(points: &[Point], pad: f32) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for point in &points[1..] {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }
        let bound = |value: f32| value.clamp(-COORD_LIMIT, COORD_LIMIT);
        let x0 = bound((min_x - pad).floor()) as i32;
        let y0 = bound((min_y - pad).floor()) as i32;
        let x1 = bound((max_x + pad).ceil()) as i32;
        let y1 = bound((max_y + pad).ceil()) as i32;
        Some(Self {
            x: x0,
            y: y0,
            width: x1.saturating_sub(x0).saturating_add(1).max(1),
            height: y1.saturating_sub(y0).saturating_add(1).max(1),
        })
    }

    pub fn clamp(self, width: u32, height: u32) -> Option<DirtyRect> {
        let max_w = width as i32;
        let max_h = height as i32;
        let x0 = self.x.clamp(0, max_w);
        let y0 = self.y.clamp(0, max_h);
        let x1 = (self.x.saturating_add(self.width)).clamp(0, max_w);
        let y1 = (self.y.saturating_add(self.height)).clamp(0, max_h);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(DirtyRect {
            x: x0,
            y: y0,
            width: x1.saturating_sub(x0),
            height: y1.saturating_sub(y0),
        })
    }

    fn rows(self) -> std::ops::Range<i32> {
        self.y..self.y.saturating_add(self.height)
    }

    fn cols(self) -> std::ops::Range<i32> {
        self.x..self.x.saturating_add(self.width)
    }
}

/// Software raster target in straight (non-premultiplied) RGBA.
#[derive(Debug, Default)]
pub struct RenderFrameBuffer {
    rgba: Vec<u8>,
    coverage: Vec<bool>,
    size: (u32, u32),
    #[cfg(test)]
    allocation_count: usize,
}

impl RenderFrameBuffer {
    pub fn new(size: (u32, u32)) -> Self {
        let mut buffer = Self::default();
        buffer.ensure_size(size);
        buffer
    }

    /// Reallocates when the viewport changed; returns whether it did.
    pub fn ensure_size(&mut self, size: (u32, u32)) -> bool {
        let pixel_count = (size.0 as usize).saturating_mul(size.1 as usize);
        let resized = self.size != size || self.coverage.len() != pixel_count;
        if resized {
            self.rgba = vec![0; pixel_count.saturating_mul(4)];
            self.coverage = vec![false; pixel_count];
            self.size = size;
            #[cfg(test)]
            {
                self.allocation_count += 1;
            }
        }
        resized
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn rgba_pixels(&self) -> &[u8] {
        &self.rgba
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.size.0 || y >= self.size.1 {
            return None;
        }
        let idx = ((y as usize) * (self.size.0 as usize) + x as usize) * 4;
        let px = self.rgba.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    pub fn is_blank(&self) -> bool {
        self.rgba.chunks_exact(4).all(|px| px[3] == 0)
    }

    /// Fills `dib_bgra` for a per-pixel-alpha layered window.
    pub fn to_premultiplied_bgra(&self, dib_bgra: &mut [u8]) {
        convert_rgba_to_premultiplied_bgra(&self.rgba, dib_bgra);
    }

    #[cfg(test)]
    pub fn allocation_count(&self) -> usize {
        self.allocation_count
    }

    fn mark_segment(&mut self, start: Point, end: Point, radius: f32, clip: DirtyRect) {
        let Some(bounds) = DirtyRect::around_points(&[start, end], radius + 1.0)
            .and_then(|rect| intersect_dirty_rect(rect, clip))
        else {
            return;
        };
        let radius_sq = radius * radius;
        let width = self.size.0 as usize;
        for y in bounds.rows() {
            for x in bounds.cols() {
                let center = Point::new(x as f32 + 0.5, y as f32 + 0.5);
                if point_segment_distance_sq(center, start, end) <= radius_sq {
                    self.coverage[(y as usize) * width + x as usize] = true;
                }
            }
        }
    }
}

impl InkPainter for RenderFrameBuffer {
    fn clear(&mut self) {
        self.rgba.fill(0);
    }

    fn polyline(&mut self, points: &[Point], style: StrokeStyle, alpha: u8) {
        if points.len() < 2 || alpha == 0 {
            return;
        }
        let radius = (style.width.max(1) as f32) / 2.0;
        let Some(clip) = DirtyRect::around_points(points, radius + 1.0)
            .and_then(|rect| rect.clamp(self.size.0, self.size.1))
        else {
            return;
        };

        // Mark first, blend once: joints shared by two segments must not get
        // composited twice.
        for segment in points.windows(2) {
            self.mark_segment(segment[0], segment[1], radius, clip);
        }

        let source_alpha = (u32::from(style.color.a) * u32::from(alpha) + 127) / 255;
        let color = style.color.with_alpha(source_alpha as u8);
        let width = self.size.0 as usize;
        for y in clip.rows() {
            for x in clip.cols() {
                let slot = (y as usize) * width + x as usize;
                if std::mem::take(&mut self.coverage[slot]) {
                    blend_over(&mut self.rgba[slot * 4..slot * 4 + 4], color);
                }
            }
        }
    }
}

fn blend_over(dst: &mut [u8], src: crate::draw::model::Color) {
    let sa = f32::from(src.a) / 255.0;
    if sa <= 0.0 {
        return;
    }
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    let mix = |s: u8, d: u8| -> u8 {
        let value = (f32::from(s) * sa + f32::from(d) * da * (1.0 - sa)) / out_a;
        value.round().clamp(0.0, 255.0) as u8
    };
    dst[0] = mix(src.r, dst[0]);
    dst[1] = mix(src.g, dst[1]);
    dst[2] = mix(src.b, dst[2]);
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

pub fn convert_rgba_to_premultiplied_bgra(rgba: &[u8], dib_bgra: &mut [u8]) {
    debug_assert_eq!(rgba.len(), dib_bgra.len());
    for (src, dst) in rgba.chunks_exact(4).zip(dib_bgra.chunks_exact_mut(4)) {
        let a = u32::from(src[3]);
        if a == 0 {
            dst.copy_from_slice(&[0, 0, 0, 0]);
            continue;
        }
        let premultiply = |c: u8| ((u32::from(c) * a + 127) / 255) as u8;
        dst[0] = premultiply(src[2]);
        dst[1] = premultiply(src[1]);
        dst[2] = premultiply(src[0]);
        dst[3] = src[3];
    }
}

fn intersect_dirty_rect(a: DirtyRect, b: DirtyRect) -> Option<DirtyRect> {
    let x0 = a.x.max(b.x);
    let y0 = a.y.max(b.y);
    let x1 = a.x.saturating_add(a.width).min(b.x.saturating_add(b.width));
    let y1 = a.y.saturating_add(a.height).min(b.y.saturating_add(b.height));
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(DirtyRect {
        x: x0,
        y: y0,
        width: x1.saturating_sub(x0),
        height: y1.saturating_sub(y0),
    })
}

fn point_segment_distance_sq(point: Point, start: Point, end: Point) -> f32 {
    let vx = end.x - start.x;
    let vy = end.y - start.y;
    let wx = point.x - start.x;
    let wy = point.y - start.y;
    let len_sq = vx * vx + vy * vy;
    if len_sq <= f32::EPSILON {
        return wx * wx + wy * wy;
    }
    let t = ((wx * vx + wy * vy) / len_sq).clamp(0.0, 1.0);
    let dx = point.x - (start.x + vx * t);
    let dy = point.y - (start.y + vy * t);
    dx * dx + dy * dy
}
