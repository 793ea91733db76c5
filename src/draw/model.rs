use serde::{Deserialize, Serialize};

pub const FULL_ALPHA: u8 = 255;

/// Primary ink color (#BBDAF7).
pub const DEFAULT_INK_COLOR: Color = Color::rgba(187, 218, 247, FULL_ALPHA);
pub const DEFAULT_INK_WIDTH: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrokeStyle {
    pub width: u32,
    pub color: Color,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            width: DEFAULT_INK_WIDTH,
            color: DEFAULT_INK_COLOR,
        }
    }
}

/// Recorded point sequence of one gesture.
///
/// Points are only ever appended while the gesture is in progress; once the
/// stroke is committed it is not touched again.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    points: Vec<Point>,
}

impl Stroke {
    pub fn begin(start: Point) -> Self {
        Self {
            points: vec![start],
        }
    }

    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Fewer than two points never produce a visible line.
    pub fn is_drawable(&self) -> bool {
        self.points.len() >= 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_point_stroke_is_not_drawable() {
        let mut stroke = Stroke::begin(Point::new(1.0, 2.0));
        assert!(!stroke.is_drawable());
        stroke.push(Point::new(3.0, 4.0));
        assert!(stroke.is_drawable());
        assert_eq!(stroke.point_count(), 2);
    }

    #[test]
    fn default_style_matches_primary_ink() {
        let style = StrokeStyle::default();
        assert_eq!(style.color, Color::rgba(187, 218, 247, 255));
        assert_eq!(style.width, 16);
    }
}
