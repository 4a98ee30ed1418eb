//! Screen geometry resolved from the layout configuration.
//!
//! The host reports the screen shape once through its inset callback. The shape
//! picks between the round and rectangular variants of the layout; the result is
//! an immutable [`GeometryConfig`] shared read-only with the renderer.

use crate::config::LayoutConfig;
use embedded_graphics::prelude::Point;

/// Physical outline of the display
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScreenShape {
    Round,
    Rectangular,
}

/// Resolved offsets and sizes for one screen shape.
///
/// Offsets are text baselines (x, y) like a canvas `drawText` call; the icon
/// offset is the top-left corner of the square the icon is fitted into.
#[derive(Clone, Debug, PartialEq)]
pub struct GeometryConfig {
    pub shape: ScreenShape,
    pub time_offset: (f32, f32),
    pub time_text_size: f32,
    pub date_offset: (f32, f32),
    pub date_text_size: f32,
    pub separator_offset: (f32, f32),
    pub separator_length: f32,
    pub icon_offset: (f32, f32),
    pub icon_size: u32,
    pub high_offset: (f32, f32),
    pub high_text_size: f32,
    pub low_offset: (f32, f32),
    pub low_text_size: f32,
}

impl GeometryConfig {
    /// Resolve the layout for `shape`.
    pub fn resolve(shape: ScreenShape, layout: &LayoutConfig) -> Self {
        let round = shape == ScreenShape::Round;
        GeometryConfig {
            shape,
            time_offset: (
                if round {
                    layout.time_x_offset_round
                } else {
                    layout.time_x_offset
                },
                layout.time_y_offset,
            ),
            time_text_size: if round {
                layout.time_text_size_round
            } else {
                layout.time_text_size
            },
            date_offset: (layout.date_x_offset, layout.date_y_offset),
            date_text_size: layout.date_text_size,
            separator_offset: (layout.separator_x_offset, layout.separator_y_offset),
            separator_length: layout.separator_length,
            icon_offset: (layout.icon_x_offset, layout.icon_y_offset),
            icon_size: layout.icon_size,
            high_offset: (layout.high_x_offset, layout.high_y_offset),
            high_text_size: layout.high_text_size,
            low_offset: (layout.low_x_offset, layout.low_y_offset),
            low_text_size: layout.low_text_size,
        }
    }
}

impl Default for GeometryConfig {
    /// Rectangular layout with default offsets, used when drawing is requested
    /// before the host has reported the screen shape.
    fn default() -> Self {
        Self::resolve(ScreenShape::Rectangular, &LayoutConfig::default())
    }
}

/// Round an offset pair to a pixel position.
pub fn to_point(offset: (f32, f32)) -> Point {
    Point::new(offset.0.round() as i32, offset.1.round() as i32)
}
