//! # Watch Face Rendering
//!
//! This module draws one frame of the face. [`draw_face`] is a pure function of
//! its [`FrameInputs`]: it never waits for weather data and never mutates any
//! shared state, so it can run at any moment the host asks for a frame.
//!
//! ## Frame Layout
//!
//! - **Background**: solid black in ambient mode, the theme colour otherwise
//! - **Time**: always; `HH:MM:SS` when interactive, `HH:MM` in ambient mode
//! - **Date, temperatures, separator, icon**: interactive only
//!
//! The temperatures and the separator line under them are only drawn when both the high and
//! the low temperature are known. The icon is scaled to the configured square
//! with a uniform ratio (`icon_size / width`) and centred in it; the scaling is
//! local to the icon draw and never affects the text positions.
//!
//! It also provides [`Framebuffer`], an in-memory draw target used by the demo
//! host and tests, and [`draw_ascii`] for a terminal preview during development.

use crate::config::ThemeConfig;
use crate::geometry::{to_point, GeometryConfig};
use crate::icon::Icon;
use crate::{DisplayMode, WeatherSnapshot};
use chrono::{DateTime, FixedOffset};
use core::convert::Infallible;
use embedded_graphics::{
    mono_font::{iso_8859_1, MonoFont, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::Text,
};
use image::Rgba;

/// Monospace fonts available for text, ordered by glyph height
const FONTS: [&MonoFont<'static>; 8] = [
    &iso_8859_1::FONT_4X6,
    &iso_8859_1::FONT_5X8,
    &iso_8859_1::FONT_6X10,
    &iso_8859_1::FONT_6X13,
    &iso_8859_1::FONT_7X14,
    &iso_8859_1::FONT_9X15,
    &iso_8859_1::FONT_9X18,
    &iso_8859_1::FONT_10X20,
];

/// Theme colours resolved for drawing
#[derive(Clone, Debug, PartialEq)]
pub struct FaceStyle {
    pub background: Rgb888,
    pub primary_text: Rgb888,
    pub secondary_text: Rgb888,
}

impl From<&ThemeConfig> for FaceStyle {
    fn from(theme: &ThemeConfig) -> Self {
        let rgb = |c: [u8; 3]| Rgb888::new(c[0], c[1], c[2]);
        FaceStyle {
            background: rgb(theme.background),
            primary_text: rgb(theme.primary_text),
            secondary_text: rgb(theme.secondary_text),
        }
    }
}

impl Default for FaceStyle {
    fn default() -> Self {
        Self::from(&ThemeConfig::default())
    }
}

/// Everything one frame depends on
pub struct FrameInputs<'a> {
    pub mode: DisplayMode,
    pub snapshot: &'a WeatherSnapshot,
    /// `None` until the host has reported the screen shape
    pub geometry: Option<&'a GeometryConfig>,
    pub now: DateTime<FixedOffset>,
    pub style: &'a FaceStyle,
    /// False in low-bit ambient mode: no grey ramp, no filtered scaling
    pub smoothing: bool,
}

/// Largest font whose glyph height fits in `size` pixels.
pub fn font_for_size(size: f32) -> &'static MonoFont<'static> {
    FONTS
        .iter()
        .rev()
        .find(|font| font.character_size.height as f32 <= size)
        .copied()
        .unwrap_or(FONTS[0])
}

/// Time string shown for `mode`.
pub fn format_time(now: &DateTime<FixedOffset>, mode: DisplayMode) -> String {
    if mode.is_ambient() {
        now.format("%H:%M").to_string()
    } else {
        now.format("%H:%M:%S").to_string()
    }
}

/// Date string, e.g. "Mon, 15 Jan 2024".
pub fn format_date(now: &DateTime<FixedOffset>) -> String {
    now.format("%a, %d %b %Y").to_string()
}

/// Draw one frame of the face.
pub fn draw_face<D>(target: &mut D, frame: &FrameInputs<'_>) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    let default_geometry;
    let geometry = match frame.geometry {
        Some(geometry) => geometry,
        None => {
            default_geometry = GeometryConfig::default();
            &default_geometry
        }
    };
    let ambient = frame.mode.is_ambient();

    let background = if ambient {
        Rgb888::BLACK
    } else {
        frame.style.background
    };
    target.clear(background)?;

    let primary = text_colour(frame.style.primary_text, frame.smoothing);
    let secondary = text_colour(frame.style.secondary_text, frame.smoothing);

    draw_text(
        target,
        &format_time(&frame.now, frame.mode),
        geometry.time_offset,
        geometry.time_text_size,
        primary,
    )?;

    if ambient {
        return Ok(());
    }

    draw_text(
        target,
        &format_date(&frame.now),
        geometry.date_offset,
        geometry.date_text_size,
        secondary,
    )?;

    let snapshot = frame.snapshot;
    if let Some((high, low)) = snapshot.temperature_pair() {
        draw_text(
            target,
            high,
            geometry.high_offset,
            geometry.high_text_size,
            primary,
        )?;
        draw_text(
            target,
            low,
            geometry.low_offset,
            geometry.low_text_size,
            secondary,
        )?;
        let start = to_point(geometry.separator_offset);
        let end = start + Point::new(geometry.separator_length.round() as i32, 0);
        Line::new(start, end)
            .into_styled(PrimitiveStyle::with_stroke(secondary, 1))
            .draw(target)?;
    }

    if let Some(icon) = &snapshot.icon {
        draw_icon(target, icon, geometry, background, frame.smoothing)?;
    }

    Ok(())
}

fn text_colour(colour: Rgb888, smoothing: bool) -> Rgb888 {
    if smoothing {
        colour
    } else {
        Rgb888::WHITE
    }
}

fn draw_text<D>(
    target: &mut D,
    text: &str,
    offset: (f32, f32),
    size: f32,
    colour: Rgb888,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    let style = MonoTextStyle::new(font_for_size(size), colour);
    Text::new(text, to_point(offset), style).draw(target)?;
    Ok(())
}

/// Uniform scale of the icon about the centre of its square.
///
/// Only the icon draw uses this; text is positioned from the geometry directly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IconTransform {
    pub ratio: f32,
    pub area: Rectangle,
}

impl IconTransform {
    pub fn new(icon: &Icon, geometry: &GeometryConfig) -> Self {
        let size = geometry.icon_size;
        let (width, height) = icon.scaled_size(size);
        let inset = Point::new(
            (size as i32 - width as i32) / 2,
            (size as i32 - height as i32) / 2,
        );
        let top_left = to_point(geometry.icon_offset) + inset;
        IconTransform {
            ratio: icon.scale_ratio(size),
            area: Rectangle::new(top_left, Size::new(width, height)),
        }
    }
}

fn draw_icon<D>(
    target: &mut D,
    icon: &Icon,
    geometry: &GeometryConfig,
    background: Rgb888,
    smoothing: bool,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    let transform = IconTransform::new(icon, geometry);
    let scaled = icon.scaled(geometry.icon_size, smoothing);
    let origin = transform.area.top_left;

    let pixels = scaled
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[3] > 0)
        .map(|(x, y, p)| {
            Pixel(
                origin + Point::new(x as i32, y as i32),
                blend(p, background),
            )
        });
    target.draw_iter(pixels)
}

/// Composite an RGBA pixel over an opaque background.
fn blend(pixel: &Rgba<u8>, background: Rgb888) -> Rgb888 {
    let [r, g, b, a] = pixel.0;
    let mix = |fg: u8, bg: u8| -> u8 {
        let a = a as u16;
        ((fg as u16 * a + bg as u16 * (255 - a) + 127) / 255) as u8
    };
    Rgb888::new(
        mix(r, background.r()),
        mix(g, background.g()),
        mix(b, background.b()),
    )
}

/// In-memory RGB frame
#[derive(Clone, Debug, PartialEq)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    pixels: Vec<Rgb888>,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Framebuffer {
            width,
            height,
            pixels: vec![Rgb888::BLACK; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb888> {
        if x < self.width && y < self.height {
            self.pixels.get(self.index(x, y)).copied()
        } else {
            None
        }
    }

    /// Number of pixels of exactly `colour` inside `area`.
    pub fn count_in(&self, area: Rectangle, colour: Rgb888) -> usize {
        area.points()
            .filter(|p| p.x >= 0 && p.y >= 0)
            .filter_map(|p| self.pixel(p.x as u32, p.y as u32))
            .filter(|c| *c == colour)
            .count()
    }
}

impl OriginDimensions for Framebuffer {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Framebuffer {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, colour) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x < self.width && y < self.height {
                let index = self.index(x, y);
                if let Some(slot) = self.pixels.get_mut(index) {
                    *slot = colour;
                }
            }
        }
        Ok(())
    }
}

/// Render a frame to ASCII for terminal output.
///
/// Each character covers a block of pixels; blocks that differ from the
/// background (the top-left pixel) are drawn as `#`.
pub fn draw_ascii(frame: &Framebuffer, columns: u32) -> String {
    let columns = columns.clamp(1, frame.width().max(1));
    let block_w = frame.width().div_ceil(columns).max(1);
    // Terminal cells are roughly twice as tall as wide
    let block_h = block_w * 2;
    let background = frame.pixel(0, 0).unwrap_or(Rgb888::BLACK);

    let mut out = String::new();
    for by in (0..frame.height()).step_by(block_h as usize) {
        for bx in (0..frame.width()).step_by(block_w as usize) {
            let area = Rectangle::new(
                Point::new(bx as i32, by as i32),
                Size::new(block_w, block_h),
            );
            let inked = area
                .points()
                .filter_map(|p| frame.pixel(p.x as u32, p.y as u32))
                .any(|c| c != background);
            out.push(if inked { '#' } else { ' ' });
        }
        out.push('\n');
    }
    out
}
