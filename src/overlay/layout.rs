/// Banner geometry
///
/// Positions are computed once per annotation and returned with the encoded
/// image, so callers (and tests) can check placement without decoding pixels.

use std::ops::Range;

use super::text::BannerFont;
use crate::state::metadata::Metadata;

/// Height of the gradient strip at the bottom of the photo
pub const BANNER_HEIGHT: u32 = 120;

/// Left margin for left-aligned lines and right margin for the `Name:` line
pub const PADDING: f32 = 20.0;

/// Distance between baselines, also the first baseline's offset from the banner top
pub const LINE_SPACING: f32 = 30.0;

/// Banner alpha at the top and bottom edges
pub const ALPHA_TOP: f32 = 0.7;
pub const ALPHA_BOTTOM: f32 = 0.9;

/// One rendered line of banner text
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    /// Left edge of the first glyph's advance box
    pub x: f32,
    /// Alphabetic baseline
    pub baseline: f32,
    /// Measured advance width
    pub width: f32,
}

impl TextLine {
    fn new(text: String, x: f32, baseline: f32, font: &BannerFont) -> Self {
        let width = font.measure(&text);
        Self { text, x, baseline, width }
    }

    /// Right edge of the advance box
    pub fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// Placement of the banner and its four text lines on a W×H surface
#[derive(Debug, Clone, PartialEq)]
pub struct BannerLayout {
    pub surface_width: u32,
    pub surface_height: u32,
    /// First banner row; negative when the photo is shorter than the banner
    pub top: i64,
    pub project: TextLine,
    pub author: TextLine,
    pub date: TextLine,
    pub location: TextLine,
}

impl BannerLayout {
    pub fn compute(width: u32, height: u32, metadata: &Metadata, font: &BannerFont) -> Self {
        let top = height as i64 - BANNER_HEIGHT as i64;
        let first = top as f32 + LINE_SPACING;

        let project = TextLine::new(
            format!("PM#: {}", metadata.project_number),
            PADDING,
            first,
            font,
        );

        let author_text = format!("Name: {}", metadata.author);
        let author_width = font.measure(&author_text);
        let author = TextLine {
            text: author_text,
            x: width as f32 - author_width - PADDING,
            baseline: first,
            width: author_width,
        };

        let date = TextLine::new(
            format!("Date: {}", metadata.display_timestamp()),
            PADDING,
            first + LINE_SPACING,
            font,
        );

        let location = TextLine::new(
            format!("Location: {}", metadata.location),
            PADDING,
            first + 2.0 * LINE_SPACING,
            font,
        );

        tracing::debug!(
            width,
            height,
            top,
            author_x = author.x,
            "computed banner layout"
        );

        Self {
            surface_width: width,
            surface_height: height,
            top,
            project,
            author,
            date,
            location,
        }
    }

    /// Lines in drawing order
    pub fn lines(&self) -> [&TextLine; 4] {
        [&self.project, &self.author, &self.date, &self.location]
    }

    /// Surface rows covered by the banner
    pub fn rows(&self) -> Range<u32> {
        self.top.max(0) as u32..self.surface_height
    }

    /// Gradient alpha for a surface row, sampled at the pixel center
    pub fn alpha_at(&self, row: u32) -> f32 {
        let t = ((row as f32 + 0.5 - self.top as f32) / BANNER_HEIGHT as f32).clamp(0.0, 1.0);
        ALPHA_TOP + (ALPHA_BOTTOM - ALPHA_TOP) * t
    }
}
