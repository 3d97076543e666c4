/// Burns the metadata banner into a photo
///
/// Pipeline for a single image:
/// 1. Decode the source once (format already sniffed at selection time)
/// 2. Composite the gradient banner over the bottom 120 rows
/// 3. Draw the four metadata lines in white
/// 4. Flatten onto black and encode as JPEG

use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage, Rgba, RgbaImage};

use super::layout::BannerLayout;
use super::text::BannerFont;
use super::AnnotateError;
use crate::state::data::{AnnotatedImage, SourceImage};
use crate::state::metadata::Metadata;

/// JPEG quality used for every export (0.9 on a 0-1 scale)
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Em size of the banner text in pixels
pub const FONT_SIZE: f32 = 24.0;

const TEXT_COLOR: [u8; 3] = [255, 255, 255];
const BANNER_COLOR: [u8; 3] = [0, 0, 0];

/// Renders annotated images. Holds the parsed font, so build one and reuse it.
pub struct Annotator {
    font: BannerFont,
    quality: u8,
}

impl Annotator {
    /// Parse the banner font and fix the JPEG quality (clamped to 1-100)
    pub fn new(quality: u8) -> Result<Self, AnnotateError> {
        Ok(Self {
            font: BannerFont::new(FONT_SIZE)?,
            quality: quality.clamp(1, 100),
        })
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Render and encode one annotated image
    ///
    /// Empty metadata fields are fine, they render as bare labels. Neither
    /// input is modified.
    pub fn annotate(
        &self,
        source: &SourceImage,
        metadata: &Metadata,
    ) -> Result<AnnotatedImage, AnnotateError> {
        let (surface, banner) = self.render(source, metadata)?;
        let bytes = self.encode(&surface)?;

        tracing::info!(
            source = source.name(),
            width = surface.width(),
            height = surface.height(),
            bytes = bytes.len(),
            "annotated image"
        );

        Ok(AnnotatedImage {
            bytes,
            width: surface.width(),
            height: surface.height(),
            banner,
        })
    }

    /// Run [`Annotator::annotate`] on the blocking pool
    ///
    /// Decoding and encoding are CPU-bound; keep them off the UI thread.
    pub async fn annotate_async(
        self: Arc<Self>,
        source: SourceImage,
        metadata: Metadata,
    ) -> Result<AnnotatedImage, AnnotateError> {
        tokio::task::spawn_blocking(move || self.annotate(&source, &metadata))
            .await
            .map_err(|e| AnnotateError::Worker(e.to_string()))?
    }

    /// Composite the banner and text onto a W×H surface, without encoding
    pub(crate) fn render(
        &self,
        source: &SourceImage,
        metadata: &Metadata,
    ) -> Result<(RgbaImage, BannerLayout), AnnotateError> {
        let decoded = image::load_from_memory_with_format(source.bytes(), source.format())
            .map_err(AnnotateError::Decode)?;

        // Surface is exactly the source size with the photo at the origin
        let mut surface = decoded.to_rgba8();
        let banner = BannerLayout::compute(surface.width(), surface.height(), metadata, &self.font);

        fill_banner(&mut surface, &banner);
        for line in banner.lines() {
            self.font.draw(&mut surface, &line.text, line.x, line.baseline, TEXT_COLOR);
        }

        Ok((surface, banner))
    }

    fn encode(&self, surface: &RgbaImage) -> Result<Vec<u8>, AnnotateError> {
        let flattened = flatten_onto_black(surface);
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, self.quality)
            .encode_image(&flattened)
            .map_err(AnnotateError::Encode)?;
        Ok(bytes)
    }
}

/// Vertical gradient, uniform across each row
fn fill_banner(surface: &mut RgbaImage, banner: &BannerLayout) {
    for y in banner.rows() {
        let alpha = banner.alpha_at(y);
        for x in 0..surface.width() {
            blend_over(surface.get_pixel_mut(x, y), BANNER_COLOR, alpha);
        }
    }
}

/// Source-over blend of a solid color with the given alpha onto `dst`
pub(super) fn blend_over(dst: &mut Rgba<u8>, color: [u8; 3], alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }

    let dst_alpha = dst.0[3] as f32 / 255.0;
    let out_alpha = alpha + dst_alpha * (1.0 - alpha);

    for channel in 0..3 {
        let src = color[channel] as f32;
        let below = dst.0[channel] as f32;
        let value = (src * alpha + below * dst_alpha * (1.0 - alpha)) / out_alpha;
        dst.0[channel] = value.round().clamp(0.0, 255.0) as u8;
    }
    dst.0[3] = (out_alpha * 255.0).round() as u8;
}

/// JPEG has no alpha channel; transparent areas end up black
fn flatten_onto_black(surface: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(surface.width(), surface.height(), |x, y| {
        let Rgba([r, g, b, a]) = *surface.get_pixel(x, y);
        let alpha = a as f32 / 255.0;
        Rgb([
            (r as f32 * alpha).round() as u8,
            (g as f32 * alpha).round() as u8,
            (b as f32 * alpha).round() as u8,
        ])
    })
}
