/// Metadata overlay rendering
///
/// This module handles:
/// - Banner geometry (layout.rs)
/// - Text measurement and glyph rasterization (text.rs)
/// - Decode, composite and JPEG encode (annotator.rs)

pub mod annotator;
pub mod layout;
pub mod text;

pub use annotator::Annotator;
pub use layout::BannerLayout;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("could not decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("could not encode JPEG: {0}")]
    Encode(#[source] image::ImageError),

    #[error("bundled font could not be parsed: {0}")]
    Font(#[from] ab_glyph::InvalidFont),

    #[error("render worker failed: {0}")]
    Worker(String),
}
