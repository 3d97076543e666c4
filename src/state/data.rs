/// Shared data structures for the application state
///
/// These structs are the images that flow between the picker, the
/// overlay renderer and the upload client.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use image::ImageFormat;

use crate::error::ValidationError;
use crate::overlay::BannerLayout;

/// File extensions offered by the picker
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// The original, unmodified photo selected by the user
#[derive(Clone)]
pub struct SourceImage {
    /// Encoded file contents, shared so clones stay cheap
    bytes: Arc<[u8]>,
    /// Format sniffed from the bytes
    format: ImageFormat,
    /// File name shown in the UI and logs
    name: String,
}

impl SourceImage {
    /// Wrap encoded bytes, rejecting anything that is not JPEG, PNG or WebP
    pub fn from_bytes(bytes: Vec<u8>, name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        let format = image::guess_format(&bytes)
            .map_err(|_| ValidationError::UnsupportedFormat(name.clone()))?;

        if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP) {
            return Err(ValidationError::UnsupportedFormat(name));
        }

        Ok(Self {
            bytes: bytes.into(),
            format,
            name,
        })
    }

    /// Read a photo from disk
    pub async fn load(path: &Path) -> Result<Self, crate::error::AppError> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        Ok(Self::from_bytes(bytes, name)?)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// MIME type of the original file
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

// Byte contents stay out of logs
impl fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceImage")
            .field("name", &self.name)
            .field("format", &self.format)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A photo with the metadata banner burned in, encoded as JPEG
#[derive(Clone)]
pub struct AnnotatedImage {
    /// JPEG bytes ready to save or upload
    pub bytes: Vec<u8>,
    /// Pixel width (same as the source)
    pub width: u32,
    /// Pixel height (same as the source)
    pub height: u32,
    /// Where the banner and each text line were placed
    pub banner: BannerLayout,
}

impl fmt::Debug for AnnotatedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotatedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.bytes.len())
            .finish()
    }
}
