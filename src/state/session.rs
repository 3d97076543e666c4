/// The working set for one photo: selection, metadata and the latest render
///
/// Every input change bumps a generation counter and drops the old render.
/// Callers decide when to recompute and hand results back tagged with the
/// generation they were started from, so late results for stale inputs are
/// ignored.

use super::data::{AnnotatedImage, SourceImage};
use super::metadata::Metadata;
use crate::error::{AppError, ValidationError};
use crate::overlay::Annotator;

/// Everything needed to render the current inputs
#[derive(Debug, Clone)]
pub struct AnnotationRequest {
    pub generation: u64,
    pub source: SourceImage,
    pub metadata: Metadata,
}

#[derive(Debug, Default)]
pub struct Session {
    source: Option<SourceImage>,
    metadata: Metadata,
    generation: u64,
    annotated: Option<AnnotatedImage>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replace the selected photo
    pub fn select_image(&mut self, source: SourceImage) {
        tracing::info!(name = source.name(), mime = source.mime_type(), "selected image");
        self.source = Some(source);
        self.invalidate();
    }

    /// Drop the selected photo and anything rendered from it
    pub fn clear_image(&mut self) {
        self.source = None;
        self.invalidate();
    }

    /// Replace the metadata. Returns true if anything changed.
    pub fn set_metadata(&mut self, metadata: Metadata) -> bool {
        if metadata == self.metadata {
            return false;
        }
        self.metadata = metadata;
        self.invalidate();
        true
    }

    /// Check that a photo is selected and every field is filled
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.source.is_none() {
            return Err(ValidationError::NoImage);
        }

        let missing = self.metadata.missing_fields();
        if !missing.is_empty() {
            return Err(ValidationError::IncompleteMetadata { missing });
        }

        Ok(())
    }

    /// Snapshot of the current inputs, if a photo is selected
    pub fn request(&self) -> Option<AnnotationRequest> {
        self.source.as_ref().map(|source| AnnotationRequest {
            generation: self.generation,
            source: source.clone(),
            metadata: self.metadata.clone(),
        })
    }

    /// Store a finished render. Returns false (and drops it) if the inputs
    /// changed since the request was taken.
    pub fn accept(&mut self, generation: u64, annotated: AnnotatedImage) -> bool {
        if generation != self.generation {
            tracing::debug!(
                stale = generation,
                current = self.generation,
                "discarding stale annotation"
            );
            return false;
        }
        self.annotated = Some(annotated);
        true
    }

    /// The render for the current inputs, if one has been accepted
    pub fn annotated(&self) -> Option<&AnnotatedImage> {
        self.annotated.as_ref()
    }

    /// Render the current inputs synchronously and keep the result
    pub fn recompute(&mut self, annotator: &Annotator) -> Result<&AnnotatedImage, AppError> {
        let request = self.request().ok_or(ValidationError::NoImage)?;
        let annotated = annotator.annotate(&request.source, &request.metadata)?;
        Ok(self.annotated.insert(annotated))
    }

    fn invalidate(&mut self) {
        self.generation += 1;
        self.annotated = None;
    }
}
