use thiserror::Error;

use crate::config::ConfigError;
use crate::overlay::AnnotateError;
use crate::state::credentials::CredentialError;
use crate::sync::UploadError;

/// How a failure is reported back to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Missing input; the action never started
    Validation,
    /// The server answered with an error
    Upload,
    /// No usable answer from the server
    Connectivity,
    /// Decoding, drawing or encoding failed
    Render,
    /// Local files (credentials, config, exports)
    Storage,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Please select an image first")]
    NoImage,

    #[error("Please fill in: {}", .missing.join(", "))]
    IncompleteMetadata { missing: Vec<&'static str> },

    #[error("Please enter a valid Dropbox access token")]
    EmptyCredential,

    #[error("Please connect to Dropbox first")]
    NotConnected,

    #[error("{0} is not a JPEG, PNG or WebP image")]
    UnsupportedFormat(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Annotate(#[from] AnnotateError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GUI error: {0}")]
    Gui(#[from] iced::Error),
}

impl AppError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AppError::Validation(_) => FailureKind::Validation,
            AppError::Annotate(_) => FailureKind::Render,
            AppError::Upload(e) => e.kind(),
            AppError::Credential(e) => e.kind(),
            AppError::Config(_) | AppError::Io(_) | AppError::Gui(_) => FailureKind::Storage,
        }
    }
}

/// A user-facing message, cheap to pass through GUI messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&AppError> for Notice {
    fn from(error: &AppError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl From<AppError> for Notice {
    fn from(error: AppError) -> Self {
        Notice::from(&error)
    }
}
