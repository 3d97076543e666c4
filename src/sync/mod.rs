//! Remote storage sync.

pub mod upload;

pub use upload::{UploadClient, UploadError, UploadedFile};
