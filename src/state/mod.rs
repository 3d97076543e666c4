/// State management module
///
/// This module handles all application state, including:
/// - The metadata typed into the form (metadata.rs)
/// - Selected and rendered images (data.rs)
/// - The per-photo working set and its generation counter (session.rs)
/// - The persisted upload credential (credentials.rs)

pub mod credentials;
pub mod data;
pub mod metadata;
pub mod session;
