use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::error::{FailureKind, ValidationError};

/// Key the Dropbox token is stored under
pub const CREDENTIAL_KEY: &str = "dropbox_token";

const CREDENTIAL_FILE: &str = "credentials.json";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("could not determine user data directory")]
    NoDataDir,

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("credential file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl CredentialError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CredentialError::Invalid(_) => FailureKind::Validation,
            _ => FailureKind::Storage,
        }
    }
}

/// An opaque bearer token
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token, rejecting empty or whitespace-only input
    pub fn new(token: impl Into<String>) -> Result<Self, ValidationError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ValidationError::EmptyCredential);
        }
        Ok(Self(token))
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Durable storage for the upload token.
///
/// A small JSON key/value file in the user's data directory:
/// - Linux: ~/.local/share/photo-annotator/credentials.json
/// - macOS: ~/Library/Application Support/photo-annotator/credentials.json
/// - Windows: %APPDATA%\photo-annotator\credentials.json
///
/// The store is passed to whoever needs it; there is no global instance.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store backed by the given file
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the platform data directory
    pub fn open_default() -> Result<Self, CredentialError> {
        Ok(Self::open(Self::default_path()?))
    }

    pub fn default_path() -> Result<PathBuf, CredentialError> {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or(CredentialError::NoDataDir)?;

        path.push("photo-annotator");
        path.push(CREDENTIAL_FILE);
        Ok(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `token`, replacing whatever was stored before
    pub fn save(&self, token: &str) -> Result<(), CredentialError> {
        let credential = Credential::new(token)?;

        let mut entries = self.read_entries()?;
        entries.insert(CREDENTIAL_KEY.to_string(), credential.token().to_string());
        self.write_entries(&entries)?;

        tracing::info!(path = %self.path.display(), "saved upload credential");
        Ok(())
    }

    /// The stored token, or `None` if never saved or cleared
    pub fn load(&self) -> Result<Option<Credential>, CredentialError> {
        let entries = self.read_entries()?;
        Ok(entries
            .get(CREDENTIAL_KEY)
            .and_then(|token| Credential::new(token.as_str()).ok()))
    }

    /// Forget the token. Clearing an empty store is not an error.
    pub fn clear(&self) -> Result<(), CredentialError> {
        let mut entries = self.read_entries()?;
        if entries.remove(CREDENTIAL_KEY).is_none() {
            return Ok(());
        }

        if entries.is_empty() {
            fs::remove_file(&self.path).map_err(|source| self.io_error(source))?;
        } else {
            self.write_entries(&entries)?;
        }

        tracing::info!(path = %self.path.display(), "cleared upload credential");
        Ok(())
    }

    /// Whether a token is currently stored
    pub fn is_present(&self) -> bool {
        matches!(self.load(), Ok(Some(_)))
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, CredentialError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let contents = fs::read_to_string(&self.path).map_err(|source| self.io_error(source))?;
        serde_json::from_str(&contents).map_err(|source| CredentialError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Write through a sibling temp file so a crash never leaves half a token on disk
    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }

        let serialized = serde_json::to_string_pretty(entries).map_err(|source| {
            CredentialError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;

        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = create_private(&tmp).map_err(|source| self.io_error(source))?;
            file.write_all(serialized.as_bytes())
                .and_then(|_| file.sync_all())
                .map_err(|source| self.io_error(source))?;
        }
        fs::rename(&tmp, &self.path).map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> CredentialError {
        CredentialError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(unix)]
fn create_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> std::io::Result<fs::File> {
    fs::File::create(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(dir.path().join("nested").join(CREDENTIAL_FILE));
        (dir, store)
    }

    #[test]
    fn test_load_without_save_is_absent() {
        let (_dir, store) = store();
        assert!(store.load().unwrap().is_none());
        assert!(!store.is_present());
    }

    #[test]
    fn test_save_then_load_returns_token() {
        let (_dir, store) = store();
        let token = "sl.u.AF5j7-P9_x/+=?&\"quoted\" ünïcødé 🔑";
        store.save(token).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.token(), token);
        assert!(store.is_present());
    }

    #[test]
    fn test_save_overwrites() {
        let (_dir, store) = store();
        store.save("first").unwrap();
        store.save("second").unwrap();
        assert_eq!(store.load().unwrap().unwrap().token(), "second");
    }

    #[test]
    fn test_clear_then_load_is_absent() {
        let (_dir, store) = store();
        store.save("token").unwrap();
        store.clear().unwrap();

        assert!(store.load().unwrap().is_none());
        assert!(!store.path().exists());

        // clearing again is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_empty_token_is_rejected() {
        let (_dir, store) = store();
        let err = store.save("   ").unwrap_err();
        assert_eq!(err.kind(), FailureKind::Validation);
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_survives_new_instance() {
        let (_dir, store) = store();
        store.save("persisted").unwrap();

        let reopened = CredentialStore::open(store.path());
        assert_eq!(reopened.load().unwrap().unwrap().token(), "persisted");
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let (_dir, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{not json").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, CredentialError::Corrupt { .. }));
    }

    #[test]
    fn test_debug_redacts_token() {
        let credential = Credential::new("secret-token").unwrap();
        assert_eq!(format!("{credential:?}"), "Credential(***)");
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, store) = store();
        store.save("token").unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
