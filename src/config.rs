use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::overlay::annotator::DEFAULT_JPEG_QUALITY;
use crate::sync::upload::{REMOTE_FOLDER, UPLOAD_ENDPOINT};

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine user config directory")]
    NoConfigDir,

    #[error("failed to read config from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Dropbox `files/upload` URL
    pub endpoint: String,
    /// Remote folder exports are uploaded into
    pub folder: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: UPLOAD_ENDPOINT.into(),
            folder: REMOTE_FOLDER.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
    /// Where the CLI writes exports when no `--out` is given
    pub output_dir: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            output_dir: None,
        }
    }
}

/// User settings, read once at startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub upload: UploadConfig,
    pub export: ExportConfig,
}

impl AppConfig {
    /// `~/.config/photo-annotator/config.json` on Linux
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::config_dir()
            .or_else(dirs::home_dir)
            .ok_or(ConfigError::NoConfigDir)?;

        path.push("photo-annotator");
        path.push(CONFIG_FILE);
        Ok(path)
    }

    /// Load settings from `path`.
    ///
    /// A missing file gives the defaults. A file that doesn't parse is
    /// logged and also gives the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        match serde_json::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config");
                Ok(Self::default())
            }
        }
    }
}
