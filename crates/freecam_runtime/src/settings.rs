// SPDX-License-Identifier: MIT OR Apache-2.0
//! Framework settings.

use freecam_sequencer::DocumentFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current settings file format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Default settings file name
pub const SETTINGS_FILE_NAME: &str = "freecam.ron";

/// Framework-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkSettings {
    /// Format version
    pub version: u32,
    /// Root for relative timeline file paths
    pub data_dir: PathBuf,
    /// Document format for paths without a known extension
    pub default_format: DocumentFormat,
    /// Default tracing filter directive
    pub log_filter: String,
}

impl Default for FrameworkSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            data_dir: PathBuf::from("Data"),
            default_format: DocumentFormat::Ron,
            log_filter: "info".to_string(),
        }
    }
}

/// Why a settings file could not be used
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// File could not be read or written
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// Settings file
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// File is not valid settings RON
    #[error("malformed settings in {}: {source}", .path.display())]
    Parse {
        /// Settings file
        path: PathBuf,
        /// Parser error with position
        source: ron::error::SpannedError,
    },
    /// Settings could not be rendered
    #[error("failed to render settings: {0}")]
    Render(#[from] ron::Error),
    /// Written by a newer build
    #[error("settings version {found} is newer than supported version {}", SETTINGS_FORMAT_VERSION)]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
    },
}

impl FrameworkSettings {
    /// Read and version-check a settings file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = ron::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(SettingsError::UnsupportedVersion {
                found: settings.version,
            });
        }
        tracing::debug!(
            "Loaded settings from {} (data dir {})",
            path.display(),
            settings.data_dir.display()
        );
        Ok(settings)
    }

    /// Load settings from `path`, or defaults when it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!("No settings at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Write the settings as named-struct RON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let io_error = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };
        let pretty = ron::ser::PrettyConfig::new().struct_names(true);
        let text = ron::ser::to_string_pretty(self, pretty)?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        std::fs::write(path, text).map_err(io_error)?;
        tracing::info!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Resolve a timeline path against the data directory
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }
}
