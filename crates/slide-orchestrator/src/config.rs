//! Configuration for the slide editor orchestration layer.
//!
//! Values are read from `slide-editor.json`. Every field has a default, so a
//! missing file or a partial file is valid.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use slide_store::{StoreDefaults, ViewMode};

use crate::error::{EditorError, Result};

/// The default config file name.
pub const CONFIG_FILE_NAME: &str = "slide-editor.json";

/// Default AI-edit endpoint.
fn default_edit_endpoint() -> String {
    "http://localhost:3000/api/slides/edit".to_string()
}

/// Default maximum number of edit requests in flight per batch.
const fn default_max_concurrency() -> usize {
    3
}

/// Default per-request timeout in seconds.
const fn default_request_timeout_secs() -> u64 {
    60
}

/// Default number of undo entries kept.
const fn default_history_depth() -> usize {
    slide_history::DEFAULT_MAX_DEPTH
}

/// Default per-subscriber progress event buffer.
const fn default_progress_buffer_size() -> usize {
    100
}

/// Editor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// URL of the per-slide AI-edit endpoint.
    #[serde(default = "default_edit_endpoint")]
    pub edit_endpoint: String,

    /// Maximum number of edit requests in flight per batch.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Transport timeout for one edit request, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Number of undo entries kept per editing session.
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,

    /// Progress events buffered per subscriber before it lags.
    #[serde(default = "default_progress_buffer_size")]
    pub progress_buffer_size: usize,

    /// View mode the store starts in and resets to.
    #[serde(default)]
    pub default_view_mode: ViewMode,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            edit_endpoint: default_edit_endpoint(),
            max_concurrency: default_max_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
            history_depth: default_history_depth(),
            progress_buffer_size: default_progress_buffer_size(),
            default_view_mode: ViewMode::default(),
        }
    }
}

impl EditorConfig {
    /// Loads configuration from the current working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is invalid.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            EditorError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads `slide-editor.json` from a specific directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::ConfigParseError` if the file cannot be read or
    /// parsed, and `EditorError::ConfigValidationError` if a value is out of
    /// range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(EditorError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| EditorError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::ConfigValidationError` on the first bad value.
    pub fn validate(&self) -> Result<()> {
        if self.edit_endpoint.trim().is_empty() {
            return Err(EditorError::config_validation(
                "editEndpoint must not be empty",
                "Set editEndpoint to the URL of the slide edit service in your slide-editor.json",
            ));
        }

        if self.max_concurrency == 0 {
            return Err(EditorError::config_validation(
                "maxConcurrency must be greater than 0",
                "Set maxConcurrency to at least 1 in your slide-editor.json",
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(EditorError::config_validation(
                "requestTimeoutSecs must be greater than 0",
                "Set requestTimeoutSecs to at least 1 second in your slide-editor.json",
            ));
        }

        if self.history_depth == 0 {
            return Err(EditorError::config_validation(
                "historyDepth must be greater than 0",
                "Set historyDepth to at least 1 in your slide-editor.json",
            ));
        }

        if self.progress_buffer_size == 0 {
            return Err(EditorError::config_validation(
                "progressBufferSize must be greater than 0",
                "Set progressBufferSize to at least 1 in your slide-editor.json",
            ));
        }

        Ok(())
    }

    /// Returns the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Returns the store defaults derived from this configuration.
    #[must_use]
    pub const fn store_defaults(&self) -> StoreDefaults {
        StoreDefaults {
            view_mode: self.default_view_mode,
        }
    }
}
