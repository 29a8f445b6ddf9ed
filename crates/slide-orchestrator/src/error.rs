//! Error types for the slide editor orchestration layer.
//!
//! [`EditorError`] covers failures that stop an operation before it starts
//! (configuration, batch preconditions, client construction). Per-slide edit
//! failures are data, not errors: they are recorded as [`EditFailure`] values
//! on the batch and never abort it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A specialized `Result` type for orchestration operations.
pub type Result<T> = std::result::Result<T, EditorError>;

/// Errors that can occur while configuring the editor or starting a batch.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your slide-editor.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Batch Preconditions
    // ========================================================================
    /// The edit instruction was empty or whitespace.
    #[error("Edit instruction is empty\n\nSuggestion: Describe the change to make, e.g. \"make all titles bigger\"")]
    EmptyInstruction,

    /// No slides were targeted.
    #[error("No slides selected for editing\n\nSuggestion: Select at least one slide or load a lesson that has slides")]
    NoTargetSlides,

    /// The same slide was targeted twice in one batch.
    #[error("Slide '{slide_id}' is targeted more than once\n\nSuggestion: Remove duplicate slide ids from the selection")]
    DuplicateTarget {
        /// The repeated slide id.
        slide_id: String,
    },

    // ========================================================================
    // Transport Setup
    // ========================================================================
    /// The HTTP client could not be built.
    #[error("Failed to create HTTP client: {0}\n\nSuggestion: Check the TLS configuration of this machine")]
    HttpClient(#[from] reqwest::Error),

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EditorError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `DuplicateTarget` error.
    #[must_use]
    pub fn duplicate_target(slide_id: impl Into<String>) -> Self {
        Self::DuplicateTarget {
            slide_id: slide_id.into(),
        }
    }

    /// Returns `true` if this error is a rejected batch precondition.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::EmptyInstruction | Self::NoTargetSlides | Self::DuplicateTarget { .. }
        )
    }

    /// Returns `true` if this error comes from configuration.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. } | Self::ConfigValidationError { .. }
        )
    }
}

// ============================================================================
// Per-slide failures
// ============================================================================

/// Categories of per-slide edit failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditFailureKind {
    /// The endpoint could not be reached.
    Network,
    /// The request exceeded the transport timeout.
    Timeout,
    /// The endpoint rejected the request for rate limiting.
    RateLimit,
    /// The endpoint reported a failure.
    Endpoint,
    /// The response could not be interpreted.
    MalformedResponse,
    /// The slide was removed from the lesson before the edit landed.
    SlideMissing,
}

impl std::fmt::Display for EditFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Timeout => write!(f, "timeout"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Endpoint => write!(f, "endpoint"),
            Self::MalformedResponse => write!(f, "malformed_response"),
            Self::SlideMissing => write!(f, "slide_missing"),
        }
    }
}

impl EditFailureKind {
    /// Returns a suggestion message for this failure kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Network => "Check your network connection and the edit endpoint URL",
            Self::Timeout => "Retry the slide, or raise requestTimeoutSecs",
            Self::RateLimit => "Wait and retry, or lower maxConcurrency",
            Self::Endpoint => "Retry later; the edit service may be experiencing issues",
            Self::MalformedResponse => "Retry the slide; the edit service returned unusable markup",
            Self::SlideMissing => "The slide was deleted while the edit was running",
        }
    }

    /// Returns `true` if retrying the same slide may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RateLimit | Self::Endpoint
        )
    }
}

/// Why one slide's edit failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct EditFailure {
    /// Failure category.
    pub kind: EditFailureKind,
    /// Human-readable message.
    pub message: String,
}

impl EditFailure {
    /// Creates a failure of the given kind.
    #[must_use]
    pub fn new(kind: EditFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a `Network` failure.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(EditFailureKind::Network, message)
    }

    /// Creates a `Timeout` failure.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(EditFailureKind::Timeout, message)
    }

    /// Creates a failure from an endpoint-reported error, classifying rate
    /// limiting from the message text.
    #[must_use]
    pub fn endpoint(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        let kind = if lower.contains("rate limit") || lower.contains("too many requests") {
            EditFailureKind::RateLimit
        } else {
            EditFailureKind::Endpoint
        };
        Self::new(kind, message)
    }

    /// Creates a `MalformedResponse` failure.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(EditFailureKind::MalformedResponse, message)
    }

    /// Creates a `SlideMissing` failure for the given slide.
    #[must_use]
    pub fn slide_missing(slide_id: &str) -> Self {
        Self::new(
            EditFailureKind::SlideMissing,
            format!("slide '{slide_id}' no longer exists in the lesson"),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = EditorError::duplicate_target("s2");
        let msg = err.to_string();
        assert!(msg.contains("'s2'"));
        assert!(msg.contains("Suggestion"));
    }

    #[test]
    fn test_is_precondition() {
        assert!(EditorError::EmptyInstruction.is_precondition());
        assert!(EditorError::NoTargetSlides.is_precondition());
        assert!(EditorError::duplicate_target("a").is_precondition());

        let config = EditorError::config_validation("bad", "fix it");
        assert!(!config.is_precondition());
        assert!(config.is_config());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: EditorError = io_err.into();
        assert!(matches!(err, EditorError::Io(_)));
    }

    #[test]
    fn test_failure_kind_display() {
        assert_eq!(EditFailureKind::RateLimit.to_string(), "rate_limit");
        assert_eq!(
            EditFailureKind::MalformedResponse.to_string(),
            "malformed_response"
        );
    }

    #[test]
    fn test_endpoint_classifies_rate_limit() {
        assert_eq!(
            EditFailure::endpoint("rate limited").kind,
            EditFailureKind::RateLimit
        );
        assert_eq!(
            EditFailure::endpoint("Too Many Requests").kind,
            EditFailureKind::RateLimit
        );
        assert_eq!(
            EditFailure::endpoint("model overloaded").kind,
            EditFailureKind::Endpoint
        );
    }

    #[test]
    fn test_is_transient() {
        assert!(EditFailureKind::RateLimit.is_transient());
        assert!(EditFailureKind::Timeout.is_transient());
        assert!(!EditFailureKind::MalformedResponse.is_transient());
        assert!(!EditFailureKind::SlideMissing.is_transient());
    }

    #[test]
    fn test_failure_displays_message_only() {
        let failure = EditFailure::slide_missing("s9");
        assert_eq!(failure.to_string(), "slide 's9' no longer exists in the lesson");

        let json = serde_json::to_string(&failure).unwrap();
        assert!(json.contains(r#""kind":"slide_missing""#));
    }
}
