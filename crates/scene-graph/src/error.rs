//! Error types for the scene graph
//!
//! Provides error handling for:
//! - Missing required ancestors (layout, editor)
//! - Reserved slots assigned something other than a node
//! - Configuration loading
//! - Scene document loading and export

use std::path::PathBuf;

/// Main scene graph error type
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// A required ancestor is missing
    #[error("structural error: {0}")]
    Structural(#[from] StructuralError),

    /// A state change would break a graph invariant
    #[error("invariant violation on '{key}': field '{field}' {reason}")]
    InvariantViolation {
        /// Key of the node being changed
        key: String,
        /// Offending field
        field: String,
        /// What is wrong
        reason: String,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Scene document error
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// A value cannot be represented as JSON
    #[error("value is not serializable: {0}")]
    NotSerializable(String),
}

impl SceneError {
    /// Create an invariant violation error
    #[inline]
    pub fn invariant(key: impl Into<String>, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            key: key.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error comes from graph shape rather than bad input
    #[inline]
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Structural(_))
    }
}

/// Graph shape errors returned by traversal
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    /// No ancestor (inclusive) provides the requested service
    #[error("unable to find {service} for node '{key}'")]
    MissingAncestor {
        /// Requested service, e.g. `layout`
        service: &'static str,
        /// Key of the node the search started from
        key: String,
    },
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading the config file failed
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The TOML was invalid
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid value for '{field}': {reason}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// What is wrong
        reason: String,
    },
}

/// Scene document errors
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Reading the document failed
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Invalid JSON document
    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid TOML document
    #[error("invalid TOML document: {0}")]
    Toml(#[from] toml::de::Error),

    /// Exporting to TOML failed
    #[error("cannot write TOML document: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    /// File extension is neither `.json` nor `.toml`
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// Document describes an invalid tree
    #[error("invalid document: {0}")]
    Invalid(String),
}

/// Result alias for scene graph operations
pub type SceneResult<T> = Result<T, SceneError>;
