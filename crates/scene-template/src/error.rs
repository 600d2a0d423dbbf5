//! Error types for the template system

/// Errors raised by the format registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// A formatter with this id is already registered
    #[error("format already registered: '{0}'")]
    Duplicate(String),

    /// No formatter registered under this id
    #[error("unknown format: '{0}'")]
    Unknown(String),
}

impl FormatError {
    /// Unknown formats degrade to `glob` during interpolation
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }
}
