//! Error types for URL synchronisation

/// Location errors
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    /// The URL could not be parsed
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
