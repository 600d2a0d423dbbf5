//! Scene graph configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration shared by every node of a [`SceneContext`](crate::SceneContext)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Maximum number of keyed states kept by the object cache
    pub cache_capacity: u64,
    /// Time range used when no ancestor provides one
    pub default_time_range: TimeRangeConfig,
    /// Format applied to tokens without one
    pub default_format: String,
    /// Separator for multi-value variable text
    pub multi_value_separator: String,
}

impl SceneConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With object cache capacity
    #[inline]
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// With fallback time range
    #[inline]
    #[must_use]
    pub fn with_default_time_range(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.default_time_range = TimeRangeConfig {
            from: from.into(),
            to: to.into(),
        };
        self
    }

    /// With default format
    #[inline]
    #[must_use]
    pub fn with_default_format(mut self, format: impl Into<String>) -> Self {
        self.default_format = format.into();
        self
    }

    /// With multi-value text separator
    #[inline]
    #[must_use]
    pub fn with_multi_value_separator(mut self, separator: impl Into<String>) -> Self {
        self.multi_value_separator = separator.into();
        self
    }

    /// Parse configuration from TOML
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for out of range values
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`SceneConfig::from_toml_str`]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "cache_capacity",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.default_format.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "default_format",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1_000,
            default_time_range: TimeRangeConfig::default(),
            default_format: "glob".to_string(),
            multi_value_separator: " + ".to_string(),
        }
    }
}

/// Relative or absolute time range bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRangeConfig {
    /// Start, e.g. `now-6h`
    pub from: String,
    /// End, e.g. `now`
    pub to: String,
}

impl Default for TimeRangeConfig {
    fn default() -> Self {
        Self {
            from: "now-6h".to_string(),
            to: "now".to_string(),
        }
    }
}
