use std::path::PathBuf;
use thiserror::Error;

use crate::config::parser::ConfigFormat;

/// Errors produced while loading an environment configuration document.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The document is not well-formed, or a value has the wrong type.
    #[error("Failed to parse {format} configuration: {message}")]
    Parse {
        format: ConfigFormat,
        message: String,
    },

    /// A required field is absent or empty, or a value breaks an invariant.
    #[error("Invalid configuration at `{field}`: {message}")]
    Validation {
        field: String,
        message: String,
    },

    #[error("No dev container configuration found under {root}")]
    NotFound { root: PathBuf },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),
}

impl ConfigError {
    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, ConfigError::Parse { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ConfigError::Validation { .. })
    }

    /// Field path of a validation failure, e.g. `mounts[1].target`.
    pub fn field(&self) -> Option<&str> {
        match self {
            ConfigError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ConfigError::validation("image", "base image is required");
        assert!(err.is_validation());
        assert!(!err.is_parse());
        assert_eq!(err.field(), Some("image"));
        assert_eq!(
            err.to_string(),
            "Invalid configuration at `image`: base image is required"
        );
    }

    #[test]
    fn test_parse_error_display() {
        let err = ConfigError::Parse {
            format: ConfigFormat::Toml,
            message: "expected `=`".to_string(),
        };
        assert!(err.is_parse());
        assert_eq!(err.field(), None);
        assert_eq!(err.to_string(), "Failed to parse TOML configuration: expected `=`");
    }
}
