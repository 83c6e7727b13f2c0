use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::core::{ConfigError, ConfigResult};

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    JsonC, // JSON with comments
    Json5,
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// Pick a format from the file extension. Dev container documents are
    /// JSON with comments unless stated otherwise, so unknown extensions
    /// fall back to that.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => ConfigFormat::Json,
            Some("json5") => ConfigFormat::Json5,
            Some("toml") => ConfigFormat::Toml,
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::JsonC,
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFormat::Json => write!(f, "JSON"),
            ConfigFormat::JsonC => write!(f, "JSONC"),
            ConfigFormat::Json5 => write!(f, "JSON5"),
            ConfigFormat::Toml => write!(f, "TOML"),
            ConfigFormat::Yaml => write!(f, "YAML"),
        }
    }
}

impl FromStr for ConfigFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ConfigFormat::Json),
            "jsonc" => Ok(ConfigFormat::JsonC),
            "json5" => Ok(ConfigFormat::Json5),
            "toml" => Ok(ConfigFormat::Toml),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            other => Err(format!("unsupported configuration format: {other}")),
        }
    }
}

/// Configuration parsing options
#[derive(Debug, Clone)]
pub struct ConfigParserOptions {
    pub format: ConfigFormat,
    /// Accept comments and trailing commas in `.json` documents.
    pub allow_comments: bool,
}

impl Default for ConfigParserOptions {
    fn default() -> Self {
        Self {
            format: ConfigFormat::Json,
            allow_comments: true,
        }
    }
}

/// Format-dispatching parser shared by the loader and the CLI
pub struct ConfigParser;

impl ConfigParser {
    /// Parse configuration from a string
    pub fn parse_str<T>(content: &str, options: &ConfigParserOptions) -> ConfigResult<T>
    where
        T: DeserializeOwned,
    {
        let format = options.format;
        let parse_error = |message: String| ConfigError::Parse { format, message };

        match format {
            ConfigFormat::Json if !options.allow_comments => {
                serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))
            }
            ConfigFormat::Json | ConfigFormat::JsonC | ConfigFormat::Json5 => {
                json5::from_str(content).map_err(|e| parse_error(e.to_string()))
            }
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
            ConfigFormat::Yaml => {
                serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))
            }
        }
    }

    /// Render a value in the given format. JSON variants are emitted as
    /// plain pretty-printed JSON.
    pub fn to_string<T>(value: &T, format: ConfigFormat) -> ConfigResult<String>
    where
        T: Serialize,
    {
        match format {
            ConfigFormat::Json | ConfigFormat::JsonC | ConfigFormat::Json5 => {
                serde_json::to_string_pretty(value)
                    .map_err(|e| ConfigError::Serialize(e.to_string()))
            }
            ConfigFormat::Toml => {
                toml::to_string_pretty(value).map_err(|e| ConfigError::Serialize(e.to_string()))
            }
            ConfigFormat::Yaml => {
                serde_yaml::to_string(value).map_err(|e| ConfigError::Serialize(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::{Deserialize, Serialize};
    use test_case::test_case;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestConfig {
        name: String,
        version: u32,
        enabled: bool,
    }

    fn expected() -> TestConfig {
        TestConfig {
            name: "test".to_string(),
            version: 1,
            enabled: true,
        }
    }

    fn options(format: ConfigFormat) -> ConfigParserOptions {
        ConfigParserOptions {
            format,
            ..Default::default()
        }
    }

    #[test_case(ConfigFormat::Json, r#"{"name": "test", "version": 1, "enabled": true}"# ; "json")]
    #[test_case(ConfigFormat::JsonC, "{\n  // comment\n  \"name\": \"test\",\n  \"version\": 1,\n  \"enabled\": true,\n}" ; "jsonc")]
    #[test_case(ConfigFormat::Toml, "name = \"test\"\nversion = 1\nenabled = true\n" ; "toml")]
    #[test_case(ConfigFormat::Yaml, "name: test\nversion: 1\nenabled: true\n" ; "yaml")]
    fn test_parse_formats(format: ConfigFormat, content: &str) {
        let config: TestConfig = ConfigParser::parse_str(content, &options(format)).unwrap();
        assert_eq!(config, expected());
    }

    #[test]
    fn test_strict_json_rejects_comments() {
        let content = "{ // comment\n \"name\": \"test\", \"version\": 1, \"enabled\": true }";
        let opts = ConfigParserOptions {
            format: ConfigFormat::Json,
            allow_comments: false,
        };
        let err = ConfigParser::parse_str::<TestConfig>(content, &opts).unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_malformed_input_is_parse_error() {
        let err = ConfigParser::parse_str::<TestConfig>("{ \"name\": ", &options(ConfigFormat::JsonC))
            .unwrap_err();
        match err {
            ConfigError::Parse { format, .. } => assert_eq!(format, ConfigFormat::JsonC),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test_case("devcontainer.json", ConfigFormat::Json)]
    #[test_case("devcontainer.JSONC", ConfigFormat::JsonC)]
    #[test_case("env.json5", ConfigFormat::Json5)]
    #[test_case("env.toml", ConfigFormat::Toml)]
    #[test_case("env.yml", ConfigFormat::Yaml)]
    #[test_case(".devcontainer", ConfigFormat::JsonC)]
    fn test_format_from_path(path: &str, format: ConfigFormat) {
        assert_eq!(ConfigFormat::from_path(Path::new(path)), format);
    }

    #[test]
    fn test_to_string_round_trips_through_toml() {
        let rendered = ConfigParser::to_string(&expected(), ConfigFormat::Toml).unwrap();
        let parsed: TestConfig = ConfigParser::parse_str(&rendered, &options(ConfigFormat::Toml)).unwrap();
        assert_eq!(parsed, expected());
    }
}
