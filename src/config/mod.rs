pub mod devcontainer;
pub mod lifecycle;
pub mod mount;
pub mod parser;
pub mod variables;

pub use devcontainer::{EnvironmentConfig, FeatureOptions};
pub use lifecycle::{CommandSpec, ForwardPort, LifecycleCommand};
pub use mount::{Mount, MountKind};
pub use parser::{ConfigFormat, ConfigParser, ConfigParserOptions};
pub use variables::VariableContext;

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::{ConfigError, ConfigResult};
use crate::track_performance;
use devcontainer::RawDocument;

/// Candidate locations, relative to a workspace root, in lookup order.
pub const DISCOVERY_PATHS: &[&str] = &[
    ".devcontainer/devcontainer.json",
    ".devcontainer.json",
    ".devcontainer/devcontainer.jsonc",
];

#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Reject unknown top-level keys instead of warning about them.
    pub strict: bool,
    /// Accept comments and trailing commas in `.json` files.
    pub allow_comments: bool,
    /// Force a format instead of detecting it from the file extension.
    pub format: Option<ConfigFormat>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            strict: false,
            allow_comments: true,
            format: None,
        }
    }
}

/// Reads environment configuration documents from disk.
///
/// Loading has no side effects beyond reading the one file, and the same
/// input always produces the same result.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    options: LoaderOptions,
}

impl ConfigLoader {
    pub fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Read, parse and validate the document at `path`.
    pub fn load(&self, path: &Path) -> ConfigResult<EnvironmentConfig> {
        track_performance!("config_load");

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let format = self
            .options
            .format
            .unwrap_or_else(|| ConfigFormat::from_path(path));
        debug!(path = %path.display(), %format, "Loading environment configuration");

        let config = self.load_str(&content, format)?;
        info!(
            path = %path.display(),
            name = config.label(),
            image = %config.base_image,
            "Loaded environment configuration"
        );
        Ok(config)
    }

    /// Parse and validate a document held in memory.
    pub fn load_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<EnvironmentConfig> {
        let parser_options = ConfigParserOptions {
            format,
            allow_comments: self.options.allow_comments,
        };
        let raw: RawDocument = ConfigParser::parse_str(content, &parser_options)?;
        EnvironmentConfig::from_document(raw, &self.options)
    }

    /// Locate the document for a workspace the way dev container tooling
    /// does. See [`DISCOVERY_PATHS`].
    pub fn discover(workspace_root: &Path) -> ConfigResult<PathBuf> {
        DISCOVERY_PATHS
            .iter()
            .map(|candidate| workspace_root.join(candidate))
            .find(|path| path.is_file())
            .ok_or_else(|| ConfigError::NotFound {
                root: workspace_root.to_path_buf(),
            })
    }

    /// [`discover`](Self::discover) then [`load`](Self::load).
    pub fn load_workspace(&self, workspace_root: &Path) -> ConfigResult<EnvironmentConfig> {
        let path = Self::discover(workspace_root)?;
        self.load(&path)
    }
}
