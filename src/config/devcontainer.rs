use indexmap::IndexMap;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

use super::lifecycle::{CommandSpec, ForwardPort, LifecycleCommand};
use super::mount::{Mount, RawMount};
use super::parser::ConfigFormat;
use super::{ConfigLoader, LoaderOptions};
use crate::core::{ConfigError, ConfigResult};

/// Options passed to a single feature installer.
pub type FeatureOptions = IndexMap<String, Value>;

/// A parsed and validated dev container document.
///
/// Built once per provisioning run and never mutated afterwards; every
/// mapping field keeps document order.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentConfig {
    pub display_name: Option<String>,
    pub base_image: String,
    pub features: IndexMap<String, FeatureOptions>,
    pub environment_variables: IndexMap<String, String>,
    /// `None` unsets the variable for lifecycle commands.
    pub remote_env: IndexMap<String, Option<String>>,
    pub editor_extensions: Vec<String>,
    pub editor_settings: IndexMap<String, Value>,
    pub mounts: Vec<Mount>,
    pub workspace_mount: Option<Mount>,
    pub post_create_command: Option<LifecycleCommand>,
    pub post_start_command: Option<LifecycleCommand>,
    pub remote_user: Option<String>,
    pub container_user: Option<String>,
    pub run_arguments: Vec<String>,
    pub forward_ports: Vec<ForwardPort>,
    pub workspace_folder: String,
}

/// Document model before validation. Field names follow `devcontainer.json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawDocument {
    name: Option<String>,
    image: Option<String>,
    #[serde(default, deserialize_with = "last_wins")]
    features: IndexMap<String, RawFeature>,
    #[serde(default, deserialize_with = "last_wins")]
    container_env: IndexMap<String, String>,
    #[serde(default, deserialize_with = "last_wins")]
    remote_env: IndexMap<String, Option<String>>,
    customizations: Option<RawCustomizations>,
    #[serde(default)]
    mounts: Vec<RawMount>,
    workspace_mount: Option<RawMount>,
    post_create_command: Option<LifecycleCommand>,
    post_start_command: Option<LifecycleCommand>,
    remote_user: Option<String>,
    container_user: Option<String>,
    #[serde(default)]
    run_args: Vec<String>,
    #[serde(default)]
    forward_ports: Vec<ForwardPort>,
    workspace_folder: Option<String>,

    #[serde(flatten)]
    unknown: IndexMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawCustomizations {
    vscode: Option<RawEditor>,
}

#[derive(Debug, Deserialize)]
struct RawEditor {
    #[serde(default)]
    extensions: Vec<String>,
    #[serde(default, deserialize_with = "last_wins")]
    settings: IndexMap<String, Value>,
}

/// Features are declared with an options object or a bare version string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFeature {
    Options(#[serde(deserialize_with = "last_wins")] IndexMap<String, Value>),
    Version(String),
}

/// Deserialize a string-keyed map where a repeated key replaces the earlier
/// value but keeps the earlier position.
fn last_wins<'de, D, V>(deserializer: D) -> Result<IndexMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct LastWins<V>(PhantomData<V>);

    impl<'de, V> Visitor<'de> for LastWins<V>
    where
        V: Deserialize<'de>,
    {
        type Value = IndexMap<String, V>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map with string keys")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut map = IndexMap::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((key, value)) = access.next_entry::<String, V>()? {
                if map.contains_key(&key) {
                    debug!(key = %key, "Duplicate key, keeping last declared value");
                }
                map.insert(key, value);
            }
            Ok(map)
        }
    }

    deserializer.deserialize_map(LastWins(PhantomData))
}

fn required_string(value: Option<String>, field: &str, what: &str) -> ConfigResult<String> {
    match value {
        None => Err(ConfigError::validation(field, format!("{what} is required"))),
        Some(v) if v.trim().is_empty() => Err(ConfigError::validation(
            field,
            format!("{what} must not be empty"),
        )),
        Some(v) => Ok(v),
    }
}

fn validate_env_names<V>(vars: &IndexMap<String, V>, field: &str) -> ConfigResult<()> {
    for name in vars.keys() {
        if name.is_empty() || name.contains('=') {
            return Err(ConfigError::validation(
                format!("{field}.{name}"),
                "environment variable names must be non-empty and must not contain `=`",
            ));
        }
    }
    Ok(())
}

fn resolve_feature(id: &str, raw: RawFeature) -> ConfigResult<FeatureOptions> {
    let options = match raw {
        RawFeature::Options(options) => options,
        RawFeature::Version(version) => {
            let mut options = FeatureOptions::new();
            options.insert("version".to_string(), Value::String(version));
            options
        }
    };

    require_scalars(&options, &format!("features.{id}"), "feature options")?;
    Ok(options)
}

fn require_scalars(map: &IndexMap<String, Value>, field: &str, what: &str) -> ConfigResult<()> {
    for (key, value) in map {
        if value.is_object() || value.is_array() {
            return Err(ConfigError::validation(
                format!("{field}.{key}"),
                format!("{what} must be strings, numbers or booleans"),
            ));
        }
    }
    Ok(())
}

impl EnvironmentConfig {
    /// Load from a file with default [`LoaderOptions`].
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        ConfigLoader::default().load(path)
    }

    /// Parse from a string in the given format with default options.
    pub fn parse(content: &str, format: ConfigFormat) -> ConfigResult<Self> {
        ConfigLoader::default().load_str(content, format)
    }

    pub(crate) fn from_document(raw: RawDocument, options: &LoaderOptions) -> ConfigResult<Self> {
        for key in raw.unknown.keys().filter(|k| !k.starts_with('$')) {
            if options.strict {
                return Err(ConfigError::validation(
                    key.clone(),
                    "unknown configuration key",
                ));
            }
            warn!(key = %key, "Ignoring unsupported configuration key");
        }

        let base_image = required_string(raw.image, "image", "base image")?;
        let workspace_folder =
            required_string(raw.workspace_folder, "workspaceFolder", "workspace folder")?;

        validate_env_names(&raw.container_env, "containerEnv")?;
        validate_env_names(&raw.remote_env, "remoteEnv")?;

        let features = raw
            .features
            .into_iter()
            .map(|(id, feature)| resolve_feature(&id, feature).map(|opts| (id, opts)))
            .collect::<ConfigResult<IndexMap<_, _>>>()?;

        let mounts = raw
            .mounts
            .iter()
            .enumerate()
            .map(|(i, mount)| mount.resolve(&format!("mounts[{i}]")))
            .collect::<ConfigResult<Vec<_>>>()?;

        let workspace_mount = raw
            .workspace_mount
            .as_ref()
            .map(|mount| mount.resolve("workspaceMount"))
            .transpose()?;

        let (editor_extensions, editor_settings) = match raw.customizations.and_then(|c| c.vscode) {
            Some(editor) => (editor.extensions, editor.settings),
            None => (Vec::new(), IndexMap::new()),
        };
        require_scalars(&editor_settings, "customizations.vscode.settings", "editor settings")?;

        let config = Self {
            display_name: raw.name,
            base_image,
            features,
            environment_variables: raw.container_env,
            remote_env: raw.remote_env,
            editor_extensions,
            editor_settings,
            mounts,
            workspace_mount,
            post_create_command: raw.post_create_command.filter(|cmd| !cmd.is_empty()),
            post_start_command: raw.post_start_command.filter(|cmd| !cmd.is_empty()),
            remote_user: raw.remote_user,
            container_user: raw.container_user,
            run_arguments: raw.run_args,
            forward_ports: raw.forward_ports,
            workspace_folder,
        };

        debug!(
            image = %config.base_image,
            features = config.features.len(),
            mounts = config.mounts.len(),
            "Validated environment configuration"
        );
        Ok(config)
    }

    /// Re-check the invariants that must hold after any transformation.
    pub(crate) fn validate(&self) -> ConfigResult<()> {
        if self.base_image.trim().is_empty() {
            return Err(ConfigError::validation("image", "base image must not be empty"));
        }
        if self.workspace_folder.trim().is_empty() {
            return Err(ConfigError::validation(
                "workspaceFolder",
                "workspace folder must not be empty",
            ));
        }
        for (i, mount) in self.mounts.iter().enumerate() {
            if mount.source.trim().is_empty() {
                return Err(ConfigError::validation(
                    format!("mounts[{i}].source"),
                    "mount source must not be empty",
                ));
            }
            if mount.target.trim().is_empty() {
                return Err(ConfigError::validation(
                    format!("mounts[{i}].target"),
                    "mount target must not be empty",
                ));
            }
        }
        Ok(())
    }

    /// Human-readable label, falling back to a generic name.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or("dev-container")
    }

    /// Render back into `devcontainer.json` shape. Loading the result yields
    /// an equal config.
    pub fn to_document(&self) -> Value {
        let mut doc = Map::new();

        if let Some(name) = &self.display_name {
            doc.insert("name".into(), Value::from(name.as_str()));
        }
        doc.insert("image".into(), Value::from(self.base_image.as_str()));
        if !self.features.is_empty() {
            let features: Map<String, Value> = self
                .features
                .iter()
                .map(|(id, opts)| (id.clone(), Value::Object(opts.clone().into_iter().collect())))
                .collect();
            doc.insert("features".into(), Value::Object(features));
        }
        if !self.environment_variables.is_empty() {
            doc.insert("containerEnv".into(), string_map(&self.environment_variables));
        }
        if !self.remote_env.is_empty() {
            let remote_env: Map<String, Value> = self
                .remote_env
                .iter()
                .map(|(k, v)| (k.clone(), v.as_deref().map_or(Value::Null, Value::from)))
                .collect();
            doc.insert("remoteEnv".into(), Value::Object(remote_env));
        }
        if !self.editor_extensions.is_empty() || !self.editor_settings.is_empty() {
            let mut vscode = Map::new();
            vscode.insert("extensions".into(), Value::from(self.editor_extensions.clone()));
            vscode.insert(
                "settings".into(),
                Value::Object(self.editor_settings.clone().into_iter().collect()),
            );
            let mut customizations = Map::new();
            customizations.insert("vscode".into(), Value::Object(vscode));
            doc.insert("customizations".into(), Value::Object(customizations));
        }
        if !self.mounts.is_empty() {
            let mounts: Vec<Value> = self.mounts.iter().map(|m| Value::from(m.to_string())).collect();
            doc.insert("mounts".into(), Value::Array(mounts));
        }
        if let Some(mount) = &self.workspace_mount {
            doc.insert("workspaceMount".into(), Value::from(mount.to_string()));
        }
        if let Some(cmd) = &self.post_create_command {
            doc.insert("postCreateCommand".into(), command_value(cmd));
        }
        if let Some(cmd) = &self.post_start_command {
            doc.insert("postStartCommand".into(), command_value(cmd));
        }
        if let Some(user) = &self.remote_user {
            doc.insert("remoteUser".into(), Value::from(user.as_str()));
        }
        if let Some(user) = &self.container_user {
            doc.insert("containerUser".into(), Value::from(user.as_str()));
        }
        if !self.run_arguments.is_empty() {
            doc.insert("runArgs".into(), Value::from(self.run_arguments.clone()));
        }
        if !self.forward_ports.is_empty() {
            let ports: Vec<Value> = self
                .forward_ports
                .iter()
                .map(|port| match port {
                    ForwardPort::Port(port) => Value::from(*port),
                    ForwardPort::HostPort(spec) => Value::from(spec.as_str()),
                })
                .collect();
            doc.insert("forwardPorts".into(), Value::Array(ports));
        }
        doc.insert("workspaceFolder".into(), Value::from(self.workspace_folder.as_str()));

        Value::Object(doc)
    }
}

fn string_map(map: &IndexMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect(),
    )
}

fn command_value(cmd: &LifecycleCommand) -> Value {
    match cmd {
        LifecycleCommand::Shell(cmd) => Value::from(cmd.as_str()),
        LifecycleCommand::Exec(argv) => Value::from(argv.clone()),
        LifecycleCommand::Parallel(cmds) => Value::Object(
            cmds.iter()
                .map(|(name, cmd)| {
                    let value = match cmd {
                        CommandSpec::Shell(cmd) => Value::from(cmd.as_str()),
                        CommandSpec::Exec(argv) => Value::from(argv.clone()),
                    };
                    (name.clone(), value)
                })
                .collect(),
        ),
    }
}

impl FromStr for EnvironmentConfig {
    type Err = ConfigError;

    /// Parses JSON with comments, the native dev container syntax.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, ConfigFormat::JsonC)
    }
}
