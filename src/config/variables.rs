//! `${...}` placeholder substitution for dev container documents.
//!
//! Supported forms:
//!
//! - `${localEnv:NAME}` and `${localEnv:NAME:default}` from the host environment
//! - `${localWorkspaceFolder}` / `${localWorkspaceFolderBasename}`
//! - `${containerWorkspaceFolder}` / `${containerWorkspaceFolderBasename}`
//!
//! `${containerEnv:NAME}` and anything unrecognised are left untouched so the
//! provisioning tool can resolve them inside the container.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::devcontainer::EnvironmentConfig;
use super::mount::Mount;
use crate::core::ConfigResult;

/// Values available to placeholder substitution.
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    pub local_workspace_folder: Option<PathBuf>,
    pub container_workspace_folder: Option<String>,
    pub env: HashMap<String, String>,
}

impl VariableContext {
    /// Context backed by the current process environment.
    pub fn from_process_env(local_workspace_folder: Option<&Path>) -> Self {
        Self {
            local_workspace_folder: local_workspace_folder.map(Path::to_path_buf),
            container_workspace_folder: None,
            env: std::env::vars().collect(),
        }
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    fn lookup(&self, expr: &str) -> Option<String> {
        if let Some(rest) = expr.strip_prefix("localEnv:") {
            let (name, default) = match rest.split_once(':') {
                Some((name, default)) => (name, Some(default)),
                None => (rest, None),
            };
            return Some(
                self.env
                    .get(name)
                    .cloned()
                    .or_else(|| default.map(str::to_string))
                    .unwrap_or_default(),
            );
        }

        match expr {
            "localWorkspaceFolder" => self
                .local_workspace_folder
                .as_ref()
                .map(|p| p.display().to_string()),
            "localWorkspaceFolderBasename" => self
                .local_workspace_folder
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned()),
            "containerWorkspaceFolder" => self.container_workspace_folder.clone(),
            "containerWorkspaceFolderBasename" => self
                .container_workspace_folder
                .as_deref()
                .and_then(|p| p.trim_end_matches('/').rsplit('/').next())
                .map(str::to_string),
            _ => None,
        }
    }

    /// Replace every known placeholder in `input`.
    pub fn substitute_str(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    let expr = &after[..end];
                    match self.lookup(expr) {
                        Some(value) => out.push_str(&value),
                        None => {
                            out.push_str("${");
                            out.push_str(expr);
                            out.push('}');
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

fn substitute_map(
    map: &IndexMap<String, String>,
    subst: &mut impl FnMut(&str) -> String,
) -> IndexMap<String, String> {
    map.iter().map(|(k, v)| (k.clone(), subst(v.as_str()))).collect()
}

fn substitute_mount(mount: &Mount, subst: &mut impl FnMut(&str) -> String) -> Mount {
    Mount {
        source: subst(mount.source.as_str()),
        target: subst(mount.target.as_str()),
        kind: mount.kind,
        options: mount.options.clone(),
    }
}

impl EnvironmentConfig {
    /// Return a copy with placeholders resolved. The workspace folder is
    /// resolved first and then exposed as `${containerWorkspaceFolder}` to
    /// every other field. Fails if a required field resolves to empty.
    pub fn substitute(&self, ctx: &VariableContext) -> ConfigResult<Self> {
        let workspace_folder = ctx.substitute_str(&self.workspace_folder);

        let mut ctx = ctx.clone();
        ctx.container_workspace_folder = Some(workspace_folder.clone());
        let mut subst = |s: &str| ctx.substitute_str(s);

        let resolved = Self {
            display_name: self.display_name.as_deref().map(&mut subst),
            base_image: subst(self.base_image.as_str()),
            features: self.features.clone(),
            environment_variables: substitute_map(&self.environment_variables, &mut subst),
            remote_env: self
                .remote_env
                .iter()
                .map(|(k, v)| (k.clone(), v.as_deref().map(&mut subst)))
                .collect(),
            editor_extensions: self.editor_extensions.clone(),
            editor_settings: self.editor_settings.clone(),
            mounts: self
                .mounts
                .iter()
                .map(|m| substitute_mount(m, &mut subst))
                .collect(),
            workspace_mount: self
                .workspace_mount
                .as_ref()
                .map(|m| substitute_mount(m, &mut subst)),
            post_create_command: self
                .post_create_command
                .as_ref()
                .map(|c| c.map_strings(&mut subst)),
            post_start_command: self
                .post_start_command
                .as_ref()
                .map(|c| c.map_strings(&mut subst)),
            remote_user: self.remote_user.as_deref().map(&mut subst),
            container_user: self.container_user.as_deref().map(&mut subst),
            run_arguments: self.run_arguments.iter().map(|a| subst(a.as_str())).collect(),
            forward_ports: self.forward_ports.clone(),
            workspace_folder,
        };

        resolved.validate()?;
        debug!(workspace = %resolved.workspace_folder, "Resolved configuration variables");
        Ok(resolved)
    }
}
