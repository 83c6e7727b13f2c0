//! Provisioning plan for an [`EnvironmentConfig`].
//!
//! Nothing here talks to a container runtime. The plan lists, in order, the
//! actions an external tool performs for a config and renders the matching
//! `docker run` invocation, so callers can inspect or hand it off.

use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use tracing::debug;

use crate::config::lifecycle::shell_quote;
use crate::config::{EnvironmentConfig, FeatureOptions, LifecycleCommand};

/// Prefix for generated container names.
pub const CONTAINER_PREFIX: &str = "devenv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleHook {
    PostCreate,
    PostStart,
}

impl fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleHook::PostCreate => write!(f, "postCreateCommand"),
            LifecycleHook::PostStart => write!(f, "postStartCommand"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProvisionStep {
    PullImage {
        image: String,
    },
    InstallFeature {
        id: String,
        options: FeatureOptions,
    },
    CreateContainer {
        args: Vec<String>,
    },
    /// Failure is reported to the user but leaves the container running.
    RunLifecycle {
        hook: LifecycleHook,
        command: LifecycleCommand,
        user: Option<String>,
        /// `None` unsets the variable.
        env: IndexMap<String, Option<String>>,
    },
    ConfigureEditor {
        extensions: Vec<String>,
        settings: IndexMap<String, Value>,
    },
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionStep::PullImage { image } => write!(f, "pull image {image}"),
            ProvisionStep::InstallFeature { id, options } => {
                write!(f, "install feature {id}")?;
                if !options.is_empty() {
                    let opts: Vec<String> = options
                        .iter()
                        .map(|(k, v)| match v {
                            Value::String(s) => format!("{k}={s}"),
                            other => format!("{k}={other}"),
                        })
                        .collect();
                    write!(f, " ({})", opts.join(", "))?;
                }
                Ok(())
            }
            ProvisionStep::CreateContainer { args } => {
                write!(f, "create container: {}", render_command("docker", args))
            }
            ProvisionStep::RunLifecycle {
                hook,
                command,
                user,
                ..
            } => {
                write!(f, "run {hook}")?;
                if let Some(user) = user {
                    write!(f, " as {user}")?;
                }
                write!(f, ": {command}")
            }
            ProvisionStep::ConfigureEditor {
                extensions,
                settings,
            } => write!(
                f,
                "configure editor: {} extension(s), {} setting(s)",
                extensions.len(),
                settings.len()
            ),
        }
    }
}

/// The ordered provisioning actions for one config.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub container_name: String,
    pub steps: Vec<ProvisionStep>,
}

impl RunPlan {
    /// Build the plan. The config has already passed validation, so no
    /// step can be planned for an invalid document.
    pub fn from_config(config: &EnvironmentConfig) -> Self {
        let container_name = container_name(config.label());
        let mut steps = vec![ProvisionStep::PullImage {
            image: config.base_image.clone(),
        }];

        steps.extend(config.features.iter().map(|(id, options)| {
            ProvisionStep::InstallFeature {
                id: id.clone(),
                options: options.clone(),
            }
        }));

        steps.push(ProvisionStep::CreateContainer {
            args: docker_run_args(config, &container_name),
        });

        let lifecycle_user = config
            .remote_user
            .clone()
            .or_else(|| config.container_user.clone());
        let hooks = [
            (LifecycleHook::PostCreate, &config.post_create_command),
            (LifecycleHook::PostStart, &config.post_start_command),
        ];
        for (hook, command) in hooks {
            if let Some(command) = command {
                steps.push(ProvisionStep::RunLifecycle {
                    hook,
                    command: command.clone(),
                    user: lifecycle_user.clone(),
                    env: config.remote_env.clone(),
                });
            }
        }

        if !config.editor_extensions.is_empty() || !config.editor_settings.is_empty() {
            steps.push(ProvisionStep::ConfigureEditor {
                extensions: config.editor_extensions.clone(),
                settings: config.editor_settings.clone(),
            });
        }

        debug!(container = %container_name, steps = steps.len(), "Built provisioning plan");
        Self {
            container_name,
            steps,
        }
    }

    /// Arguments of the `docker` invocation that creates the container.
    pub fn docker_run_args(&self) -> &[String] {
        self.steps
            .iter()
            .find_map(|step| match step {
                ProvisionStep::CreateContainer { args } => Some(args.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// Shell-ready `docker run ...` line.
    pub fn docker_command(&self) -> String {
        render_command("docker", self.docker_run_args())
    }
}

/// `devenv-<slug>` where the slug keeps only characters Docker accepts.
pub fn container_name(label: &str) -> String {
    let slug: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        CONTAINER_PREFIX.to_string()
    } else {
        format!("{CONTAINER_PREFIX}-{slug}")
    }
}

fn docker_run_args(config: &EnvironmentConfig, container_name: &str) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "run".into(),
        "-d".into(),
        "--name".into(),
        container_name.to_string(),
        "--workdir".into(),
        config.workspace_folder.clone(),
    ];

    if let Some(user) = config.container_user.as_ref().or(config.remote_user.as_ref()) {
        args.push("--user".into());
        args.push(user.clone());
    }

    for (name, value) in &config.environment_variables {
        args.push("-e".into());
        args.push(format!("{name}={value}"));
    }

    for mount in config.workspace_mount.iter().chain(&config.mounts) {
        args.push("--mount".into());
        args.push(mount.to_string());
    }

    for port in &config.forward_ports {
        args.push("-p".into());
        args.push(port.publish_arg());
    }

    args.extend(config.run_arguments.iter().cloned());
    args.push(config.base_image.clone());
    args
}

fn render_command(program: &str, args: &[String]) -> String {
    std::iter::once(program.to_string())
        .chain(args.iter().map(|a| shell_quote(a)))
        .collect::<Vec<_>>()
        .join(" ")
}
