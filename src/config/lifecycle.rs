use indexmap::IndexMap;
use serde::Deserialize;
use std::fmt;

/// A single command: run through a shell, or exec'd directly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    Shell(String),
    Exec(Vec<String>),
}

impl CommandSpec {
    pub fn is_empty(&self) -> bool {
        match self {
            CommandSpec::Shell(cmd) => cmd.trim().is_empty(),
            CommandSpec::Exec(argv) => argv.is_empty(),
        }
    }

    pub(crate) fn map_strings(&self, f: &mut impl FnMut(&str) -> String) -> Self {
        match self {
            CommandSpec::Shell(cmd) => CommandSpec::Shell(f(cmd.as_str())),
            CommandSpec::Exec(argv) => CommandSpec::Exec(argv.iter().map(|a| f(a.as_str())).collect()),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandSpec::Shell(cmd) => f.write_str(cmd),
            CommandSpec::Exec(argv) => {
                let quoted: Vec<String> = argv.iter().map(|a| shell_quote(a)).collect();
                f.write_str(&quoted.join(" "))
            }
        }
    }
}

/// A lifecycle hook such as `postCreateCommand`.
///
/// The object form runs each named command in parallel; the external tool
/// decides how. Failures are reported to the user but never tear down the
/// container.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LifecycleCommand {
    Shell(String),
    Exec(Vec<String>),
    Parallel(IndexMap<String, CommandSpec>),
}

impl LifecycleCommand {
    pub fn is_empty(&self) -> bool {
        match self {
            LifecycleCommand::Shell(cmd) => cmd.trim().is_empty(),
            LifecycleCommand::Exec(argv) => argv.is_empty(),
            LifecycleCommand::Parallel(cmds) => cmds.values().all(CommandSpec::is_empty),
        }
    }

    /// Flatten into `(label, command)` pairs; single commands get no label.
    pub fn commands(&self) -> Vec<(Option<&str>, CommandSpec)> {
        match self {
            LifecycleCommand::Shell(cmd) => vec![(None, CommandSpec::Shell(cmd.clone()))],
            LifecycleCommand::Exec(argv) => vec![(None, CommandSpec::Exec(argv.clone()))],
            LifecycleCommand::Parallel(cmds) => cmds
                .iter()
                .map(|(name, cmd)| (Some(name.as_str()), cmd.clone()))
                .collect(),
        }
    }

    pub(crate) fn map_strings(&self, f: &mut impl FnMut(&str) -> String) -> Self {
        match self {
            LifecycleCommand::Shell(cmd) => LifecycleCommand::Shell(f(cmd.as_str())),
            LifecycleCommand::Exec(argv) => {
                LifecycleCommand::Exec(argv.iter().map(|a| f(a.as_str())).collect())
            }
            LifecycleCommand::Parallel(cmds) => LifecycleCommand::Parallel(
                cmds.iter()
                    .map(|(name, cmd)| (name.clone(), cmd.map_strings(&mut *f)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for LifecycleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .commands()
            .into_iter()
            .map(|(label, cmd)| match label {
                Some(label) => format!("[{label}] {cmd}"),
                None => cmd.to_string(),
            })
            .collect();
        f.write_str(&rendered.join(" & "))
    }
}

/// `forwardPorts` entries are either a bare port or `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ForwardPort {
    Port(u16),
    HostPort(String),
}

impl ForwardPort {
    /// Value for `docker run -p`.
    pub fn publish_arg(&self) -> String {
        match self {
            ForwardPort::Port(port) => format!("{port}:{port}"),
            ForwardPort::HostPort(spec) => match spec.rsplit_once(':') {
                Some((host, port)) if host.parse::<u16>().is_err() => {
                    format!("{port}:{port}")
                }
                _ => spec.clone(),
            },
        }
    }
}

pub(crate) fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,@+%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
