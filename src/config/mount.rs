use indexmap::IndexMap;
use serde::Deserialize;
use std::fmt;

use crate::core::{ConfigError, ConfigResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    Bind,
    Volume,
}

impl MountKind {
    fn parse(value: &str, field: &str) -> ConfigResult<Self> {
        match value.trim() {
            "bind" => Ok(MountKind::Bind),
            "volume" => Ok(MountKind::Volume),
            other => Err(ConfigError::validation(
                field,
                format!("unsupported mount type `{other}` (expected `bind` or `volume`)"),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MountKind::Bind => "bind",
            MountKind::Volume => "volume",
        }
    }
}

/// A binding between a host path or named volume and a container path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub source: String,
    pub target: String,
    pub kind: MountKind,
    /// Extra `key=value` pairs from the string form, e.g. `consistency=cached`.
    pub options: IndexMap<String, String>,
}

impl fmt::Display for Mount {
    /// Renders the Docker `--mount` syntax. Fields holding a comma or a
    /// double quote are wrapped in quotes, with inner quotes doubled.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields = vec![
            format!("type={}", self.kind.as_str()),
            format!("source={}", self.source),
            format!("target={}", self.target),
        ];
        fields.extend(self.options.iter().map(|(key, value)| {
            if value.is_empty() {
                key.clone()
            } else {
                format!("{key}={value}")
            }
        }));

        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if field.contains([',', '"']) {
                write!(f, "\"{}\"", field.replace('"', "\"\""))?;
            } else {
                f.write_str(field)?;
            }
        }
        Ok(())
    }
}

/// A mount as written in the document: a `--mount` style string or an object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawMount {
    Spec(String),
    Object {
        source: Option<String>,
        target: Option<String>,
        #[serde(rename = "type")]
        kind: Option<String>,
    },
}

impl RawMount {
    /// Normalise into a [`Mount`]; `field` names the mount in error messages.
    pub fn resolve(&self, field: &str) -> ConfigResult<Mount> {
        match self {
            RawMount::Spec(spec) => parse_mount_spec(spec, field),
            RawMount::Object {
                source,
                target,
                kind,
            } => Ok(Mount {
                source: required_part(source.as_deref(), field, "source")?,
                target: required_part(target.as_deref(), field, "target")?,
                kind: MountKind::parse(
                    &required_part(kind.as_deref(), field, "type")?,
                    &format!("{field}.type"),
                )?,
                options: IndexMap::new(),
            }),
        }
    }
}

fn required_part(value: Option<&str>, field: &str, part: &str) -> ConfigResult<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::validation(
            format!("{field}.{part}"),
            format!("mount {part} is required"),
        )),
    }
}

/// Split a `--mount` string on commas outside double quotes. A quoted field
/// may contain commas, and `""` inside it stands for one quote.
fn split_spec_fields(spec: &str, field: &str) -> ConfigResult<Vec<String>> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = spec.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if quoted {
        return Err(ConfigError::validation(
            field,
            "unterminated quote in mount string",
        ));
    }
    fields.push(current);
    Ok(fields)
}

fn parse_mount_spec(spec: &str, field: &str) -> ConfigResult<Mount> {
    let mut source = None;
    let mut target = None;
    let mut kind = None;
    let mut options = IndexMap::new();

    let fields = split_spec_fields(spec, field)?;
    for part in fields.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        let (key, value) = match part.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (part, ""),
        };
        match key {
            "source" | "src" => source = Some(value),
            "target" | "dst" | "destination" => target = Some(value),
            "type" => kind = Some(value),
            _ => {
                options.insert(key.to_string(), value.to_string());
            }
        }
    }

    Ok(Mount {
        source: required_part(source, field, "source")?,
        target: required_part(target, field, "target")?,
        kind: MountKind::parse(
            &required_part(kind, field, "type")?,
            &format!("{field}.type"),
        )?,
        options,
    })
}
