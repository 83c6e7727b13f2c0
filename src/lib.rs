//! Loader and validator for dev container environment configuration.
//!
//! [`ConfigLoader`] turns a `devcontainer.json` style document (JSON with
//! comments, JSON5, TOML or YAML) into a typed [`EnvironmentConfig`].
//! Loading never provisions anything; [`docker::RunPlan`] describes what an
//! external tool would do with the result.

pub mod config;
pub mod core;
pub mod docker;
pub mod monitoring;

pub use crate::config::{ConfigFormat, ConfigLoader, EnvironmentConfig, LoaderOptions, VariableContext};
pub use crate::core::{ConfigError, ConfigResult};
pub use crate::docker::RunPlan;
