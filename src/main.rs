use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use std::path::{Path, PathBuf};
use tracing::debug;

use devenv_config::monitoring::{self, LogLevel, TelemetryConfig};
use devenv_config::track_performance;
use devenv_config::{
    config::ConfigParser, ConfigFormat, ConfigLoader, EnvironmentConfig, LoaderOptions, RunPlan,
    VariableContext,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log verbosity (RUST_LOG overrides this)
    #[arg(long, global = true, env = "DEVENV_LOG_LEVEL", value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "DEVENV_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DocumentArgs {
    /// Configuration file; discovered from the current directory when omitted
    #[arg(env = "DEVENV_CONFIG")]
    path: Option<PathBuf>,

    /// Reject unknown configuration keys
    #[arg(long)]
    strict: bool,

    /// Parse as this format instead of detecting it from the extension
    #[arg(long, value_parser = parse_format)]
    input_format: Option<ConfigFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a configuration document
    Validate {
        #[command(flatten)]
        document: DocumentArgs,
    },
    /// Print the normalised configuration
    Show {
        #[command(flatten)]
        document: DocumentArgs,

        /// Output format (json, yaml, toml)
        #[arg(short, long, default_value = "json", value_parser = parse_format)]
        format: ConfigFormat,
    },
    /// Resolve variables and print the provisioning plan
    Plan {
        #[command(flatten)]
        document: DocumentArgs,

        /// Host workspace folder used for ${localWorkspaceFolder}
        #[arg(long)]
        local_workspace: Option<PathBuf>,
    },
}

fn parse_format(value: &str) -> Result<ConfigFormat, String> {
    value.parse()
}

fn load(document: &DocumentArgs) -> Result<(PathBuf, EnvironmentConfig)> {
    let loader = ConfigLoader::new(LoaderOptions {
        strict: document.strict,
        format: document.input_format,
        ..Default::default()
    });

    let path = match &document.path {
        Some(path) => path.clone(),
        None => {
            let cwd = std::env::current_dir().context("Failed to determine current directory")?;
            ConfigLoader::discover(&cwd)?
        }
    };

    let config = loader
        .load(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    Ok((path, config))
}

/// Workspace root for a document: the parent of `.devcontainer/` when the
/// file lives there, otherwise the file's own directory.
fn workspace_root(path: &Path) -> Option<PathBuf> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let root = if dir.file_name().is_some_and(|name| name == ".devcontainer") {
        dir.parent()?
    } else {
        dir
    };
    let root = if root.as_os_str().is_empty() { Path::new(".") } else { root };
    std::fs::canonicalize(root).ok().or_else(|| Some(root.to_path_buf()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Validate { document } => {
            track_performance!("validate");
            let (path, config) = load(&document)?;
            println!("{}: ok ({})", path.display(), config.label());
        }
        Commands::Show { document, format } => {
            track_performance!("show");
            let (_, config) = load(&document)?;
            let rendered = ConfigParser::to_string(&config.to_document(), format)?;
            println!("{}", rendered.trim_end());
        }
        Commands::Plan {
            document,
            local_workspace,
        } => {
            track_performance!("plan");
            let (path, config) = load(&document)?;
            let local = local_workspace.or_else(|| workspace_root(&path));
            debug!(local_workspace = ?local, "Resolving configuration variables");

            let ctx = VariableContext::from_process_env(local.as_deref());
            let resolved = config
                .substitute(&ctx)
                .context("Failed to resolve configuration variables")?;
            let plan = RunPlan::from_config(&resolved);

            println!("Provisioning plan for {}:", resolved.label());
            for (i, step) in plan.steps.iter().enumerate() {
                println!("{:>3}. {}", i + 1, step);
            }
            println!();
            println!("{}", plan.docker_command());
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    monitoring::init(&TelemetryConfig {
        enabled: true,
        log_level: cli.log_level,
        json: cli.log_json,
    });

    run(cli)
}
