use devenv_config::{
    config::{LifecycleCommand, MountKind},
    ConfigError, ConfigFormat, ConfigLoader, EnvironmentConfig, LoaderOptions, RunPlan,
    VariableContext,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn write_doc(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Integration Test Suite for the environment configuration loader
mod loader {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn test_load_fixture_matches_document() {
        let config = EnvironmentConfig::from_file(&fixture("devcontainer.jsonc")).unwrap();

        assert_eq!(config.label(), "Demo Workspace");
        assert_eq!(config.base_image, "mcr.microsoft.com/devcontainers/base:jammy");
        assert_eq!(config.workspace_folder, "/workspace/demo");
        assert_eq!(config.remote_user.as_deref(), Some("vscode"));
        assert_eq!(config.features.len(), 3);
        assert_eq!(
            config.features["ghcr.io/devcontainers/features/common-utils:2"]["installZsh"],
            Value::Bool(true)
        );
        assert!(config.features["ghcr.io/devcontainers/features/docker-outside-of-docker:1"].is_empty());
        assert_eq!(
            config.editor_extensions,
            vec!["rust-lang.rust-analyzer", "vadimcn.vscode-lldb", "tamasfe.even-better-toml"]
        );
        assert_eq!(
            config.editor_settings["terminal.integrated.defaultProfile.linux"],
            Value::from("zsh")
        );
        assert_eq!(config.environment_variables["RUST_BACKTRACE"], "1");
        assert_eq!(config.mounts[0].kind, MountKind::Bind);
        assert_eq!(config.mounts[1].source, "demo-cargo-registry");
        assert_eq!(
            config.post_create_command,
            Some(LifecycleCommand::Shell("bash .devcontainer/setup.sh".into()))
        );
        assert_eq!(
            config.run_arguments,
            vec!["--cap-add=SYS_PTRACE", "--security-opt", "seccomp=unconfined"]
        );
    }

    #[test]
    fn test_reload_is_idempotent() {
        let loader = ConfigLoader::default();
        let first = loader.load(&fixture("devcontainer.jsonc")).unwrap();
        let second = loader.load(&fixture("devcontainer.jsonc")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_toml_yaml_and_json_agree() {
        let json = EnvironmentConfig::parse(
            r#"{
                "name": "Demo",
                "image": "jammy-base",
                "workspaceFolder": "/workspace/demo",
                "runArgs": ["--init"],
                "mounts": [{"source": "/tmp", "target": "/host-tmp", "type": "bind"}],
                "containerEnv": {"FOO": "bar"},
                "features": {"ghcr.io/devcontainers/features/node:1": {"version": "20"}}
            }"#,
            ConfigFormat::Json,
        )
        .unwrap();

        let toml = EnvironmentConfig::from_file(&fixture("demo.toml")).unwrap();
        let yaml = EnvironmentConfig::from_file(&fixture("demo.yaml")).unwrap();

        assert_eq!(toml, json);
        assert_eq!(yaml, json);
    }

    #[test]
    fn test_spec_example_values() {
        let dir = TempDir::new().unwrap();
        let path = write_doc(
            &dir,
            "devcontainer.json",
            r#"{"image": "jammy-base", "workspaceFolder": "/workspace/demo", "containerEnv": {"FOO": "bar"}}"#,
        );

        let config = ConfigLoader::default().load(&path).unwrap();
        assert_eq!(config.base_image, "jammy-base");
        assert_eq!(config.workspace_folder, "/workspace/demo");
        assert_eq!(config.environment_variables["FOO"], "bar");
    }

    #[test_case(r#"{"workspaceFolder": "/w"}"#, "image" ; "missing image")]
    #[test_case(r#"{"image": "", "workspaceFolder": "/w"}"#, "image" ; "empty image")]
    #[test_case(r#"{"image": "x"}"#, "workspaceFolder" ; "missing workspace folder")]
    #[test_case(r#"{"image": "x", "workspaceFolder": ""}"#, "workspaceFolder" ; "empty workspace folder")]
    #[test_case(r#"{"image": "x", "workspaceFolder": "/w", "mounts": ["source=/a,type=bind"]}"#, "mounts[0].target" ; "incomplete mount")]
    fn test_validation_errors(doc: &str, field: &str) {
        let dir = TempDir::new().unwrap();
        let path = write_doc(&dir, "devcontainer.json", doc);

        match ConfigLoader::default().load(&path) {
            Err(ConfigError::Validation { field: actual, .. }) => assert_eq!(actual, field),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test_case("devcontainer.json", "{ \"image\": \"x\", " ; "truncated json")]
    #[test_case("devcontainer.json", "image: x" ; "not json")]
    #[test_case("env.toml", "image = " ; "bad toml")]
    #[test_case("env.yaml", "image: [x" ; "bad yaml")]
    #[test_case("devcontainer.json", r#"{"image": 42, "workspaceFolder": "/w"}"# ; "wrong type")]
    fn test_parse_errors(name: &str, doc: &str) {
        let dir = TempDir::new().unwrap();
        let path = write_doc(&dir, name, doc);

        let err = ConfigLoader::default().load(&path).unwrap_err();
        assert!(err.is_parse(), "expected parse error, got {err:?}");
    }

    #[test]
    fn test_duplicate_keys_last_declared_wins() {
        let dir = TempDir::new().unwrap();
        let path = write_doc(
            &dir,
            "devcontainer.json",
            r#"{
                "image": "x",
                "workspaceFolder": "/w",
                "containerEnv": { "MODE": "dev", "PORT": "8080", "MODE": "test" }
            }"#,
        );

        for _ in 0..2 {
            let config = ConfigLoader::default().load(&path).unwrap();
            assert_eq!(config.environment_variables.len(), 2);
            assert_eq!(config.environment_variables["MODE"], "test");
            assert_eq!(config.environment_variables.get_index(0).unwrap().0, "MODE");
        }
    }

    #[test]
    fn test_strict_loader_rejects_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = write_doc(
            &dir,
            "devcontainer.json",
            r#"{"image": "x", "workspaceFolder": "/w", "hostRequirements": {"cpus": 4}}"#,
        );

        assert!(ConfigLoader::default().load(&path).is_ok());

        let strict = ConfigLoader::new(LoaderOptions {
            strict: true,
            ..Default::default()
        });
        let err = strict.load(&path).unwrap_err();
        assert_eq!(err.field(), Some("hostRequirements"));
    }

    #[test]
    fn test_workspace_discovery() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".devcontainer")).unwrap();
        fs::copy(
            fixture("devcontainer.jsonc"),
            dir.path().join(".devcontainer/devcontainer.json"),
        )
        .unwrap();

        let config = ConfigLoader::default().load_workspace(dir.path()).unwrap();
        assert_eq!(config.label(), "Demo Workspace");
    }
}

mod provisioning {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plan_from_fixture() {
        let config = EnvironmentConfig::from_file(&fixture("devcontainer.jsonc")).unwrap();
        let ctx = VariableContext::default();
        let plan = RunPlan::from_config(&config.substitute(&ctx).unwrap());

        // pull, 3 features, create, postCreateCommand, editor
        assert_eq!(plan.steps.len(), 7);
        let args = plan.docker_run_args();
        assert_eq!(args.last().map(String::as_str), Some("mcr.microsoft.com/devcontainers/base:jammy"));
        assert!(args.windows(2).any(|w| w == ["--workdir", "/workspace/demo"]));
        assert!(args.windows(2).any(|w| w == ["--user", "vscode"]));
        assert!(args.contains(&"RUST_BACKTRACE=1".to_string()));
        assert!(args.contains(&"type=volume,source=demo-cargo-registry,target=/usr/local/cargo/registry".to_string()));
    }

    #[test]
    fn test_invalid_document_produces_no_plan() {
        let err = EnvironmentConfig::parse(r#"{"workspaceFolder": "/w"}"#, ConfigFormat::JsonC)
            .map(|config| RunPlan::from_config(&config))
            .unwrap_err();
        assert!(err.is_validation());
    }
}

mod cli {
    use super::*;
    use pretty_assertions::assert_eq;

    fn devenv() -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_devenv"));
        cmd.env_remove("DEVENV_CONFIG").env_remove("RUST_LOG");
        cmd
    }

    #[test]
    fn test_validate_ok() {
        let output = devenv()
            .arg("validate")
            .arg(fixture("devcontainer.jsonc"))
            .output()
            .unwrap();
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("ok (Demo Workspace)"));
    }

    #[test]
    fn test_validate_reports_missing_field() {
        let dir = TempDir::new().unwrap();
        let path = write_doc(&dir, "devcontainer.json", r#"{"image": "x"}"#);

        let output = devenv().arg("validate").arg(&path).output().unwrap();
        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("workspaceFolder"));
    }

    #[test]
    fn test_show_yaml_reloads() {
        let output = devenv()
            .args(["show", "--format", "yaml"])
            .arg(fixture("devcontainer.jsonc"))
            .output()
            .unwrap();
        assert!(output.status.success());

        let shown = EnvironmentConfig::parse(&String::from_utf8_lossy(&output.stdout), ConfigFormat::Yaml)
            .unwrap();
        let original = EnvironmentConfig::from_file(&fixture("devcontainer.jsonc")).unwrap();
        assert_eq!(shown, original);
    }

    #[test]
    fn test_plan_prints_docker_command() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".devcontainer")).unwrap();
        let path = write_doc(
            &dir,
            ".devcontainer/devcontainer.json",
            r#"{"image": "jammy-base", "workspaceFolder": "/workspaces/${localWorkspaceFolderBasename}"}"#,
        );

        let output = devenv()
            .arg("plan")
            .arg(&path)
            .arg("--local-workspace")
            .arg("/home/dev/demo")
            .output()
            .unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("pull image jammy-base"));
        assert!(stdout.contains("--workdir /workspaces/demo"));
    }
}
