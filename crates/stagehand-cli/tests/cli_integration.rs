//! CLI subprocess integration tests.
//!
//! These tests invoke the `stagehand` and `stagehand-entry` binaries as
//! subprocesses and verify exit codes, generated files, and JSON output.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn stagehand_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_stagehand"));
    cmd.env_remove("STAGEHAND_LOG");
    cmd
}

fn entry_bin(generated: &Path, ledger: &Path, stage: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_stagehand-entry"));
    cmd.env("STAGEHAND_STAGE", stage)
        .env("STAGEHAND_GENERATED_DIR", generated)
        .env("STAGEHAND_LEDGER_DIR", ledger)
        .env_remove("STAGEHAND_VERBOSE");
    cmd
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn write_config(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("stagehand.toml");
    fs::write(&path, body).unwrap();
    path
}

const MINIMAL: &str = r#"
[project]
name = "demo"

[stage_1]
ports = ["8080:80"]

[stage_1.image]
base = "debian:bookworm"

[stage_2]
ports = ["{{HOST_PORT:-9000}}:9000"]
"#;

/// A project whose first-run and every-run hooks append to `hooks.log`.
fn hooked_project(dir: &Path) -> (PathBuf, PathBuf) {
    let log = dir.join("hooks.log");
    for name in ["first", "every"] {
        let script = dir.join(format!("{name}.sh"));
        fs::write(
            &script,
            format!("#!/bin/sh\necho {name} >> '{}'\n", log.display()),
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    }
    let d = dir.display();
    let config = write_config(
        dir,
        &format!(
            r#"
[project]
name = "hooked"
[stage_1.image]
base = "alpine"
[[stage_1.on_first_run]]
script = "{d}/first.sh"
[[stage_2.on_every_run]]
script = "{d}/every.sh"
"#
        ),
    );
    (config, log)
}

fn compile(config: &Path, out: &Path) -> Output {
    stagehand_bin()
        .args([
            "compile",
            &config.to_string_lossy(),
            "--output",
            &out.to_string_lossy(),
        ])
        .output()
        .unwrap()
}

#[test]
fn cli_version_exits_zero() {
    let output = stagehand_bin().arg("--version").output().unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("stagehand"));
}

#[test]
fn cli_help_lists_commands() {
    let output = stagehand_bin().arg("--help").output().unwrap();
    assert!(output.status.success());
    let text = stdout(&output);
    for command in ["compile", "check", "inspect", "completions", "man-pages"] {
        assert!(text.contains(command), "help must list '{command}'");
    }
}

#[test]
fn cli_compile_writes_build_context() {
    let project = tempfile::tempdir().unwrap();
    let config = write_config(project.path(), MINIMAL);
    let out = project.path().join("build");

    let output = compile(&config, &out);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    for file in [
        "docker-compose.yml",
        "stage-1.Dockerfile",
        "stage-2.Dockerfile",
        "generated/stage-1/hooks.json",
        "generated/stage-2/login-profile.sh",
    ] {
        assert!(out.join(file).is_file(), "missing {file}");
    }
    assert!(out.join("installation").is_dir());
    assert!(out.join("stagehand-entry").is_file());

    let manifest = fs::read_to_string(out.join("docker-compose.yml")).unwrap();
    let doc: serde_yaml::Value = serde_yaml::from_str(&manifest).unwrap();
    let ports: Vec<&str> = doc["services"]["stage-2"]["ports"]
        .as_sequence()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap())
        .collect();
    assert_eq!(ports, vec!["8080:80", "${HOST_PORT:-9000}:9000"]);
}

#[test]
fn cli_compile_copies_installation_dir() {
    let project = tempfile::tempdir().unwrap();
    let config = write_config(project.path(), MINIMAL);
    let scripts = project.path().join("installation/stage-1");
    fs::create_dir_all(&scripts).unwrap();
    fs::write(scripts.join("setup.sh"), "#!/bin/sh\n").unwrap();
    let out = project.path().join("build");

    let output = compile(&config, &out);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(out.join("installation/stage-1/setup.sh").is_file());
}

#[test]
fn cli_compile_json_reports_fingerprint() {
    let project = tempfile::tempdir().unwrap();
    let config = write_config(project.path(), MINIMAL);
    let out = project.path().join("build");

    let output = stagehand_bin()
        .args([
            "--json",
            "compile",
            &config.to_string_lossy(),
            "--output",
            &out.to_string_lossy(),
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["project"], "demo");
    assert_eq!(json["fingerprint"].as_str().unwrap().len(), 64);
    assert!(json["warnings"].as_array().unwrap().is_empty());
}

#[test]
fn cli_check_rejects_unknown_storage_keyword() {
    let project = tempfile::tempdir().unwrap();
    let config = write_config(
        project.path(),
        r#"
[project]
name = "bad"
[stage_1.image]
base = "debian"
[stage_1.storage.cache]
type = "volume"
"#,
    );

    let output = stagehand_bin()
        .args(["check", &config.to_string_lossy()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("cache"));
}

#[test]
fn cli_check_fails_on_runtime_path_in_build_hook() {
    let project = tempfile::tempdir().unwrap();
    let config = write_config(
        project.path(),
        r#"
[project]
name = "bad"
[stage_1.image]
base = "debian"
[[stage_1.on_build]]
script = "setup.sh"
args = ["/stagehand/data/seed"]
"#,
    );
    let out = project.path().join("build");

    let output = compile(&config, &out);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("/stagehand/data"));
    assert!(!out.join("docker-compose.yml").exists());
}

#[test]
fn cli_check_missing_config_fails() {
    let project = tempfile::tempdir().unwrap();
    let output = stagehand_bin()
        .args(["check", &project.path().join("nope.toml").to_string_lossy()])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn cli_inspect_json_is_stable() {
    let project = tempfile::tempdir().unwrap();
    let config = write_config(project.path(), MINIMAL);

    let run = || {
        stagehand_bin()
            .args(["--json", "inspect", &config.to_string_lossy()])
            .output()
            .unwrap()
    };
    let first = run();
    let second = run();
    assert!(first.status.success(), "stderr: {}", stderr(&first));
    assert_eq!(first.stdout, second.stdout);

    let json: serde_json::Value = serde_json::from_slice(&first.stdout).unwrap();
    assert_eq!(json["project"]["name"], "demo");
    assert_eq!(json["project"]["stages"].as_array().unwrap().len(), 2);
}

#[test]
fn cli_completions_bash() {
    let output = stagehand_bin().args(["completions", "bash"]).output().unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("stagehand"));
}

#[test]
fn cli_man_pages_written() {
    let dir = tempfile::tempdir().unwrap();
    let output = stagehand_bin()
        .args(["man-pages", &dir.path().to_string_lossy()])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(dir.path().join("stagehand.1").is_file());
    assert!(dir.path().join("stagehand-compile.1").is_file());
}

#[test]
fn entry_unknown_option_exits_two_before_hooks() {
    let project = tempfile::tempdir().unwrap();
    let (config, log) = hooked_project(project.path());
    let out = project.path().join("build");
    assert!(compile(&config, &out).status.success());

    let ledger = project.path().join("ledger");
    let output = entry_bin(&out.join("generated"), &ledger, "2")
        .args(["--", "--wat"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("--wat"));
    assert!(!log.exists());
}

#[test]
fn entry_no_block_runs_hooks_and_exits_zero() {
    let project = tempfile::tempdir().unwrap();
    let (config, log) = hooked_project(project.path());
    let out = project.path().join("build");
    assert!(compile(&config, &out).status.success());
    let ledger = project.path().join("ledger");

    for _ in 0..2 {
        let output = entry_bin(&out.join("generated"), &ledger, "2")
            .args(["--", "--no-block", "--"])
            .output()
            .unwrap();
        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert!(stderr(&output).contains("no-block exit"));
    }

    let lines = fs::read_to_string(&log).unwrap();
    assert_eq!(lines, "first\nevery\nevery\n");
    assert!(ledger.join("stage-1.on_first_run.done").is_file());
}

#[test]
fn entry_execs_command_with_its_exit_status() {
    let project = tempfile::tempdir().unwrap();
    let (config, _log) = hooked_project(project.path());
    let out = project.path().join("build");
    assert!(compile(&config, &out).status.success());

    let output = entry_bin(&out.join("generated"), &project.path().join("ledger"), "2")
        .args(["--", "--", "sh", "-c", "exit 7"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7));
}

#[test]
fn entry_requires_stage() {
    let project = tempfile::tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_stagehand-entry"))
        .env_remove("STAGEHAND_STAGE")
        .env("STAGEHAND_GENERATED_DIR", project.path())
        .arg("--no-block")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("STAGEHAND_STAGE"));
}

#[test]
fn entry_verbose_flag_reaches_hooks() {
    let project = tempfile::tempdir().unwrap();
    let dir = project.path();
    let record = dir.join("verbose.log");
    let script = dir.join("record.sh");
    fs::write(
        &script,
        format!(
            "#!/bin/sh\necho \"${{STAGEHAND_VERBOSE:-unset}}\" >> '{}'\n",
            record.display()
        ),
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    let config = write_config(
        dir,
        &format!(
            r#"
[project]
name = "verbose"
[stage_1.image]
base = "alpine"
[[stage_1.on_every_run]]
script = "{}"
"#,
            script.display()
        ),
    );
    let out = dir.join("build");
    assert!(compile(&config, &out).status.success());
    let ledger = dir.join("ledger");

    for args in [&["--", "--verbose", "--no-block"][..], &["--", "--no-block"][..]] {
        let output = entry_bin(&out.join("generated"), &ledger, "1")
            .args(args)
            .output()
            .unwrap();
        assert!(output.status.success(), "stderr: {}", stderr(&output));
    }

    assert_eq!(fs::read_to_string(&record).unwrap(), "1\nunset\n");
}
