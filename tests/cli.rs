use std::fs;

use action_compiler::{ActionKind, ActionSpec};
use action_gate::{ConditionKind, ConditionSpec};
use assert_cmd::Command;
use stepwright::{Engine, EngineConfig};
use stepwright_core_types::RunId;
use stepwright_driver::fake::{FakeBrowser, FakePage};

const VALID_FLOW: &str = r#"
actions:
  - id: open
    kind: navigate
    input:
      url: https://app.test/
    preconditions:
      - kind: no_blocking_overlay
    postconditions:
      - kind: url_equals
        args:
          url: https://app.test/
"#;

const DUPLICATE_FLOW: &str = r#"
- id: idle
  kind: noop
  preconditions:
    - kind: network_idle
- id: idle
  kind: noop
  preconditions:
    - kind: network_idle
"#;

fn stepwright() -> Command {
    let mut cmd = Command::cargo_bin("stepwright").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn validate_accepts_and_rejects_flows() {
    let dir = tempfile::tempdir().unwrap();
    let valid = dir.path().join("valid.yaml");
    let duplicate = dir.path().join("duplicate.yaml");
    fs::write(&valid, VALID_FLOW).unwrap();
    fs::write(&duplicate, DUPLICATE_FLOW).unwrap();

    let out = stepwright().arg("validate").arg(&valid).assert().success();
    let stdout = String::from_utf8_lossy(&out.get_output().stdout).to_string();
    assert!(stdout.contains("ok: 1 actions"));

    stepwright().arg("validate").arg(&duplicate).assert().failure();
}

#[test]
fn inspect_prints_summary_and_verifies() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::from_config(EngineConfig {
        runs_root: dir.path().to_path_buf(),
        ..EngineConfig::default()
    })
    .unwrap();
    let mut browser = FakeBrowser::with_page(FakePage::new("https://app.test/", "App"));
    let idle = ActionSpec::new("idle", ActionKind::Noop)
        .precondition(ConditionSpec::new(ConditionKind::NetworkIdle));
    let report = engine.run(&mut browser, &[idle], RunId::from("cli")).unwrap();

    let out = stepwright()
        .arg("inspect")
        .arg(&report.run_dir)
        .arg("--verify")
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&out.get_output().stdout).to_string();
    assert!(stdout.contains("\"status\": \"success\""));
    assert!(stdout.contains("evidence verified"));

    stepwright()
        .arg("inspect")
        .arg(dir.path().join("missing"))
        .assert()
        .failure();
}

#[test]
fn config_reflects_environment_overrides() {
    let out = stepwright()
        .arg("config")
        .env("STEPWRIGHT__POLICY__HARD_CAP_STEPS", "17")
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&out.get_output().stdout).to_string();
    assert!(stdout.contains("hard_cap_steps: 17"));

    stepwright()
        .arg("config")
        .env("STEPWRIGHT__POLICY__NOT_A_KNOB", "1")
        .assert()
        .failure();
}
