use std::path::Path;

use action_compiler::{ActionCompiler, ActionKind, ActionSpec, CompilerConfig};
use action_flow::{FlowError, PolicyConfig, RunMode, RunReport, RunStatus, StepLoop};
use action_gate::{ConditionKind, ConditionSpec};
use action_locator::TargetSpec;
use pretty_assertions::assert_eq;
use stepwright_core_types::{ErrorCode, RunId};
use stepwright_driver::fake::{FakeBrowser, FakeEffect, FakeElement, FakePage};
use stepwright_evidence_store::{
    load_manifest, read_trace, verify_manifest, CaptureConfig, EvidenceKind, Observer, RunLayout,
    TraceEvent,
};
use stepwright_privacy::Redactor;
use tempfile::TempDir;

fn fast_policy(mode: RunMode) -> PolicyConfig {
    PolicyConfig {
        mode,
        backoff_ms: vec![1],
        reload_timeout_ms: 100,
        ..PolicyConfig::default()
    }
}

fn engine(dir: &TempDir, policy: PolicyConfig) -> StepLoop {
    let compiler = ActionCompiler::new(CompilerConfig {
        wait_poll_interval_ms: 10,
        default_timeout_ms: 200,
        attach_poll_interval_ms: 10,
    });
    StepLoop::new(
        dir.path(),
        policy,
        compiler,
        Observer::new(CaptureConfig::default(), Redactor::builtin().clone()),
        Redactor::builtin().clone(),
    )
}

fn events(report: &RunReport) -> Vec<TraceEvent> {
    read_trace(&report.run_dir).unwrap()
}

fn names(report: &RunReport) -> Vec<String> {
    events(report).into_iter().map(|e| e.event).collect()
}

fn count(report: &RunReport, event: &str) -> usize {
    names(report).iter().filter(|n| n.as_str() == event).count()
}

fn login_page() -> FakePage {
    FakePage::new("https://app.test/login", "Login")
        .with(FakeElement::new("input").id("username"))
        .with(
            FakeElement::new("button")
                .id("submit")
                .text("Sign in")
                .on_click(FakeEffect::SetText {
                    target: "#out".into(),
                    text: "done".into(),
                }),
        )
        .with(FakeElement::new("div").id("out"))
}

fn on_login() -> ConditionSpec {
    ConditionSpec::url_matches("app\\.test/login")
}

fn login_flow() -> Vec<ActionSpec> {
    let username = TargetSpec::css("#username");
    let submit = TargetSpec::css("#submit");
    let out = TargetSpec::css("#out");
    vec![
        ActionSpec::new("user", ActionKind::Fill)
            .target(username.clone())
            .literal("demo")
            .critical()
            .precondition(ConditionSpec::element_visible(&username))
            .postcondition(ConditionSpec::value_equals(&username, "demo").critical()),
        ActionSpec::new("submit", ActionKind::Click)
            .target(submit.clone())
            .precondition(ConditionSpec::element_visible(&submit))
            .postcondition(ConditionSpec::text_contains(&out, "done")),
        ActionSpec::new("wait-done", ActionKind::WaitFor)
            .precondition(on_login())
            .postcondition(ConditionSpec::text_contains(&out, "done")),
        ActionSpec::new("check-done", ActionKind::Assert)
            .precondition(on_login())
            .assertion(ConditionSpec::text_contains(&out, "done")),
    ]
}

fn go_page() -> FakePage {
    FakePage::new("https://app.test/form", "Form")
        .with(
            FakeElement::new("button")
                .id("go")
                .text("Go")
                .on_click(FakeEffect::SetText {
                    target: "#out".into(),
                    text: "done".into(),
                }),
        )
        .with(FakeElement::new("div").id("out"))
}

fn click_go(target: TargetSpec) -> ActionSpec {
    ActionSpec::new("go", ActionKind::Click)
        .target(target)
        .precondition(ConditionSpec::url_matches("app\\.test/form"))
        .precondition(ConditionSpec::new(ConditionKind::NoBlockingOverlay))
        .postcondition(ConditionSpec::text_contains(&TargetSpec::css("#out"), "done"))
}

fn noop(id: &str) -> ActionSpec {
    ActionSpec::new(id, ActionKind::Noop).precondition(ConditionSpec::url_matches("app\\.test"))
}

fn duplicate_rows() -> (FakePage, ActionSpec) {
    let page = FakePage::new("https://app.test/list", "List")
        .with(FakeElement::new("li").test_id("row").text("a"))
        .with(FakeElement::new("li").test_id("row").text("b"));
    let rows = TargetSpec::test_id("row");
    let action = ActionSpec::new("pick-row", ActionKind::Click)
        .target(rows.clone())
        .precondition(ConditionSpec::count_equals(&rows, 1))
        .postcondition(ConditionSpec::new(ConditionKind::NetworkIdle));
    (page, action)
}

#[test]
fn login_flow_succeeds_with_minimal_trace() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir, fast_policy(RunMode::Deterministic));
    let mut browser = FakeBrowser::with_page(login_page());

    let report = engine
        .run(&mut browser, &login_flow(), RunId::from("login"))
        .unwrap();

    assert_eq!(report.status, RunStatus::Success, "{:?}", report.error);
    assert_eq!(report.steps_executed, 4);
    assert_eq!(report.actions_completed, 4);
    assert_eq!(report.retries_used, 0);
    assert_eq!(report.recovery_used, 0);
    assert_eq!(
        names(&report),
        vec![
            "run_started",
            "action_compiled",
            "action_compiled",
            "action_compiled",
            "postconditions_checked",
            "assert_checked",
            "run_finished",
        ]
    );
    let finished = events(&report).pop().unwrap();
    assert_eq!(finished.payload["status"], "success");

    assert_eq!(browser.element_by_id("username").unwrap().value, "demo");
    assert!(!browser.is_started());

    let manifest = load_manifest(&report.run_dir).unwrap();
    assert!(manifest.finalized);
    assert!(verify_manifest(&report.run_dir, &manifest).is_empty());
    assert!(manifest
        .items_for_step("000-a1")
        .any(|i| i.kind == EvidenceKind::HtmlFull));
    assert_eq!(manifest.metadata["status"], "success");
}

#[test]
fn literal_fill_value_never_reaches_the_trace() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir, fast_policy(RunMode::Deterministic));
    let mut browser = FakeBrowser::with_page(login_page());
    let report = engine
        .run(&mut browser, &login_flow(), RunId::from("login"))
        .unwrap();

    let fill = events(&report)
        .into_iter()
        .find(|e| e.action_id.as_deref() == Some("user"))
        .unwrap();
    assert_eq!(fill.payload["input"], "literal");
    assert!(!fill.payload.to_string().contains("demo"));
}

#[test]
fn ambiguous_target_fails_deterministic_run_with_full_evidence() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir, fast_policy(RunMode::Deterministic));
    let (page, action) = duplicate_rows();
    let mut browser = FakeBrowser::with_page(page);

    let report = engine
        .run(&mut browser, &[action], RunId::from("dupes"))
        .unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    let error = report.error.clone().unwrap();
    assert_eq!(error.code, ErrorCode::RecoveryExhausted);
    assert_eq!(error.details["last_code"], "TARGET_NOT_UNIQUE");
    assert_eq!(
        report.results[0].error.as_ref().map(|e| e.code),
        Some(ErrorCode::TargetNotUnique)
    );

    // 3 attempts, reload, 3 more attempts
    assert_eq!(report.steps_executed, 6);
    assert_eq!(report.retries_used, 4);
    assert_eq!(report.recovery_used, 1);
    assert_eq!(browser.reloads(), 1);
    assert_eq!(count(&report, "action_failed"), 6);
    assert_eq!(count(&report, "policy_limit_reached"), 1);
    assert_eq!(count(&report, "policy_halt"), 0);

    let manifest = load_manifest(&report.run_dir).unwrap();
    assert!(manifest
        .items
        .iter()
        .any(|i| i.kind == EvidenceKind::HtmlFull && i.step == "000-a6"));
}

#[test]
fn interactive_mode_halts_for_review() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir, fast_policy(RunMode::Interactive));
    let (page, action) = duplicate_rows();
    let mut browser = FakeBrowser::with_page(page);

    let report = engine
        .run(&mut browser, &[action], RunId::from("dupes"))
        .unwrap();

    assert_eq!(report.status, RunStatus::Halted);
    assert_eq!(report.halt_reason.as_deref(), Some("RECOVERY_EXHAUSTED"));
    let error = report.error.unwrap();
    assert_eq!(error.code, ErrorCode::PolicyHalt);
    assert_eq!(error.details["reason"], "RECOVERY_EXHAUSTED");
    let trace = read_trace(&report.run_dir).unwrap();
    let halt = trace.iter().find(|e| e.event == "policy_halt").unwrap();
    assert_eq!(halt.state, "HALT");
    assert_eq!(trace.last().unwrap().payload["status"], "halted");
}

#[test]
fn retries_follow_backoff_budget() {
    let dir = tempfile::tempdir().unwrap();
    let policy = PolicyConfig {
        retries_per_action: 1,
        recovery_max: 0,
        ..fast_policy(RunMode::Deterministic)
    };
    let engine = engine(&dir, policy);
    let (page, action) = duplicate_rows();
    let mut browser = FakeBrowser::with_page(page);

    let report = engine
        .run(&mut browser, &[action], RunId::from("budget"))
        .unwrap();

    assert_eq!(report.steps_executed, 2);
    assert_eq!(report.retries_used, 1);
    assert_eq!(report.recovery_used, 0);
    assert_eq!(count(&report, "retry_scheduled"), 1);
    assert_eq!(count(&report, "recovery_attempted"), 0);
    assert_eq!(browser.reloads(), 0);
}

#[test]
fn non_retryable_failure_stops_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir, fast_policy(RunMode::Interactive));
    let pin = TargetSpec::css("#pin");
    let page = FakePage::new("https://app.test/form", "Form").with(FakeElement::new("input").id("pin"));
    let mut browser = FakeBrowser::with_page(page);
    let actions = vec![
        ActionSpec::new("pin", ActionKind::Fill)
            .target(pin.clone())
            .secret("absent")
            .precondition(ConditionSpec::element_visible(&pin))
            .postcondition(ConditionSpec::value_equals(&pin, "1")),
        noop("after"),
    ];

    let report = engine
        .run(&mut browser, &actions, RunId::from("secret"))
        .unwrap();

    // non-retryable errors fail even in interactive mode
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(
        report.error.as_ref().map(|e| e.code),
        Some(ErrorCode::SecretUnavailable)
    );
    assert_eq!(report.steps_executed, 1);
    assert_eq!(report.results.len(), 1);
    assert_eq!(count(&report, "retry_scheduled"), 0);
}

#[test]
fn repeated_state_trips_anti_loop() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir, fast_policy(RunMode::Deterministic));
    let mut browser = FakeBrowser::with_page(go_page());
    let actions: Vec<ActionSpec> = (0..6).map(|i| noop(&format!("idle-{i}"))).collect();

    let report = engine
        .run(&mut browser, &actions, RunId::from("loop"))
        .unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    let error = report.error.unwrap();
    assert_eq!(error.code, ErrorCode::SameStateRevisit);
    assert_eq!(error.details["revisits"], 4);
    assert_eq!(report.actions_completed, 4);
}

#[test]
fn hard_cap_bounds_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let policy = PolicyConfig {
        hard_cap_steps: 2,
        ..fast_policy(RunMode::Interactive)
    };
    let engine = engine(&dir, policy);
    let mut browser = FakeBrowser::with_page(go_page());
    let actions = vec![noop("a"), noop("b"), noop("c")];

    let report = engine
        .run(&mut browser, &actions, RunId::from("cap"))
        .unwrap();

    assert_eq!(report.status, RunStatus::Halted);
    assert_eq!(report.halt_reason.as_deref(), Some("HARD_CAP_REACHED"));
    assert_eq!(report.steps_executed, 2);
    assert_eq!(report.actions_completed, 2);
}

#[test]
fn overlay_is_dismissed_then_action_retried() {
    let dir = tempfile::tempdir().unwrap();
    let policy = PolicyConfig {
        retries_per_action: 0,
        ..fast_policy(RunMode::Deterministic)
    };
    let engine = engine(&dir, policy);
    let page = go_page()
        .with(FakeElement::new("div").class("cookie-banner").blocking())
        .with(
            FakeElement::new("button")
                .text("Got it")
                .overlay_part()
                .on_click(FakeEffect::Hide {
                    target: ".cookie-banner".into(),
                }),
        );
    let mut browser = FakeBrowser::with_page(page);

    let report = engine
        .run(&mut browser, &[click_go(TargetSpec::css("#go"))], RunId::from("overlay"))
        .unwrap();

    assert_eq!(report.status, RunStatus::Success, "{:?}", report.error);
    assert_eq!(report.recovery_used, 1);
    let recovery = events(&report)
        .into_iter()
        .find(|e| e.event == "recovery_attempted")
        .unwrap();
    assert_eq!(recovery.payload["strategy"], "dismiss_overlay");
    assert_eq!(recovery.payload["ok"], true);
    assert_eq!(recovery.payload["detail"]["via"], "text:Got it");
}

#[test]
fn reload_clears_stuck_page_once() {
    let dir = tempfile::tempdir().unwrap();
    let policy = PolicyConfig {
        retries_per_action: 0,
        ..fast_policy(RunMode::Deterministic)
    };
    let engine = engine(&dir, policy);
    let mut browser = FakeBrowser::with_page(go_page());
    // only on the live page, so a reload drops it
    browser.insert_element(FakeElement::new("div").class("spinner-mask").blocking());

    let report = engine
        .run(&mut browser, &[click_go(TargetSpec::css("#go"))], RunId::from("reload"))
        .unwrap();

    assert_eq!(report.status, RunStatus::Success, "{:?}", report.error);
    assert_eq!(browser.reloads(), 1);
    let strategies: Vec<String> = events(&report)
        .into_iter()
        .filter(|e| e.event == "recovery_attempted")
        .map(|e| e.payload["strategy"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(strategies, vec!["reload"]);
}

#[test]
fn alternative_target_substitutes_after_reload_is_spent() {
    let dir = tempfile::tempdir().unwrap();
    let policy = PolicyConfig {
        retries_per_action: 0,
        allow_reload_once: false,
        ..fast_policy(RunMode::Deterministic)
    };
    let engine = engine(&dir, policy);
    let mut browser = FakeBrowser::with_page(go_page());
    let action = click_go(TargetSpec::css("#go-legacy")).alternative(TargetSpec::text("Go", true));

    let report = engine
        .run(&mut browser, &[action], RunId::from("alt"))
        .unwrap();

    assert_eq!(report.status, RunStatus::Success, "{:?}", report.error);
    assert_eq!(browser.element_by_id("out").unwrap().text, "done");
    let trace = events(&report);
    let failed = trace.iter().find(|e| e.event == "action_failed").unwrap();
    assert_eq!(failed.payload["code"], "TARGET_NOT_FOUND");
    let recovery = trace.iter().find(|e| e.event == "recovery_attempted").unwrap();
    assert_eq!(recovery.payload["strategy"], "alternative_target");
    let done = trace.iter().find(|e| e.event == "action_compiled").unwrap();
    assert_eq!(done.attempt, Some(2));
}

#[test]
fn personal_data_is_redacted_from_trace_and_dom() {
    const EMAIL: &str = "jane.doe@example.com";
    const SSN: &str = "123-45-6789";
    const TOKEN: &str = "abcdefghijklmnopqrstuvwxyz012345";

    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir, fast_policy(RunMode::Deterministic));
    let label = format!("{EMAIL} {SSN} {TOKEN}");
    let page = go_page().with(FakeElement::new("button").id("contact").text(&label));
    let mut browser = FakeBrowser::with_page(page);
    let action = ActionSpec::new("contact", ActionKind::Click)
        .target(TargetSpec::text(label.as_str(), true))
        .precondition(ConditionSpec::url_matches("app\\.test/form"))
        .postcondition(ConditionSpec::new(ConditionKind::NetworkIdle));

    let report = engine
        .run(&mut browser, &[action], RunId::from("pii"))
        .unwrap();
    assert_eq!(report.status, RunStatus::Success, "{:?}", report.error);

    let trace = std::fs::read_to_string(RunLayout::at(&report.run_dir).trace_path()).unwrap();
    let mut persisted = vec![trace];
    collect_files(&report.run_dir.join("evidence").join("dom"), &mut persisted);
    assert!(persisted.len() >= 3);
    for text in &persisted {
        for raw in [EMAIL, SSN, TOKEN] {
            assert!(!text.contains(raw), "{raw} leaked");
        }
    }

    let manifest = load_manifest(&report.run_dir).unwrap();
    assert!(manifest.redaction.count("email") > 0);
    assert!(manifest.redaction.count("national_id") > 0);
    assert!(manifest.redaction.count("opaque_token") > 0);
}

#[test]
fn full_captures_of_critical_step_carry_no_personal_data() {
    const EMAIL: &str = "jane.doe@example.com";
    const SSN: &str = "123-45-6789";
    const TOKEN: &str = "abcdefghijklmnopqrstuvwxyz012345";

    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir, fast_policy(RunMode::Deterministic));
    let label = format!("{EMAIL} {SSN} {TOKEN}");
    let page = go_page()
        .with(
            FakeElement::new("button")
                .id("contact")
                .text(&label)
                .on_click(FakeEffect::SetText {
                    target: "#out".into(),
                    text: "done".into(),
                }),
        )
        .with(FakeElement::new("p").id("note").text(&label));
    let mut browser = FakeBrowser::with_page(page);
    let action = ActionSpec::new("contact", ActionKind::Click)
        .target(TargetSpec::css("#contact"))
        .critical()
        .precondition(ConditionSpec::url_matches("app\\.test/form"))
        .postcondition(ConditionSpec::text_contains(&TargetSpec::css("#out"), "done").critical());

    let report = engine
        .run(&mut browser, &[action], RunId::from("pii-full"))
        .unwrap();
    assert_eq!(report.status, RunStatus::Success, "{:?}", report.error);

    let manifest = load_manifest(&report.run_dir).unwrap();
    assert!(manifest
        .items
        .iter()
        .any(|i| i.kind == EvidenceKind::HtmlFull));

    let evidence = report.run_dir.join("evidence");
    let mut html = Vec::new();
    collect_bytes(&evidence.join("html"), &mut html);
    let mut shots = Vec::new();
    collect_bytes(&evidence.join("shots"), &mut shots);
    assert!(!html.is_empty());
    assert!(shots.iter().any(|(name, _)| name.ends_with(".png")));
    for (name, bytes) in html.iter().chain(shots.iter()) {
        let text = String::from_utf8_lossy(bytes);
        for raw in [EMAIL, SSN, TOKEN] {
            assert!(!text.contains(raw), "{raw} leaked into {name}");
        }
    }
}

#[test]
fn duplicate_action_ids_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir, PolicyConfig::default());
    let err = engine.validate(&[noop("same"), noop("same")]).unwrap_err();
    assert!(matches!(err, FlowError::InvalidFlow(_)));
    assert!(!err.is_retryable());
    assert!(engine.validate(&login_flow()).is_ok());
}

fn collect_files(dir: &Path, out: &mut Vec<String>) {
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        out.push(std::fs::read_to_string(&path).unwrap());
    }
}

fn collect_bytes(dir: &Path, out: &mut Vec<(String, Vec<u8>)>) {
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        out.push((name, std::fs::read(&path).unwrap()));
    }
}
