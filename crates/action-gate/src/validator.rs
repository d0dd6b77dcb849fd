//! Condition evaluator

use crate::{conditions::*, errors::GateError, types::*};
use action_locator::{resolve, LocatorError, TargetSpec};
use serde_json::{json, Value};
use std::time::Duration;
use stepwright_core_types::ErrorCode;
use stepwright_driver::{BrowserDriver, ElementHandle, LoadState, Locator};
use tracing::{debug, warn};
use url::Url;

/// Selectors treated as blocking overlays when a condition names none
pub const DEFAULT_OVERLAY_SELECTORS: &[&str] = &[
    "[data-blocking=true]",
    "[aria-modal=true]",
    ".modal-backdrop",
    ".cookie-banner",
    "dialog[open]",
];

/// Selectors searched by `toast_contains` when a condition names none
pub const DEFAULT_TOAST_SELECTORS: &[&str] = &[
    "[role=alert]",
    "[role=status]",
    ".toast",
    ".notification",
];

/// Read-only evaluator over the closed condition vocabulary.
///
/// Never fails: resolution and driver errors are folded into the outcome
/// details so the caller can type the failure.
#[derive(Debug, Clone)]
pub struct ConditionEvaluator {
    overlay_selectors: Vec<String>,
    toast_selectors: Vec<String>,
    network_idle_timeout: Duration,
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self {
            overlay_selectors: DEFAULT_OVERLAY_SELECTORS.iter().map(|s| s.to_string()).collect(),
            toast_selectors: DEFAULT_TOAST_SELECTORS.iter().map(|s| s.to_string()).collect(),
            network_idle_timeout: Duration::from_millis(5_000),
        }
    }
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overlay_selectors(mut self, selectors: Vec<String>) -> Self {
        if !selectors.is_empty() {
            self.overlay_selectors = selectors;
        }
        self
    }

    pub fn with_network_idle_timeout(mut self, timeout: Duration) -> Self {
        self.network_idle_timeout = timeout;
        self
    }

    /// Evaluate one condition. `default_target` is the owning action's
    /// effective target, used by element conditions without their own.
    pub fn evaluate(
        &self,
        driver: &dyn BrowserDriver,
        spec: &ConditionSpec,
        default_target: Option<&TargetSpec>,
    ) -> ConditionOutcome {
        match self.check(driver, spec, default_target) {
            Ok((ok, details)) => {
                debug!(kind = %spec.kind, ok, "condition evaluated");
                ConditionOutcome::new(spec, ok, details)
            }
            Err(err) => {
                warn!(kind = %spec.kind, error = %err, "condition could not be evaluated");
                let mut details = json!({
                    "code": err.code(),
                    "error": err.to_string(),
                });
                if let GateError::Locator(LocatorError::NotUnique { count, .. }) = &err {
                    details["count"] = json!(count);
                }
                ConditionOutcome::new(spec, false, details)
            }
        }
    }

    /// Evaluate every condition in order
    pub fn evaluate_all(
        &self,
        driver: &dyn BrowserDriver,
        specs: &[ConditionSpec],
        default_target: Option<&TargetSpec>,
    ) -> Vec<ConditionOutcome> {
        specs
            .iter()
            .map(|spec| self.evaluate(driver, spec, default_target))
            .collect()
    }

    fn check(
        &self,
        driver: &dyn BrowserDriver,
        spec: &ConditionSpec,
        default_target: Option<&TargetSpec>,
    ) -> Result<(bool, Value), GateError> {
        match spec.kind {
            ConditionKind::UrlEquals => {
                let expected = spec.str_arg("url")?;
                let actual = driver.url()?;
                let ok = normalize_url(&actual) == normalize_url(expected);
                Ok((ok, json!({ "expected": expected, "actual": actual })))
            }
            ConditionKind::UrlMatches => {
                let pattern = spec.regex("pattern")?;
                let actual = driver.url()?;
                Ok((
                    pattern.is_match(&actual),
                    json!({ "pattern": pattern.as_str(), "actual": actual }),
                ))
            }
            ConditionKind::HostAllowlist => {
                let hosts = spec.str_list("hosts")?;
                let actual = driver.url()?;
                let host = Url::parse(&actual)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_ascii_lowercase));
                let ok = host.as_deref().is_some_and(|host| {
                    hosts.iter().any(|allowed| {
                        let allowed = allowed.to_ascii_lowercase();
                        host == allowed || host.ends_with(&format!(".{allowed}"))
                    })
                });
                Ok((ok, json!({ "host": host, "allowed": hosts })))
            }
            ConditionKind::TitleContains => {
                let text = spec.str_arg("text")?;
                let title = driver.title()?;
                Ok((title.contains(text), json!({ "text": text, "title": title })))
            }
            ConditionKind::NetworkIdle => {
                let timeout = spec
                    .args
                    .get("timeout_ms")
                    .and_then(Value::as_u64)
                    .map(Duration::from_millis)
                    .unwrap_or(self.network_idle_timeout);
                match driver.wait_for_load_state(LoadState::NetworkIdle, timeout) {
                    Ok(()) => Ok((true, json!({ "timeout_ms": timeout.as_millis() as u64 }))),
                    Err(err) if err.is_timeout() => Ok((
                        false,
                        json!({ "timeout_ms": timeout.as_millis() as u64, "error": err.to_string() }),
                    )),
                    Err(err) => Err(err.into()),
                }
            }
            ConditionKind::NoBlockingOverlay => {
                let selectors = self.selectors(spec, &self.overlay_selectors)?;
                for selector in &selectors {
                    let visible = visible_matches(driver, selector)?;
                    if !visible.is_empty() {
                        return Ok((
                            false,
                            json!({ "code": ErrorCode::BlockingOverlay, "selector": selector, "count": visible.len() }),
                        ));
                    }
                }
                Ok((true, json!({ "checked": selectors.len() })))
            }
            ConditionKind::ToastContains => {
                let text = spec.str_arg("text")?;
                let selectors = self.selectors(spec, &self.toast_selectors)?;
                for selector in &selectors {
                    for handle in visible_matches(driver, selector)? {
                        if driver.inner_text(&handle)?.contains(text) {
                            return Ok((true, json!({ "text": text, "selector": selector })));
                        }
                    }
                }
                Ok((false, json!({ "text": text })))
            }
            ConditionKind::ElementCountEquals => {
                let target = effective_target(spec, default_target)?;
                let expected = spec.u64_arg("count")?;
                let actual = resolve(&target)?.count(driver)? as u64;
                let mut details = json!({
                    "target": target.to_string(),
                    "expected": expected,
                    "actual": actual,
                });
                if expected == 1 && actual != 1 {
                    details["code"] = json!(if actual == 0 {
                        ErrorCode::TargetNotFound
                    } else {
                        ErrorCode::TargetNotUnique
                    });
                }
                Ok((expected == actual, details))
            }
            ConditionKind::ElementExists => {
                let target = effective_target(spec, default_target)?;
                unique(driver, &target)?;
                Ok((true, json!({ "target": target.to_string() })))
            }
            ConditionKind::ElementVisible => {
                let target = effective_target(spec, default_target)?;
                let el = unique(driver, &target)?;
                let visible = driver.is_visible(&el)?;
                Ok((visible, json!({ "target": target.to_string(), "visible": visible })))
            }
            ConditionKind::ElementEnabled => {
                let target = effective_target(spec, default_target)?;
                let el = unique(driver, &target)?;
                let enabled = driver.is_enabled(&el)?;
                Ok((enabled, json!({ "target": target.to_string(), "enabled": enabled })))
            }
            ConditionKind::ElementClickable => {
                let target = effective_target(spec, default_target)?;
                let el = unique(driver, &target)?;
                let visible = driver.is_visible(&el)?;
                let enabled = driver.is_enabled(&el)?;
                Ok((
                    visible && enabled,
                    json!({ "target": target.to_string(), "visible": visible, "enabled": enabled }),
                ))
            }
            ConditionKind::ElementTextContains => {
                let target = effective_target(spec, default_target)?;
                let text = spec.str_arg("text")?;
                let el = unique(driver, &target)?;
                let actual = collapse_whitespace(&driver.inner_text(&el)?);
                Ok((
                    actual.contains(&collapse_whitespace(text)),
                    json!({ "target": target.to_string(), "text": text, "actual": actual }),
                ))
            }
            ConditionKind::ElementAttributeEquals => {
                let target = effective_target(spec, default_target)?;
                let name = spec.str_arg("name")?;
                let expected = spec.str_arg("value")?;
                let el = unique(driver, &target)?;
                let actual = driver.attribute(&el, name)?;
                Ok((
                    actual.as_deref() == Some(expected),
                    json!({ "target": target.to_string(), "name": name, "expected": expected, "actual": actual }),
                ))
            }
            ConditionKind::ElementValueEquals => {
                let target = effective_target(spec, default_target)?;
                let expected = spec.str_arg("value")?;
                let el = unique(driver, &target)?;
                let actual = driver.input_value(&el)?;
                // Form values may be secrets; only lengths are reported.
                Ok((
                    actual == expected,
                    json!({ "target": target.to_string(), "expected_len": expected.len(), "actual_len": actual.len() }),
                ))
            }
            ConditionKind::DownloadStarted => {
                let downloads = driver.downloads()?;
                let ok = match spec.opt_str_arg("filename_pattern")? {
                    Some(_) => {
                        let pattern = spec.regex("filename_pattern")?;
                        downloads.iter().any(|name| pattern.is_match(name))
                    }
                    None => !downloads.is_empty(),
                };
                Ok((ok, json!({ "downloads": downloads.len() })))
            }
            ConditionKind::UploadCompleted => {
                let target = effective_target(spec, None)?;
                let min_files = spec.args.get("min_files").and_then(Value::as_u64).unwrap_or(1);
                let el = unique(driver, &target)?;
                let files = driver.input_files(&el)?;
                Ok((
                    files.len() as u64 >= min_files,
                    json!({ "target": target.to_string(), "files": files.len(), "min_files": min_files }),
                ))
            }
        }
    }

    fn selectors(&self, spec: &ConditionSpec, defaults: &[String]) -> Result<Vec<String>, GateError> {
        if spec.args.contains_key("selectors") {
            spec.str_list("selectors")
        } else {
            Ok(defaults.to_vec())
        }
    }
}

fn effective_target(
    spec: &ConditionSpec,
    default_target: Option<&TargetSpec>,
) -> Result<TargetSpec, GateError> {
    match spec.target()? {
        Some(target) => Ok(target),
        None => default_target
            .cloned()
            .ok_or_else(|| GateError::NoTarget(spec.kind.to_string())),
    }
}

/// Exactly one match right now, without waiting
fn unique(driver: &dyn BrowserDriver, target: &TargetSpec) -> Result<ElementHandle, GateError> {
    let mut handles = resolve(target)?.handles(driver)?;
    match handles.len() {
        0 => Err(LocatorError::NotFound(target.to_string()).into()),
        1 => Ok(handles.remove(0)),
        count => Err(LocatorError::NotUnique {
            target: target.to_string(),
            count,
        }
        .into()),
    }
}

fn visible_matches(driver: &dyn BrowserDriver, selector: &str) -> Result<Vec<ElementHandle>, GateError> {
    let mut visible = Vec::new();
    for handle in driver.query(&[], &Locator::css(selector))? {
        if driver.is_visible(&handle)? {
            visible.push(handle);
        }
    }
    Ok(visible)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stepwright_core_types::Severity;
    use stepwright_driver::fake::{FakeBrowser, FakeElement, FakePage};

    fn browser() -> FakeBrowser {
        let page = FakePage::new("https://app.test/dashboard?tab=1", "Dashboard - App")
            .with(FakeElement::new("input").id("username").value("demo"))
            .with(FakeElement::new("button").id("save").text("Save").disabled())
            .with(FakeElement::new("div").id("out").text("  all   done "))
            .with(FakeElement::new("li").test_id("row"))
            .with(FakeElement::new("li").test_id("row"))
            .with(FakeElement::new("div").attr("role", "alert").text("Saved successfully"))
            .with(
                FakeElement::new("input")
                    .id("file")
                    .input_type("file"),
            );
        let mut browser = FakeBrowser::with_page(page);
        browser.start().unwrap();
        browser
    }

    fn eval(browser: &FakeBrowser, spec: ConditionSpec) -> ConditionOutcome {
        ConditionEvaluator::new().evaluate(browser, &spec, None)
    }

    #[test]
    fn test_navigation_conditions() {
        let browser = browser();
        assert!(eval(&browser, ConditionSpec::url_equals("https://app.test/dashboard?tab=1#x")).ok);
        assert!(eval(&browser, ConditionSpec::url_matches(r"/dashboard\?tab=\d")).ok);
        assert!(!eval(&browser, ConditionSpec::url_equals("https://app.test/")).ok);

        let hosts = ConditionSpec::new(ConditionKind::HostAllowlist).arg("hosts", json!(["test"]));
        assert!(eval(&browser, hosts).ok);
        let hosts = ConditionSpec::new(ConditionKind::HostAllowlist).arg("hosts", json!(["other.test"]));
        assert!(!eval(&browser, hosts).ok);

        let title = ConditionSpec::new(ConditionKind::TitleContains).arg("text", "Dashboard");
        assert!(eval(&browser, title).ok);
        let toast = ConditionSpec::new(ConditionKind::ToastContains).arg("text", "Saved");
        assert!(eval(&browser, toast).ok);
        assert!(eval(&browser, ConditionSpec::new(ConditionKind::NoBlockingOverlay)).ok);
    }

    #[test]
    fn test_network_idle_timeout_is_a_failed_outcome() {
        let mut browser = browser();
        browser.failures.network_idle_timeout = true;
        let outcome = eval(&browser, ConditionSpec::new(ConditionKind::NetworkIdle));
        assert!(!outcome.ok);
        assert!(outcome.code().is_none());
    }

    #[test]
    fn test_element_conditions() {
        let browser = browser();
        let out = TargetSpec::css("#out");
        assert!(eval(&browser, ConditionSpec::text_contains(&out, "all done")).ok);
        assert!(eval(&browser, ConditionSpec::value_equals(&TargetSpec::css("#username"), "demo")).ok);

        let save = TargetSpec::css("#save");
        assert!(eval(&browser, ConditionSpec::element_visible(&save)).ok);
        let clickable = ConditionSpec::new(ConditionKind::ElementClickable).with_target(&save);
        assert!(!eval(&browser, clickable).ok);
    }

    #[test]
    fn test_ambiguous_targets_are_reported_structurally() {
        let browser = browser();
        let rows = TargetSpec::test_id("row");

        let outcome = eval(&browser, ConditionSpec::element_visible(&rows));
        assert!(!outcome.ok);
        assert_eq!(outcome.code(), Some(ErrorCode::TargetNotUnique));
        assert_eq!(outcome.details["count"], 2);

        let outcome = eval(&browser, ConditionSpec::count_equals(&rows, 1));
        assert_eq!(outcome.code(), Some(ErrorCode::TargetNotUnique));
        assert!(eval(&browser, ConditionSpec::count_equals(&rows, 2)).ok);

        let outcome = eval(&browser, ConditionSpec::element_exists(&TargetSpec::css("#nope")));
        assert_eq!(outcome.code(), Some(ErrorCode::TargetNotFound));
    }

    #[test]
    fn test_element_condition_falls_back_to_action_target() {
        let browser = browser();
        let spec = ConditionSpec::new(ConditionKind::ElementVisible).with_severity(Severity::Warning);
        let target = TargetSpec::css("#out");
        let outcome = ConditionEvaluator::new().evaluate(&browser, &spec, Some(&target));
        assert!(outcome.ok);

        let orphan = ConditionEvaluator::new().evaluate(&browser, &spec, None);
        assert_eq!(orphan.code(), Some(ErrorCode::InvalidActionspec));
        assert!(!orphan.is_blocking());
    }

    #[test]
    fn test_value_details_never_echo_the_value() {
        let browser = browser();
        let outcome = eval(
            &browser,
            ConditionSpec::value_equals(&TargetSpec::css("#username"), "hunter2"),
        );
        assert!(!outcome.ok);
        assert!(!outcome.details.to_string().contains("hunter2"));
        assert!(!outcome.details.to_string().contains("demo"));
    }

    #[test]
    fn test_completion_conditions() {
        let mut browser = browser();
        let file = TargetSpec::css("#file");
        let upload = ConditionSpec::new(ConditionKind::UploadCompleted).with_target(&file);
        assert!(!eval(&browser, upload.clone()).ok);

        let handle = browser.query(&[], &Locator::css("#file")).unwrap().remove(0);
        browser
            .set_input_files(&handle, &[std::path::PathBuf::from("/tmp/report.pdf")])
            .unwrap();
        assert!(eval(&browser, upload).ok);

        let download = ConditionSpec::new(ConditionKind::DownloadStarted)
            .arg("filename_pattern", r"\.csv$");
        assert!(!eval(&browser, download).ok);
    }
}
