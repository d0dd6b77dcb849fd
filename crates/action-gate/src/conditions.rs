//! Condition vocabulary

use action_locator::TargetSpec;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use stepwright_core_types::Severity;

use crate::errors::GateError;

/// Closed condition vocabulary.
///
/// Three families: navigation state, single-element state, and completion
/// signals (downloads, uploads).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    // navigation
    UrlEquals,
    UrlMatches,
    HostAllowlist,
    TitleContains,
    NetworkIdle,
    NoBlockingOverlay,
    ToastContains,

    // element
    ElementExists,
    ElementVisible,
    ElementEnabled,
    ElementClickable,
    #[serde(alias = "count_equals")]
    ElementCountEquals,
    ElementTextContains,
    ElementAttributeEquals,
    ElementValueEquals,

    // completion
    DownloadStarted,
    UploadCompleted,
}

impl ConditionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionKind::UrlEquals => "url_equals",
            ConditionKind::UrlMatches => "url_matches",
            ConditionKind::HostAllowlist => "host_allowlist",
            ConditionKind::TitleContains => "title_contains",
            ConditionKind::NetworkIdle => "network_idle",
            ConditionKind::NoBlockingOverlay => "no_blocking_overlay",
            ConditionKind::ToastContains => "toast_contains",
            ConditionKind::ElementExists => "element_exists",
            ConditionKind::ElementVisible => "element_visible",
            ConditionKind::ElementEnabled => "element_enabled",
            ConditionKind::ElementClickable => "element_clickable",
            ConditionKind::ElementCountEquals => "element_count_equals",
            ConditionKind::ElementTextContains => "element_text_contains",
            ConditionKind::ElementAttributeEquals => "element_attribute_equals",
            ConditionKind::ElementValueEquals => "element_value_equals",
            ConditionKind::DownloadStarted => "download_started",
            ConditionKind::UploadCompleted => "upload_completed",
        }
    }

    /// Kinds that operate on a target element
    pub fn is_element(&self) -> bool {
        matches!(
            self,
            ConditionKind::ElementExists
                | ConditionKind::ElementVisible
                | ConditionKind::ElementEnabled
                | ConditionKind::ElementClickable
                | ConditionKind::ElementCountEquals
                | ConditionKind::ElementTextContains
                | ConditionKind::ElementAttributeEquals
                | ConditionKind::ElementValueEquals
        )
    }

    /// Arguments that must be present
    fn required_args(&self) -> &'static [&'static str] {
        match self {
            ConditionKind::UrlEquals => &["url"],
            ConditionKind::UrlMatches => &["pattern"],
            ConditionKind::HostAllowlist => &["hosts"],
            ConditionKind::TitleContains
            | ConditionKind::ToastContains
            | ConditionKind::ElementTextContains => &["text"],
            ConditionKind::ElementCountEquals => &["count"],
            ConditionKind::ElementAttributeEquals => &["name", "value"],
            ConditionKind::ElementValueEquals => &["value"],
            ConditionKind::UploadCompleted => &["target"],
            _ => &[],
        }
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One predicate over current browser state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSpec {
    pub kind: ConditionKind,

    #[serde(default)]
    pub args: BTreeMap<String, Value>,

    #[serde(default)]
    pub severity: Severity,
}

impl ConditionSpec {
    pub fn new(kind: ConditionKind) -> Self {
        Self {
            kind,
            args: BTreeMap::new(),
            severity: Severity::default(),
        }
    }

    pub fn arg(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.args.insert(name.to_string(), value.into());
        self
    }

    pub fn with_target(self, target: &TargetSpec) -> Self {
        let value = serde_json::to_value(target).unwrap_or(Value::Null);
        self.arg("target", value)
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn critical(self) -> Self {
        self.with_severity(Severity::Critical)
    }

    pub fn url_equals(url: &str) -> Self {
        Self::new(ConditionKind::UrlEquals).arg("url", url)
    }

    pub fn url_matches(pattern: &str) -> Self {
        Self::new(ConditionKind::UrlMatches).arg("pattern", pattern)
    }

    pub fn element_exists(target: &TargetSpec) -> Self {
        Self::new(ConditionKind::ElementExists).with_target(target)
    }

    pub fn element_visible(target: &TargetSpec) -> Self {
        Self::new(ConditionKind::ElementVisible).with_target(target)
    }

    pub fn count_equals(target: &TargetSpec, count: u64) -> Self {
        Self::new(ConditionKind::ElementCountEquals)
            .with_target(target)
            .arg("count", count)
    }

    pub fn text_contains(target: &TargetSpec, text: &str) -> Self {
        Self::new(ConditionKind::ElementTextContains)
            .with_target(target)
            .arg("text", text)
    }

    pub fn value_equals(target: &TargetSpec, value: &str) -> Self {
        Self::new(ConditionKind::ElementValueEquals)
            .with_target(target)
            .arg("value", value)
    }

    /// Strong postconditions prove an action had its intended effect.
    ///
    /// Exact or pattern URL matches and completion signals always qualify;
    /// text and attribute matches qualify only at critical severity.
    pub fn is_strong(&self) -> bool {
        match self.kind {
            ConditionKind::UrlEquals
            | ConditionKind::UrlMatches
            | ConditionKind::DownloadStarted
            | ConditionKind::UploadCompleted => true,
            ConditionKind::ElementTextContains
            | ConditionKind::ElementAttributeEquals
            | ConditionKind::ElementValueEquals
            | ConditionKind::ToastContains
            | ConditionKind::TitleContains => self.severity == Severity::Critical,
            _ => false,
        }
    }

    /// Static check of arguments.
    ///
    /// `has_default_target` tells whether the owning action carries a target
    /// element conditions can fall back to.
    pub fn validate(&self, has_default_target: bool) -> Result<(), GateError> {
        for arg in self.kind.required_args() {
            if !self.args.contains_key(*arg) {
                return Err(self.missing(arg));
            }
        }
        if self.kind.is_element() && !self.args.contains_key("target") && !has_default_target {
            return Err(GateError::NoTarget(self.kind.to_string()));
        }
        if self.args.contains_key("target") {
            self.target()?;
        }
        match self.kind {
            ConditionKind::UrlMatches => {
                self.regex("pattern")?;
            }
            ConditionKind::DownloadStarted if self.args.contains_key("filename_pattern") => {
                self.regex("filename_pattern")?;
            }
            ConditionKind::HostAllowlist => {
                self.str_list("hosts")?;
            }
            ConditionKind::ElementCountEquals => {
                self.u64_arg("count")?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Explicit `target` argument, if any
    pub fn target(&self) -> Result<Option<TargetSpec>, GateError> {
        match self.args.get("target") {
            None | Some(Value::Null) => Ok(None),
            Some(raw) => serde_json::from_value(raw.clone())
                .map(Some)
                .map_err(|err| self.invalid("target", err.to_string())),
        }
    }

    pub(crate) fn str_arg(&self, name: &str) -> Result<&str, GateError> {
        match self.args.get(name) {
            None => Err(self.missing(name)),
            Some(Value::String(value)) => Ok(value),
            Some(other) => Err(self.invalid(name, format!("expected string, got {other}"))),
        }
    }

    pub(crate) fn opt_str_arg(&self, name: &str) -> Result<Option<&str>, GateError> {
        match self.args.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.str_arg(name).map(Some),
        }
    }

    pub(crate) fn u64_arg(&self, name: &str) -> Result<u64, GateError> {
        match self.args.get(name) {
            None => Err(self.missing(name)),
            Some(value) => value
                .as_u64()
                .ok_or_else(|| self.invalid(name, format!("expected non-negative integer, got {value}"))),
        }
    }

    pub(crate) fn str_list(&self, name: &str) -> Result<Vec<String>, GateError> {
        match self.args.get(name) {
            None => Err(self.missing(name)),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| self.invalid(name, "expected a list of strings".into()))
                })
                .collect(),
            Some(Value::String(single)) => Ok(vec![single.clone()]),
            Some(_) => Err(self.invalid(name, "expected a list of strings".into())),
        }
    }

    pub(crate) fn regex(&self, name: &str) -> Result<Regex, GateError> {
        let pattern = self.str_arg(name)?;
        Regex::new(pattern).map_err(|err| self.invalid(name, err.to_string()))
    }

    fn missing(&self, arg: &str) -> GateError {
        GateError::MissingArgument {
            kind: self.kind.to_string(),
            arg: arg.to_string(),
        }
    }

    fn invalid(&self, arg: &str, reason: String) -> GateError {
        GateError::InvalidArgument {
            kind: self.kind.to_string(),
            arg: arg.to_string(),
            reason,
        }
    }
}
