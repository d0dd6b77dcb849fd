//! Declarative action description

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;

use action_gate::ConditionSpec;
use action_locator::TargetSpec;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::SpecError;

/// Closed set of action kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Navigate,
    Click,
    Fill,
    WaitFor,
    Assert,
    Upload,
    Noop,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Navigate => "navigate",
            ActionKind::Click => "click",
            ActionKind::Fill => "fill",
            ActionKind::WaitFor => "wait_for",
            ActionKind::Assert => "assert",
            ActionKind::Upload => "upload",
            ActionKind::Noop => "noop",
        }
    }

    /// Kinds that act on exactly one element
    pub fn needs_element(&self) -> bool {
        matches!(self, ActionKind::Click | ActionKind::Fill | ActionKind::Upload)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    #[default]
    Normal,
    Critical,
}

/// Where a fill value comes from.
///
/// Secrets are looked up by name at execution time; only the name is ever
/// recorded.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ValueSource {
    Literal { value: String },
    Secret { name: String },
}

impl ValueSource {
    /// Label safe for traces: `literal` or `secret:<name>`
    pub fn label(&self) -> String {
        match self {
            ValueSource::Literal { .. } => "literal".to_string(),
            ValueSource::Secret { name } => format!("secret:{name}"),
        }
    }
}

impl fmt::Debug for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Literal { value } => write!(f, "Literal(<{} chars>)", value.chars().count()),
            ValueSource::Secret { name } => write!(f, "Secret({name})"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ValueSource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<PathBuf>,
}

/// One automation step plus the conditions that guard and verify it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub id: String,
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetSpec>,
    #[serde(default)]
    pub input: ActionInput,
    #[serde(default)]
    pub preconditions: Vec<ConditionSpec>,
    #[serde(default)]
    pub postconditions: Vec<ConditionSpec>,
    #[serde(default)]
    pub assertions: Vec<ConditionSpec>,
    /// Falls back to the compiler's default timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub criticality: Criticality,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    /// Substitutes tried in order by recovery
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternative_targets: Vec<TargetSpec>,
}

impl ActionSpec {
    pub fn new(id: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            id: id.into(),
            kind,
            target: None,
            input: ActionInput::default(),
            preconditions: Vec::new(),
            postconditions: Vec::new(),
            assertions: Vec::new(),
            timeout_ms: None,
            criticality: Criticality::Normal,
            metadata: BTreeMap::new(),
            alternative_targets: Vec::new(),
        }
    }

    pub fn target(mut self, target: TargetSpec) -> Self {
        self.target = Some(target);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.input.url = Some(url.into());
        self
    }

    pub fn literal(mut self, value: impl Into<String>) -> Self {
        self.input.value = Some(ValueSource::Literal {
            value: value.into(),
        });
        self
    }

    pub fn secret(mut self, name: impl Into<String>) -> Self {
        self.input.value = Some(ValueSource::Secret { name: name.into() });
        self
    }

    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.input.files.push(path.into());
        self
    }

    pub fn precondition(mut self, condition: ConditionSpec) -> Self {
        self.preconditions.push(condition);
        self
    }

    pub fn postcondition(mut self, condition: ConditionSpec) -> Self {
        self.postconditions.push(condition);
        self
    }

    pub fn assertion(mut self, condition: ConditionSpec) -> Self {
        self.assertions.push(condition);
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn critical(mut self) -> Self {
        self.criticality = Criticality::Critical;
        self
    }

    pub fn alternative(mut self, target: TargetSpec) -> Self {
        self.alternative_targets.push(target);
        self
    }

    pub fn is_critical(&self) -> bool {
        self.criticality == Criticality::Critical
    }

    /// Check shape and guard rules without touching a browser
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.id.trim().is_empty() {
            return Err(SpecError::EmptyId);
        }
        if self.timeout_ms == Some(0) {
            return Err(SpecError::ZeroTimeout(self.id.clone()));
        }

        if self.preconditions.is_empty() {
            return Err(self.missing("at least one precondition"));
        }
        match self.kind {
            ActionKind::Noop => {}
            ActionKind::Assert => {
                if self.assertions.is_empty() && self.postconditions.is_empty() {
                    return Err(self.missing("assertions or postconditions"));
                }
            }
            _ => {
                if self.postconditions.is_empty() {
                    return Err(self.missing("at least one postcondition"));
                }
            }
        }
        if self.is_critical() && !self.postconditions.iter().any(ConditionSpec::is_strong) {
            return Err(SpecError::NoStrongPostcondition(self.id.clone()));
        }

        self.validate_targets()?;
        self.validate_input()?;

        let has_target = self.target.as_ref().is_some_and(|t| !t.is_url());
        for (list, conditions) in [
            ("preconditions", &self.preconditions),
            ("postconditions", &self.postconditions),
            ("assertions", &self.assertions),
        ] {
            for (index, condition) in conditions.iter().enumerate() {
                condition
                    .validate(has_target)
                    .map_err(|source| SpecError::Condition {
                        action: self.id.clone(),
                        list,
                        index,
                        source,
                    })?;
            }
        }
        Ok(())
    }

    fn validate_targets(&self) -> Result<(), SpecError> {
        let check = |target: &TargetSpec| {
            target.validate().map_err(|source| SpecError::Target {
                action: self.id.clone(),
                source,
            })?;
            if target.is_url() && self.kind != ActionKind::Navigate {
                return Err(SpecError::UrlTarget {
                    action: self.id.clone(),
                    kind: self.kind.to_string(),
                });
            }
            Ok(())
        };
        if let Some(target) = &self.target {
            check(target)?;
        } else if self.kind.needs_element() {
            return Err(self.missing("a target"));
        }
        self.alternative_targets.iter().try_for_each(check)
    }

    fn validate_input(&self) -> Result<(), SpecError> {
        match self.kind {
            ActionKind::Navigate if self.navigation_url().is_none() => {
                Err(self.missing("input.url or a url target"))
            }
            ActionKind::Fill if self.input.value.is_none() => Err(self.missing("input.value")),
            ActionKind::Upload if self.input.files.is_empty() => Err(self.missing("input.files")),
            _ => Ok(()),
        }
    }

    /// Destination of a navigate action
    pub fn navigation_url(&self) -> Option<&str> {
        if let Some(url) = self.input.url.as_deref().filter(|u| !u.trim().is_empty()) {
            return Some(url);
        }
        match &self.target {
            Some(TargetSpec::Url { url }) => Some(url),
            _ => None,
        }
    }

    fn missing(&self, field: &'static str) -> SpecError {
        SpecError::MissingField {
            action: self.id.clone(),
            kind: self.kind.to_string(),
            field,
        }
    }
}

/// Validate every action and reject duplicate ids
pub fn validate_flow(actions: &[ActionSpec]) -> Result<(), SpecError> {
    let mut seen = HashSet::new();
    for action in actions {
        action.validate()?;
        if !seen.insert(action.id.as_str()) {
            return Err(SpecError::DuplicateId(action.id.clone()));
        }
    }
    Ok(())
}
