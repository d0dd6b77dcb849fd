//! Core types for target resolution

use serde::{Deserialize, Serialize};
use std::fmt;
use stepwright_driver::Locator;

use crate::errors::LocatorError;

/// Declarative element target.
///
/// Recursive: `frame` wraps the target resolved inside the nested document,
/// `nth` wraps the base set it indexes into. `url` describes a navigation
/// destination and is rejected by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetSpec {
    Css {
        selector: String,
    },
    Xpath {
        expression: String,
    },
    Text {
        text: String,
        #[serde(default)]
        exact: bool,
    },
    Role {
        role: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        exact: bool,
    },
    Label {
        label: String,
    },
    #[serde(rename = "testid")]
    TestId {
        #[serde(alias = "testid")]
        test_id: String,
    },
    Frame {
        selector: String,
        target: Box<TargetSpec>,
    },
    /// Index into the base set; negative counts from the end (-1 = last)
    Nth {
        base: Box<TargetSpec>,
        index: i64,
    },
    Url {
        url: String,
    },
}

impl TargetSpec {
    pub fn css(selector: impl Into<String>) -> Self {
        TargetSpec::Css {
            selector: selector.into(),
        }
    }

    pub fn test_id(test_id: impl Into<String>) -> Self {
        TargetSpec::TestId {
            test_id: test_id.into(),
        }
    }

    pub fn text(text: impl Into<String>, exact: bool) -> Self {
        TargetSpec::Text {
            text: text.into(),
            exact,
        }
    }

    pub fn role(role: impl Into<String>, name: Option<&str>) -> Self {
        TargetSpec::Role {
            role: role.into(),
            name: name.map(str::to_string),
            exact: true,
        }
    }

    pub fn in_frame(selector: impl Into<String>, inner: TargetSpec) -> Self {
        TargetSpec::Frame {
            selector: selector.into(),
            target: Box::new(inner),
        }
    }

    pub fn nth(base: TargetSpec, index: i64) -> Self {
        TargetSpec::Nth {
            base: Box::new(base),
            index,
        }
    }

    pub fn is_url(&self) -> bool {
        matches!(self, TargetSpec::Url { .. })
    }

    /// Variant name as written in action files
    pub fn kind(&self) -> &'static str {
        match self {
            TargetSpec::Css { .. } => "css",
            TargetSpec::Xpath { .. } => "xpath",
            TargetSpec::Text { .. } => "text",
            TargetSpec::Role { .. } => "role",
            TargetSpec::Label { .. } => "label",
            TargetSpec::TestId { .. } => "testid",
            TargetSpec::Frame { .. } => "frame",
            TargetSpec::Nth { .. } => "nth",
            TargetSpec::Url { .. } => "url",
        }
    }

    /// Check mandatory fields of this spec and every nested spec
    pub fn validate(&self) -> Result<(), LocatorError> {
        let require = |field: &str, value: &str| {
            if value.trim().is_empty() {
                Err(LocatorError::InvalidTarget(format!(
                    "{} target requires a non-empty {}",
                    self.kind(),
                    field
                )))
            } else {
                Ok(())
            }
        };
        match self {
            TargetSpec::Css { selector } => require("selector", selector),
            TargetSpec::Xpath { expression } => require("expression", expression),
            TargetSpec::Text { text, .. } => require("text", text),
            TargetSpec::Role { role, .. } => require("role", role),
            TargetSpec::Label { label } => require("label", label),
            TargetSpec::TestId { test_id } => require("test_id", test_id),
            TargetSpec::Url { url } => require("url", url),
            TargetSpec::Frame { selector, target } => {
                require("selector", selector)?;
                if target.is_url() {
                    return Err(LocatorError::InvalidTarget(
                        "frame cannot wrap a url target".into(),
                    ));
                }
                target.validate()
            }
            TargetSpec::Nth { base, .. } => {
                if base.is_url() {
                    return Err(LocatorError::InvalidTarget(
                        "nth cannot index a url target".into(),
                    ));
                }
                base.validate()
            }
        }
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetSpec::Css { selector } => write!(f, "css={selector}"),
            TargetSpec::Xpath { expression } => write!(f, "xpath={expression}"),
            TargetSpec::Text { text, .. } => write!(f, "text={text:?}"),
            TargetSpec::Role { role, name, .. } => match name {
                Some(name) => write!(f, "role={role}[name={name:?}]"),
                None => write!(f, "role={role}"),
            },
            TargetSpec::Label { label } => write!(f, "label={label:?}"),
            TargetSpec::TestId { test_id } => write!(f, "testid={test_id}"),
            TargetSpec::Frame { selector, target } => write!(f, "frame={selector} >> {target}"),
            TargetSpec::Nth { base, index } => write!(f, "{base} >> nth={index}"),
            TargetSpec::Url { url } => write!(f, "url={url}"),
        }
    }
}

/// Compiled, not yet evaluated, form of a [`TargetSpec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPlan {
    /// Frame selectors, outermost first
    pub frames: Vec<String>,
    pub locator: Locator,
    /// Index filters applied in order over the matched set
    pub filters: Vec<i64>,
    /// Rendered source spec, for logs and error messages
    pub description: String,
}

/// Pick `index` (negative from the end) out of `items`
pub fn pick_index<T: Clone>(items: &[T], index: i64) -> Option<T> {
    let len = items.len() as i64;
    let idx = if index < 0 { len + index } else { index };
    if idx < 0 || idx >= len {
        None
    } else {
        items.get(idx as usize).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deserializes_nested_targets() {
        let raw = serde_json::json!({
            "type": "frame",
            "selector": "#checkout",
            "target": {
                "type": "nth",
                "index": -1,
                "base": { "type": "testid", "test_id": "row" }
            }
        });
        let spec: TargetSpec = serde_json::from_value(raw).unwrap();
        assert_eq!(
            spec,
            TargetSpec::in_frame("#checkout", TargetSpec::nth(TargetSpec::test_id("row"), -1))
        );
        assert_eq!(spec.to_string(), "frame=#checkout >> testid=row >> nth=-1");
    }

    #[test]
    fn test_validate_rejects_empty_and_nested_url() {
        assert!(TargetSpec::css(" ").validate().is_err());
        let nested = TargetSpec::nth(
            TargetSpec::Url {
                url: "https://x.test".into(),
            },
            0,
        );
        assert!(nested.validate().is_err());
        assert!(TargetSpec::role("button", Some("Go")).validate().is_ok());
    }

    #[test]
    fn test_pick_index_handles_negative_and_out_of_range() {
        let items = vec!["a", "b", "c"];
        assert_eq!(pick_index(&items, 0), Some("a"));
        assert_eq!(pick_index(&items, -1), Some("c"));
        assert_eq!(pick_index(&items, 3), None);
        assert_eq!(pick_index(&items, -4), None);
    }
}
