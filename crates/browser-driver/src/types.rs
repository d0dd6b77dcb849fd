//! Core types exchanged with a driver

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to a live element, minted by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Primitive locator the driver knows how to evaluate in one document.
///
/// Composition (frames, index filters) is resolved above the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Locator {
    Css { selector: String },
    Xpath { expression: String },
    Text { text: String, exact: bool },
    Role {
        role: String,
        name: Option<String>,
        exact: bool,
    },
    Label { label: String },
    TestId { test_id: String },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css {
            selector: selector.into(),
        }
    }

    pub fn text(text: impl Into<String>, exact: bool) -> Self {
        Locator::Text {
            text: text.into(),
            exact,
        }
    }

    /// Strategy name as used in logs and evidence
    pub fn strategy(&self) -> &'static str {
        match self {
            Locator::Css { .. } => "css",
            Locator::Xpath { .. } => "xpath",
            Locator::Text { .. } => "text",
            Locator::Role { .. } => "role",
            Locator::Label { .. } => "label",
            Locator::TestId { .. } => "testid",
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css { selector } => write!(f, "css={selector}"),
            Locator::Xpath { expression } => write!(f, "xpath={expression}"),
            Locator::Text { text, exact } => write!(f, "text={text:?} exact={exact}"),
            Locator::Role { role, name, .. } => match name {
                Some(name) => write!(f, "role={role} name={name:?}"),
                None => write!(f, "role={role}"),
            },
            Locator::Label { label } => write!(f, "label={label:?}"),
            Locator::TestId { test_id } => write!(f, "testid={test_id}"),
        }
    }
}

/// Page load milestones a driver can wait for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    Load,
    DomContentLoaded,
    NetworkIdle,
}

/// Screenshot request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotOptions {
    /// Capture the full scrollable page instead of the viewport
    pub full_page: bool,

    /// CSS selectors whose boxes the driver paints over before encoding
    pub mask: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_display_and_strategy() {
        let loc = Locator::Role {
            role: "button".into(),
            name: Some("Submit".into()),
            exact: true,
        };
        assert_eq!(loc.strategy(), "role");
        assert_eq!(loc.to_string(), "role=button name=\"Submit\"");
        assert_eq!(Locator::css("#a").to_string(), "css=#a");
    }

    #[test]
    fn test_locator_serde_is_tagged() {
        let value = serde_json::to_value(Locator::text("Go", false)).unwrap();
        assert_eq!(value["by"], "text");
        assert_eq!(value["text"], "Go");
    }
}
