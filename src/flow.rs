//! Flow files: an ordered action list in YAML or JSON

use std::fs;
use std::path::Path;

use action_compiler::ActionSpec;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Either a bare list or `{ actions: [...] }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FlowDocument {
    Wrapped { actions: Vec<ActionSpec> },
    Bare(Vec<ActionSpec>),
}

impl FlowDocument {
    fn into_actions(self) -> Vec<ActionSpec> {
        match self {
            FlowDocument::Wrapped { actions } | FlowDocument::Bare(actions) => actions,
        }
    }
}

pub fn load_flow(path: &Path) -> Result<Vec<ActionSpec>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read flow file {}", path.display()))?;
    parse_flow(&content, is_json(path))
        .with_context(|| format!("Failed to parse flow file {}", path.display()))
}

pub fn parse_flow(content: &str, json: bool) -> Result<Vec<ActionSpec>> {
    let document: FlowDocument = if json {
        serde_json::from_str(content)?
    } else {
        serde_yaml::from_str(content)?
    };
    Ok(document.into_actions())
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
