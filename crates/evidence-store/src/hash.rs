//! Hashing and the deterministic state fingerprint

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Collapse runs of whitespace to single spaces and cap at `max_chars`
pub fn normalize_text(text: &str, max_chars: usize) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(max_chars)
        .collect()
}

/// Rebuild `value` with object keys in sorted order at every depth
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Order-independent serialization of the key-element set
pub fn serialize_key_elements(elements: &[Value]) -> String {
    let mut rendered: Vec<String> = elements
        .iter()
        .map(|el| canonicalize(el).to_string())
        .collect();
    rendered.sort();
    format!("[{}]", rendered.join(","))
}

fn normalize_url(url: &str) -> &str {
    let url = url.trim();
    url.split_once('#').map(|(head, _)| head).unwrap_or(url)
}

/// Fingerprint of observed page state; a pure function of normalized inputs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateSignature {
    pub url_hash: String,
    pub title_hash: String,
    pub key_elements_hash: String,
    pub visible_text_hash: String,
    pub screenshot_hash: String,
}

impl StateSignature {
    pub fn compute(
        url: &str,
        title: &str,
        key_elements: &[Value],
        visible_text: &str,
        screenshot_hash: &str,
    ) -> Self {
        Self {
            url_hash: sha256_hex(normalize_url(url).as_bytes()),
            title_hash: sha256_hex(normalize_text(title, usize::MAX).as_bytes()),
            key_elements_hash: sha256_hex(serialize_key_elements(key_elements).as_bytes()),
            visible_text_hash: sha256_hex(normalize_text(visible_text, usize::MAX).as_bytes()),
            screenshot_hash: screenshot_hash.to_string(),
        }
    }

    /// Condensed key used for loop detection; ignores the screenshot
    pub fn state_key(&self) -> String {
        let joined = format!(
            "{}|{}|{}|{}",
            self.url_hash, self.title_hash, self.key_elements_hash, self.visible_text_hash
        );
        sha256_hex(joined.as_bytes())[..16].to_string()
    }
}
