use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Categories produced by structural redaction (pattern rules add their own names)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedactCategory {
    Password,
    SensitiveField,
    UrlQuery,
}

impl RedactCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedactCategory::Password => "password",
            RedactCategory::SensitiveField => "sensitive_field",
            RedactCategory::UrlQuery => "url_query",
        }
    }
}

/// Replacement marker for a category
pub fn marker(category: &str) -> String {
    format!("[REDACTED:{category}]")
}

/// Per-category replacement counts. Only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionReport {
    pub counts: BTreeMap<String, u64>,
    pub total: u64,
}

impl RedactionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, category: &str, n: u64) {
        if n == 0 {
            return;
        }
        *self.counts.entry(category.to_string()).or_default() += n;
        self.total += n;
    }

    pub fn merge(&mut self, other: &RedactionReport) {
        for (category, n) in &other.counts {
            self.record(category, *n);
        }
    }

    pub fn count(&self, category: &str) -> u64 {
        self.counts.get(category).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
