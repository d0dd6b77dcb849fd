use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use tracing::warn;

use crate::errors::{PrivacyError, PrivacyResult};
use crate::policy::PrivacyConfig;
use crate::report::{marker, RedactionReport};

static BUILTIN: Lazy<Redactor> = Lazy::new(|| Redactor::lenient(&PrivacyConfig::default()));

pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compiled redaction policy
#[derive(Debug, Clone)]
pub struct Redactor {
    rules: Vec<(String, Regex)>,
    keywords: Vec<String>,
    whitelist: Vec<String>,
    pub(crate) query_allow_keys: Vec<String>,
}

impl Redactor {
    /// Compile `config`, rejecting invalid patterns
    pub fn new(config: &PrivacyConfig) -> PrivacyResult<Self> {
        let rules = config
            .pii_patterns
            .iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|re| (rule.name.clone(), re))
                    .map_err(|err| PrivacyError::InvalidPattern {
                        name: rule.name.clone(),
                        reason: err.to_string(),
                    })
            })
            .collect::<PrivacyResult<Vec<_>>>()?;
        Ok(Self::with_rules(config, rules))
    }

    /// Shared instance compiled from the default configuration
    pub fn builtin() -> &'static Redactor {
        &BUILTIN
    }

    fn lenient(config: &PrivacyConfig) -> Self {
        let rules = config
            .pii_patterns
            .iter()
            .filter_map(|rule| match Regex::new(&rule.pattern) {
                Ok(re) => Some((rule.name.clone(), re)),
                Err(err) => {
                    warn!(rule = %rule.name, error = %err, "skipping invalid redaction pattern");
                    None
                }
            })
            .collect();
        Self::with_rules(config, rules)
    }

    fn with_rules(config: &PrivacyConfig, rules: Vec<(String, Regex)>) -> Self {
        Self {
            rules,
            keywords: config
                .sensitive_keywords
                .iter()
                .map(|k| k.to_ascii_lowercase())
                .collect(),
            whitelist: config.key_whitelist.clone(),
            query_allow_keys: config.query_allow_keys.clone(),
        }
    }

    /// Apply every pattern rule in order
    pub fn redact_text(&self, text: &str, report: &mut RedactionReport) -> String {
        let mut out = text.to_string();
        for (category, re) in &self.rules {
            let hits = re.find_iter(&out).count() as u64;
            if hits == 0 {
                continue;
            }
            out = re
                .replace_all(&out, NoExpand(&marker(category)))
                .into_owned();
            report.record(category, hits);
        }
        out
    }

    /// Field name carries a sensitivity keyword
    pub fn is_sensitive_key(&self, key: &str) -> bool {
        let lower = key.to_ascii_lowercase();
        let segments: Vec<&str> = lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|s| !s.is_empty())
            .collect();
        let compact: String = lower.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        self.keywords.iter().any(|keyword| {
            if keyword.len() <= 3 {
                segments.iter().any(|segment| segment == keyword)
            } else {
                let keyword: String = keyword.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
                compact.contains(&keyword)
            }
        })
    }

    /// Key exempt from redaction
    pub fn is_whitelisted(&self, key: &str) -> bool {
        self.whitelist.iter().any(|allowed| {
            if let Some(prefix) = allowed.strip_suffix('*') {
                key.starts_with(prefix)
            } else if let Some(suffix) = allowed.strip_prefix('*') {
                key.ends_with(suffix)
            } else {
                allowed == key
            }
        })
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::builtin().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PiiRule;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_masks_builtin_categories() {
        let mut report = RedactionReport::new();
        let out = Redactor::builtin().redact_text(
            "mail foo@example.com, ssn 123-45-6789, key abcdefghijklmnopqrstuvwxyz012345",
            &mut report,
        );
        assert_eq!(
            out,
            "mail [REDACTED:email], ssn [REDACTED:national_id], key [REDACTED:opaque_token]"
        );
        assert_eq!(report.count("email"), 1);
        assert_eq!(report.count("national_id"), 1);
        assert_eq!(report.count("opaque_token"), 1);
    }

    #[test]
    fn test_phone_numbers_are_masked() {
        let mut report = RedactionReport::new();
        let out = Redactor::builtin().redact_text("call (555) 123-4567 now", &mut report);
        assert!(!out.contains("123-4567"));
        assert_eq!(report.count("phone"), 1);
    }

    #[test]
    fn test_short_keywords_need_whole_segments() {
        let redactor = Redactor::builtin();
        assert!(redactor.is_sensitive_key("user_password"));
        assert!(redactor.is_sensitive_key("apiKey"));
        assert!(redactor.is_sensitive_key("login-pin"));
        assert!(!redactor.is_sensitive_key("shipping_method"));
        assert!(!redactor.is_sensitive_key("username"));
    }

    #[test]
    fn test_whitelist_patterns() {
        let redactor = Redactor::builtin();
        assert!(redactor.is_whitelisted("url_hash"));
        assert!(redactor.is_whitelisted("sha256"));
        assert!(!redactor.is_whitelisted("text"));
    }

    #[test]
    fn test_invalid_custom_pattern_is_rejected() {
        let config = PrivacyConfig {
            pii_patterns: vec![PiiRule {
                name: "broken".into(),
                pattern: "([".into(),
            }],
            ..PrivacyConfig::default()
        };
        assert!(matches!(
            Redactor::new(&config),
            Err(PrivacyError::InvalidPattern { .. })
        ));
    }
}
