use serde::{Deserialize, Serialize};

/// One pattern rule; `name` is the category reported for its matches
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PiiRule {
    pub name: String,
    pub pattern: String,
}

impl PiiRule {
    fn new(name: &str, pattern: &str) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PrivacyConfig {
    /// Applied in order to every free-text string
    pub pii_patterns: Vec<PiiRule>,

    /// Field names containing one of these are redacted wholesale.
    /// Keywords of three characters or fewer must match a whole name segment.
    pub sensitive_keywords: Vec<String>,

    /// Keys never redacted (`prefix*` and `*suffix` supported)
    pub key_whitelist: Vec<String>,

    /// Query parameters kept in clear inside URLs
    pub query_allow_keys: Vec<String>,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            pii_patterns: vec![
                PiiRule::new("email", r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}"),
                PiiRule::new("national_id", r"\b\d{3}-\d{2}-\d{4}\b"),
                PiiRule::new(
                    "national_id",
                    r"\b\d{6}(19|20)\d{2}(0[1-9]|1[0-2])(0[1-9]|[12]\d|3[01])\d{3}[0-9Xx]\b",
                ),
                PiiRule::new(
                    "credit_card",
                    r"\b(?:4[0-9]{12}(?:[0-9]{3})?|5[1-5][0-9]{14}|3[47][0-9]{13}|6(?:011|5[0-9]{2})[0-9]{12})\b",
                ),
                PiiRule::new(
                    "phone",
                    r"(?:\+\d{1,3}[ .-]?)?\(?\b\d{3}\)?[ .-]\d{3}[ .-]\d{4}\b|\b1[3-9]\d{9}\b",
                ),
                PiiRule::new("opaque_token", r"(sk|pk|tok)_[A-Za-z0-9]{16,}"),
                PiiRule::new("opaque_token", r"[A-Za-z0-9_\-]{32,}"),
            ],
            sensitive_keywords: [
                "password",
                "passwd",
                "secret",
                "token",
                "api_key",
                "apikey",
                "authorization",
                "cookie",
                "session",
                "credit",
                "card_number",
                "cvv",
                "ssn",
                "otp",
                "pin",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            key_whitelist: [
                "*_hash",
                "sha256",
                "state_*",
                "run_id",
                "action_id",
                "path",
                "event",
                "code",
                "kind",
                "status",
                "phase",
                "step",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            query_allow_keys: vec![],
        }
    }
}
