use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::report::{marker, RedactCategory, RedactionReport};
use crate::text::Redactor;
use crate::url::redact_url;

static INPUT_TAG: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?is)<input\b[^>]*>").ok());
static PASSWORD_TYPE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?i)\btype\s*=\s*["']?password\b"#).ok());
static NAME_ATTR: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?i)\b(?:name|id|autocomplete)\s*=\s*["']?([^"'\s>]+)"#).ok());
static VALUE_ATTR: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?i)\bvalue\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).ok());

/// Element attributes naming the field a `value` belongs to
const FIELD_NAME_KEYS: &[&str] = &["name", "id", "label", "testid", "autocomplete"];

impl Redactor {
    /// Redact every string in `value` in place.
    ///
    /// Whitelisted keys are skipped, values under sensitive keys are replaced
    /// wholesale, URL-ish keys get their query masked, and objects describing a
    /// password input (or a field with a sensitive name) lose their `value`.
    pub fn redact_json(&self, value: &mut Value, report: &mut RedactionReport) {
        self.walk(None, value, report);
    }

    fn walk(&self, key: Option<&str>, value: &mut Value, report: &mut RedactionReport) {
        match value {
            Value::String(current) => {
                if current.is_empty() {
                    return;
                }
                if let Some(key) = key {
                    if self.is_sensitive_key(key) {
                        *current = marker(RedactCategory::SensitiveField.as_str());
                        report.record(RedactCategory::SensitiveField.as_str(), 1);
                        return;
                    }
                    if is_url_key(key) {
                        let (redacted, masked) = redact_url(current, &self.query_allow_keys);
                        report.record(RedactCategory::UrlQuery.as_str(), masked);
                        *current = self.redact_text(&redacted, report);
                        return;
                    }
                }
                *current = self.redact_text(current, report);
            }
            Value::Object(map) => self.walk_object(map, report),
            Value::Array(items) => {
                for item in items.iter_mut() {
                    self.walk(key, item, report);
                }
            }
            _ => {}
        }
    }

    fn walk_object(&self, map: &mut Map<String, Value>, report: &mut RedactionReport) {
        let password_typed = map
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| t.eq_ignore_ascii_case("password"));
        let sensitive_name = FIELD_NAME_KEYS.iter().any(|k| {
            map.get(*k)
                .and_then(Value::as_str)
                .is_some_and(|name| self.is_sensitive_key(name))
        });

        for (key, val) in map.iter_mut() {
            if self.is_whitelisted(key) {
                continue;
            }
            if key == "value" && (password_typed || sensitive_name) {
                if let Value::String(current) = val {
                    if !current.is_empty() {
                        let category = if password_typed {
                            RedactCategory::Password
                        } else {
                            RedactCategory::SensitiveField
                        };
                        *current = marker(category.as_str());
                        report.record(category.as_str(), 1);
                    }
                    continue;
                }
            }
            self.walk(Some(key), val, report);
        }
    }

    /// Redact a serialized HTML document.
    ///
    /// Values of password inputs and inputs with sensitive names are masked
    /// first, then every pattern rule runs over the whole text.
    pub fn redact_html(&self, html: &str, report: &mut RedactionReport) -> String {
        let masked = match (&*INPUT_TAG, &*VALUE_ATTR) {
            (Some(input_tag), Some(value_attr)) => input_tag
                .replace_all(html, |caps: &regex::Captures<'_>| {
                    let tag = &caps[0];
                    let category = self.input_category(tag);
                    match category {
                        Some(category) if value_attr.is_match(tag) => {
                            let replacement = format!("value=\"{}\"", marker(category.as_str()));
                            let replaced = value_attr
                                .replace_all(tag, regex::NoExpand(&replacement))
                                .into_owned();
                            if replaced != tag && !value_is_empty(value_attr, tag) {
                                report.record(category.as_str(), 1);
                                replaced
                            } else {
                                tag.to_string()
                            }
                        }
                        _ => tag.to_string(),
                    }
                })
                .into_owned(),
            _ => html.to_string(),
        };
        self.redact_text(&masked, report)
    }

    fn input_category(&self, tag: &str) -> Option<RedactCategory> {
        if PASSWORD_TYPE.as_ref().is_some_and(|re| re.is_match(tag)) {
            return Some(RedactCategory::Password);
        }
        let sensitive = NAME_ATTR.as_ref().is_some_and(|re| {
            re.captures_iter(tag)
                .any(|caps| self.is_sensitive_key(&caps[1]))
        });
        sensitive.then_some(RedactCategory::SensitiveField)
    }
}

fn value_is_empty(value_attr: &Regex, tag: &str) -> bool {
    value_attr
        .captures(tag)
        .map(|caps| caps[1].trim_matches(|c| c == '"' || c == '\'').is_empty())
        .unwrap_or(true)
}

fn is_url_key(key: &str) -> bool {
    key == "url" || key == "href" || key == "src" || key.ends_with("_url")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redacts_key_elements_structurally() {
        let mut snapshot = json!({
            "url": "https://app.test/login?next=/home&email=foo@example.com",
            "url_hash": "a".repeat(64),
            "elements": [
                { "tag": "input", "type": "password", "id": "pw", "value": "hunter2" },
                { "tag": "input", "name": "api_token", "value": "plain" },
                { "tag": "div", "text": "Contact foo@example.com" },
                { "tag": "input", "name": "session_cookie", "value": "" }
            ]
        });
        let mut report = RedactionReport::new();
        Redactor::builtin().redact_json(&mut snapshot, &mut report);

        let text = snapshot.to_string();
        assert!(!text.contains("hunter2"));
        assert!(!text.contains("plain"));
        assert!(!text.contains("foo@example.com"));
        assert_eq!(snapshot["url_hash"], "a".repeat(64));
        assert_eq!(snapshot["elements"][0]["value"], "[REDACTED:password]");
        assert_eq!(snapshot["elements"][3]["value"], "");
        assert_eq!(report.count("password"), 1);
        assert_eq!(report.count("url_query"), 2);
        assert!(report.count("email") >= 1);
    }

    #[test]
    fn test_sensitive_keys_are_replaced_wholesale() {
        let mut payload = json!({ "authorization": "Bearer abc", "note": "fine" });
        let mut report = RedactionReport::new();
        Redactor::builtin().redact_json(&mut payload, &mut report);
        assert_eq!(payload["authorization"], "[REDACTED:sensitive_field]");
        assert_eq!(payload["note"], "fine");
    }

    #[test]
    fn test_html_password_values_and_patterns() {
        let html = r#"<form><input type="password" id="pw" value="hunter2"><input name="q" value="shoes"><p>ssn 123-45-6789</p></form>"#;
        let mut report = RedactionReport::new();
        let out = Redactor::builtin().redact_html(html, &mut report);
        assert!(!out.contains("hunter2"));
        assert!(!out.contains("123-45-6789"));
        assert!(out.contains(r#"value="shoes""#));
        assert!(out.contains(r#"value="[REDACTED:password]""#));
        assert_eq!(report.count("password"), 1);
        assert_eq!(report.count("national_id"), 1);
    }
}
