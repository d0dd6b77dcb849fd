use url::Url;

use crate::report::{marker, RedactCategory};

/// Mask query values not in `allow_keys`; returns the rewritten URL and the
/// number of masked values. Unparseable input is returned unchanged.
pub fn redact_url(raw: &str, allow_keys: &[String]) -> (String, u64) {
    let Ok(mut parsed) = Url::parse(raw) else {
        return (raw.to_string(), 0);
    };
    if parsed.query().is_none() {
        return (raw.to_string(), 0);
    }

    let mut masked = 0;
    let mask = marker(RedactCategory::UrlQuery.as_str());
    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(key, value)| {
            if allow_keys.iter().any(|k| k == key.as_ref()) || value.is_empty() {
                (key.into_owned(), value.into_owned())
            } else {
                masked += 1;
                (key.into_owned(), mask.clone())
            }
        })
        .collect();

    if masked == 0 {
        return (raw.to_string(), 0);
    }
    let query = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    parsed.set_query(Some(&query));
    (parsed.to_string(), masked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_query() {
        let (out, n) = redact_url(
            "https://example.com/search?q=hello&safe=1",
            &["safe".into()],
        );
        assert!(!out.contains("hello"));
        assert!(out.contains("safe=1"));
        assert!(out.starts_with("https://example.com/search?q="));
        assert_eq!(n, 1);
    }

    #[test]
    fn test_leaves_plain_urls_alone() {
        let (out, n) = redact_url("https://example.com/a", &[]);
        assert_eq!(out, "https://example.com/a");
        assert_eq!(n, 0);
        let (out, n) = redact_url("not a url", &[]);
        assert_eq!(out, "not a url");
        assert_eq!(n, 0);
    }
}
