//! Page observation: bounded, redacted, fingerprinted

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use stepwright_driver::scripts::KEY_ELEMENTS_PROBE;
use stepwright_driver::{BrowserDriver, ScreenshotOptions};
use stepwright_privacy::{RedactionReport, Redactor};
use tracing::{debug, warn};

use crate::errors::{EvidenceError, EvidenceResult};
use crate::hash::{normalize_text, sha256_hex, StateSignature};
use crate::layout::RunLayout;
use crate::model::{EvidenceItem, EvidenceKind, Phase};
use crate::writer::EvidenceStore;

/// String fields of a key element that are capped at `max_element_text`
const CAPPED_FIELDS: &[&str] = &["text", "value", "label", "href"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CaptureConfig {
    pub max_key_elements: usize,
    pub max_visible_text: usize,
    pub max_element_text: usize,
    /// Selectors painted over in real screenshots
    pub screenshot_mask: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_key_elements: 200,
            max_visible_text: 2000,
            max_element_text: 120,
            screenshot_mask: vec![
                "input[type=password]".into(),
                "[data-sensitive]".into(),
                "[autocomplete=cc-number]".into(),
            ],
        }
    }
}

/// Result of one capture; values are post-redaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub step: String,
    pub phase: Phase,
    pub url: String,
    pub title: String,
    pub signature: StateSignature,
    pub state_key: String,
    pub items: Vec<EvidenceItem>,
}

/// Captures observations into an [`EvidenceStore`]
#[derive(Debug, Clone)]
pub struct Observer {
    config: CaptureConfig,
    redactor: Redactor,
}

impl Observer {
    pub fn new(config: CaptureConfig, redactor: Redactor) -> Self {
        Self { config, redactor }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Snapshot state, fingerprint it, and persist the DOM snapshot plus the
    /// screenshot hash. Raw screenshot bytes are discarded.
    pub fn capture(
        &self,
        driver: &dyn BrowserDriver,
        store: &mut EvidenceStore,
        step: &str,
        phase: Phase,
    ) -> EvidenceResult<Observation> {
        let url = driver.url()?;
        let title = driver.title()?;
        let probe = driver.evaluate(KEY_ELEMENTS_PROBE)?;

        let elements = self.bound_elements(&probe);
        let visible_text = normalize_text(
            probe.get("visible_text").and_then(Value::as_str).unwrap_or_default(),
            self.config.max_visible_text,
        );

        let screenshot_hash = match driver.screenshot(&ScreenshotOptions::default()) {
            Ok(bytes) => sha256_hex(&bytes),
            Err(err) => {
                warn!(%step, %phase, error = %err, "screenshot unavailable, hashing empty image");
                sha256_hex(&[])
            }
        };

        let mut report = RedactionReport::new();
        let mut snapshot = json!({
            "url": url,
            "title": title,
            "key_elements": elements,
            "visible_text": visible_text,
        });
        self.redactor.redact_json(&mut snapshot, &mut report);

        let url = snapshot["url"].as_str().unwrap_or_default().to_string();
        let title = snapshot["title"].as_str().unwrap_or_default().to_string();
        let elements = snapshot["key_elements"].as_array().cloned().unwrap_or_default();
        let text = snapshot["visible_text"].as_str().unwrap_or_default().to_string();
        let signature = StateSignature::compute(&url, &title, &elements, &text, &screenshot_hash);
        let state_key = signature.state_key();

        if let Value::Object(map) = &mut snapshot {
            map.insert("step".into(), json!(step));
            map.insert("phase".into(), json!(phase));
            map.insert("signature".into(), serde_json::to_value(&signature)?);
            map.insert("state_key".into(), json!(state_key));
        }

        store.merge_redactions(&report);
        let dom_bytes = serde_json::to_vec_pretty(&snapshot)?;
        let dom = store.record(
            EvidenceKind::DomSnapshot,
            RunLayout::dom_rel(step, phase),
            &dom_bytes,
            !report.is_empty(),
            step,
            phase,
        )?;
        let shot = store.record(
            EvidenceKind::ScreenshotHash,
            RunLayout::shot_hash_rel(step, phase),
            format!("{screenshot_hash}\n").as_bytes(),
            false,
            step,
            phase,
        )?;
        debug!(%step, %phase, %state_key, redactions = report.total, "observation captured");

        Ok(Observation {
            step: step.to_string(),
            phase,
            url,
            title,
            signature,
            state_key,
            items: vec![dom, shot],
        })
    }

    /// Full-page HTML and a masked real screenshot, for failing or critical
    /// steps. Partial success is kept; fails only if neither artifact landed.
    pub fn capture_full(
        &self,
        driver: &dyn BrowserDriver,
        store: &mut EvidenceStore,
        step: &str,
        phase: Phase,
    ) -> EvidenceResult<Vec<EvidenceItem>> {
        let mut items = Vec::new();
        let mut last_err = None;

        match driver.content() {
            Ok(html) => {
                let mut report = RedactionReport::new();
                let redacted = self.redactor.redact_html(&html, &mut report);
                store.merge_redactions(&report);
                match store.record(
                    EvidenceKind::HtmlFull,
                    RunLayout::html_rel(step, phase),
                    redacted.as_bytes(),
                    true,
                    step,
                    phase,
                ) {
                    Ok(item) => items.push(item),
                    Err(err) => last_err = Some(err),
                }
            }
            Err(err) => {
                warn!(%step, %phase, error = %err, "full html capture failed");
                last_err = Some(err.into());
            }
        }

        let options = ScreenshotOptions {
            full_page: true,
            mask: self.config.screenshot_mask.clone(),
        };
        match driver.screenshot(&options) {
            Ok(png) => match store.record(
                EvidenceKind::Screenshot,
                RunLayout::shot_png_rel(step, phase),
                &png,
                !options.mask.is_empty(),
                step,
                phase,
            ) {
                Ok(item) => items.push(item),
                Err(err) => last_err = Some(err),
            },
            Err(err) => {
                warn!(%step, %phase, error = %err, "screenshot capture failed");
                last_err = Some(err.into());
            }
        }

        match (items.is_empty(), last_err) {
            (true, Some(err)) => Err(err),
            (true, None) => Err(EvidenceError::Malformed {
                path: store.run_dir(),
                reason: "no full artifact captured".into(),
            }),
            _ => Ok(items),
        }
    }

    fn bound_elements(&self, probe: &Value) -> Vec<Value> {
        let Some(elements) = probe.get("elements").and_then(Value::as_array) else {
            return Vec::new();
        };
        elements
            .iter()
            .take(self.config.max_key_elements)
            .map(|el| {
                let mut el = el.clone();
                if let Value::Object(map) = &mut el {
                    for field in CAPPED_FIELDS {
                        if let Some(Value::String(s)) = map.get_mut(*field) {
                            if s.chars().count() > self.config.max_element_text {
                                *s = s.chars().take(self.config.max_element_text).collect();
                            }
                        }
                    }
                }
                el
            })
            .collect()
    }
}
