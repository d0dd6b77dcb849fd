//! Scriptable in-memory browser.
//!
//! Models one page as a flat list of elements with attributes, text, value,
//! visibility and the frame path they live in. Clicks can trigger effects,
//! failures can be injected, and screenshots are deterministic bytes derived
//! from visible state. Like real pixels they change with the text on screen
//! but never carry it as bytes. CSS support covers compound selectors
//! (`tag#id.class[attr=v]`), selector lists and, approximately, descendant
//! combinators (last compound wins).

use crate::driver::BrowserDriver;
use crate::errors::{DriverError, DriverResult};
use crate::scripts;
use crate::types::{ElementHandle, LoadState, Locator, ScreenshotOptions};
use serde_json::{json, Map, Value};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Side effect applied when an element is clicked
#[derive(Debug, Clone, PartialEq)]
pub enum FakeEffect {
    /// Replace the text of every element matching `target`
    SetText { target: String, text: String },
    Show { target: String },
    Hide { target: String },
    Remove { target: String },
    /// Load a registered page (or a blank one)
    Navigate { url: String },
    Download { filename: String },
}

/// One element of the fake document
#[derive(Debug, Clone, PartialEq)]
pub struct FakeElement {
    handle: String,
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub text: String,
    pub value: String,
    pub visible: bool,
    pub enabled: bool,
    pub frames: Vec<String>,
    pub files: Vec<String>,
    pub on_click: Vec<FakeEffect>,
}

impl FakeElement {
    pub fn new(tag: &str) -> Self {
        Self {
            handle: String::new(),
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            text: String::new(),
            value: String::new(),
            visible: true,
            enabled: true,
            frames: Vec::new(),
            files: Vec::new(),
            on_click: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    pub fn class(self, class: &str) -> Self {
        self.attr("class", class)
    }

    pub fn test_id(self, test_id: &str) -> Self {
        self.attr("data-testid", test_id)
    }

    pub fn input_type(self, kind: &str) -> Self {
        self.attr("type", kind)
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Place the element inside the frame reached through `selector`
    pub fn in_frame(mut self, selector: &str) -> Self {
        self.frames.push(selector.to_string());
        self
    }

    /// Mark as a blocking overlay: while visible, clicks elsewhere fail
    pub fn blocking(self) -> Self {
        self.attr("data-blocking", "true")
    }

    /// Part of an overlay (its own buttons stay clickable)
    pub fn overlay_part(self) -> Self {
        self.attr("data-overlay-part", "true")
    }

    pub fn on_click(mut self, effect: FakeEffect) -> Self {
        self.on_click.push(effect);
        self
    }

    pub fn handle(&self) -> ElementHandle {
        ElementHandle::new(self.handle.clone())
    }

    fn attr_value(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    fn role(&self) -> Option<String> {
        if let Some(role) = self.attr_value("role") {
            return Some(role.to_string());
        }
        let role = match self.tag.as_str() {
            "button" => "button",
            "a" if self.attrs.contains_key("href") => "link",
            "input" => match self.attr_value("type").unwrap_or("text") {
                "submit" | "button" | "reset" => "button",
                "checkbox" => "checkbox",
                "radio" => "radio",
                "file" | "hidden" => return None,
                _ => "textbox",
            },
            "textarea" => "textbox",
            "select" => "combobox",
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "heading",
            "dialog" => "dialog",
            _ => return None,
        };
        Some(role.to_string())
    }

    fn accessible_name(&self) -> String {
        self.attr_value("aria-label")
            .or_else(|| self.attr_value("label"))
            .map(str::to_string)
            .unwrap_or_else(|| {
                if self.text.trim().is_empty() {
                    self.value.trim().to_string()
                } else {
                    self.text.trim().to_string()
                }
            })
    }

    fn is_key_element(&self) -> bool {
        matches!(
            self.tag.as_str(),
            "a" | "button" | "input" | "select" | "textarea"
        ) || matches!(self.attr_value("role"), Some("button") | Some("link"))
            || self.attrs.contains_key("data-testid")
    }
}

/// A page template the browser can navigate to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FakePage {
    pub url: String,
    pub title: String,
    pub elements: Vec<FakeElement>,
}

impl FakePage {
    pub fn new(url: &str, title: &str) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
            elements: Vec::new(),
        }
    }

    pub fn with(mut self, element: FakeElement) -> Self {
        self.elements.push(element);
        self
    }
}

/// Failure injection switches
#[derive(Debug, Clone, Default)]
pub struct FakeFailures {
    /// Number of upcoming clicks that fail with a protocol error
    pub click_failures: u32,
    pub navigate_timeout: bool,
    pub network_idle_timeout: bool,
    pub upload_failure: bool,
    pub reload_failure: bool,
    pub screenshot_failure: bool,
    pub content_failure: bool,
    pub panic_on_click: bool,
}

/// In-memory [`BrowserDriver`]
pub struct FakeBrowser {
    pages: BTreeMap<String, FakePage>,
    current: FakePage,
    started: bool,
    next_handle: u64,
    downloads: Vec<String>,
    script_results: BTreeMap<String, Value>,
    calls: Vec<String>,
    reloads: u32,
    pub failures: FakeFailures,
}

impl Default for FakeBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
            current: FakePage::new("about:blank", ""),
            started: false,
            next_handle: 0,
            downloads: Vec::new(),
            script_results: BTreeMap::new(),
            calls: Vec::new(),
            reloads: 0,
            failures: FakeFailures::default(),
        }
    }

    /// Start on `page` (also registered for navigation and reload)
    pub fn with_page(page: FakePage) -> Self {
        let mut browser = Self::new();
        browser.register_page(page.clone());
        browser.load(&page.url);
        browser
    }

    pub fn register_page(&mut self, mut page: FakePage) {
        for element in page.elements.iter_mut() {
            self.next_handle += 1;
            element.handle = format!("e{}", self.next_handle);
        }
        self.pages.insert(page.url.clone(), page);
    }

    pub fn set_script_result(&mut self, script: &str, value: Value) {
        self.script_results.insert(script.to_string(), value);
    }

    /// Names of driver calls in order, e.g. `click:e3`
    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    pub fn reloads(&self) -> u32 {
        self.reloads
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn current_page(&self) -> &FakePage {
        &self.current
    }

    /// Add an element to the live page
    pub fn insert_element(&mut self, mut element: FakeElement) -> ElementHandle {
        self.next_handle += 1;
        element.handle = format!("e{}", self.next_handle);
        let handle = element.handle();
        self.current.elements.push(element);
        handle
    }

    /// Look up a live element by its `id` attribute
    pub fn element_by_id(&self, id: &str) -> Option<&FakeElement> {
        self.current
            .elements
            .iter()
            .find(|el| el.attr_value("id") == Some(id))
    }

    fn load(&mut self, url: &str) {
        self.current = match self.pages.get(url) {
            Some(page) => page.clone(),
            None => FakePage::new(url, ""),
        };
    }

    fn find(&self, handle: &ElementHandle) -> DriverResult<&FakeElement> {
        self.current
            .elements
            .iter()
            .find(|el| el.handle == handle.0)
            .ok_or_else(|| DriverError::Detached(handle.0.clone()))
    }

    fn find_mut(&mut self, handle: &ElementHandle) -> DriverResult<&mut FakeElement> {
        self.current
            .elements
            .iter_mut()
            .find(|el| el.handle == handle.0)
            .ok_or_else(|| DriverError::Detached(handle.0.clone()))
    }

    fn ensure_started(&self) -> DriverResult<()> {
        if self.started {
            Ok(())
        } else {
            Err(DriverError::SessionClosed)
        }
    }

    fn overlay_blocks(&self, target: &FakeElement) -> bool {
        if target.attr_value("data-overlay-part") == Some("true")
            || target.attr_value("data-blocking") == Some("true")
        {
            return false;
        }
        self.current
            .elements
            .iter()
            .any(|el| el.visible && el.attr_value("data-blocking") == Some("true"))
    }

    fn apply_effect(&mut self, effect: FakeEffect) {
        match effect {
            FakeEffect::SetText { target, text } => {
                for el in self.matching_css_mut(&target) {
                    el.text = text.clone();
                }
            }
            FakeEffect::Show { target } => {
                for el in self.matching_css_mut(&target) {
                    el.visible = true;
                }
            }
            FakeEffect::Hide { target } => {
                for el in self.matching_css_mut(&target) {
                    el.visible = false;
                }
            }
            FakeEffect::Remove { target } => {
                let selector = target.clone();
                self.current
                    .elements
                    .retain(|el| !css_matches(&selector, el));
            }
            FakeEffect::Navigate { url } => self.load(&url),
            FakeEffect::Download { filename } => self.downloads.push(filename),
        }
    }

    fn matching_css_mut(&mut self, selector: &str) -> Vec<&mut FakeElement> {
        self.current
            .elements
            .iter_mut()
            .filter(|el| css_matches(selector, el))
            .collect()
    }

    fn key_elements(&self) -> Value {
        let elements: Vec<Value> = self
            .current
            .elements
            .iter()
            .filter(|el| el.visible && el.frames.is_empty() && el.is_key_element())
            .map(|el| {
                let mut obj = Map::new();
                obj.insert("tag".into(), json!(el.tag));
                for (key, attr) in [
                    ("id", "id"),
                    ("name", "name"),
                    ("type", "type"),
                    ("role", "role"),
                    ("testid", "data-testid"),
                    ("label", "aria-label"),
                    ("href", "href"),
                ] {
                    if let Some(value) = el.attr_value(attr) {
                        obj.insert(key.into(), json!(value));
                    }
                }
                if matches!(el.tag.as_str(), "input" | "textarea" | "select") && !el.value.is_empty()
                {
                    obj.insert("value".into(), json!(el.value));
                }
                if !el.text.trim().is_empty() {
                    obj.insert("text".into(), json!(el.text.trim()));
                }
                Value::Object(obj)
            })
            .collect();
        let visible_text = self
            .current
            .elements
            .iter()
            .filter(|el| el.visible && el.frames.is_empty() && !el.text.trim().is_empty())
            .map(|el| el.text.trim().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        json!({ "elements": elements, "visible_text": visible_text })
    }
}

impl BrowserDriver for FakeBrowser {
    fn start(&mut self) -> DriverResult<()> {
        self.calls.push("start".into());
        self.started = true;
        Ok(())
    }

    fn close(&mut self) -> DriverResult<()> {
        self.calls.push("close".into());
        self.started = false;
        Ok(())
    }

    fn navigate(&mut self, url: &str, _timeout: Duration) -> DriverResult<()> {
        self.ensure_started()?;
        self.calls.push(format!("navigate:{url}"));
        if self.failures.navigate_timeout {
            return Err(DriverError::Timeout(format!("navigation to {url}")));
        }
        self.load(url);
        Ok(())
    }

    fn reload(&mut self, _timeout: Duration) -> DriverResult<()> {
        self.ensure_started()?;
        self.calls.push("reload".into());
        self.reloads += 1;
        if self.failures.reload_failure {
            return Err(DriverError::Navigation("reload refused".into()));
        }
        let url = self.current.url.clone();
        self.load(&url);
        Ok(())
    }

    fn query(&self, frames: &[String], locator: &Locator) -> DriverResult<Vec<ElementHandle>> {
        self.ensure_started()?;
        if let Locator::Css { selector } = locator {
            if selector.trim().is_empty() {
                return Err(DriverError::Script("empty selector".into()));
            }
        }
        let matches = self
            .current
            .elements
            .iter()
            .filter(|el| el.frames.as_slice() == frames)
            .filter(|el| locator_matches(locator, el))
            .map(FakeElement::handle)
            .collect::<Vec<_>>();
        debug!(locator = %locator, count = matches.len(), "fake query");
        Ok(matches)
    }

    fn click(&mut self, element: &ElementHandle, _timeout: Duration) -> DriverResult<()> {
        self.ensure_started()?;
        self.calls.push(format!("click:{element}"));
        if self.failures.panic_on_click {
            panic!("fake driver crashed during click");
        }
        if self.failures.click_failures > 0 {
            self.failures.click_failures -= 1;
            return Err(DriverError::Protocol("injected click failure".into()));
        }
        let target = self.find(element)?.clone();
        if !target.visible || !target.enabled {
            return Err(DriverError::NotInteractable(element.0.clone()));
        }
        if self.overlay_blocks(&target) {
            return Err(DriverError::NotInteractable(format!(
                "{} is obscured by an overlay",
                element
            )));
        }
        for effect in target.on_click {
            self.apply_effect(effect);
        }
        Ok(())
    }

    fn fill(
        &mut self,
        element: &ElementHandle,
        value: &str,
        _timeout: Duration,
    ) -> DriverResult<()> {
        self.ensure_started()?;
        self.calls.push(format!("fill:{element}"));
        let target = self.find_mut(element)?;
        if !matches!(target.tag.as_str(), "input" | "textarea") {
            return Err(DriverError::NotInteractable(format!(
                "{} is not editable",
                element
            )));
        }
        if !target.visible || !target.enabled {
            return Err(DriverError::NotInteractable(element.0.clone()));
        }
        target.value = value.to_string();
        Ok(())
    }

    fn attribute(&self, element: &ElementHandle, name: &str) -> DriverResult<Option<String>> {
        Ok(self.find(element)?.attrs.get(name).cloned())
    }

    fn input_value(&self, element: &ElementHandle) -> DriverResult<String> {
        Ok(self.find(element)?.value.clone())
    }

    fn tag_name(&self, element: &ElementHandle) -> DriverResult<String> {
        Ok(self.find(element)?.tag.clone())
    }

    fn is_visible(&self, element: &ElementHandle) -> DriverResult<bool> {
        Ok(self.find(element)?.visible)
    }

    fn is_enabled(&self, element: &ElementHandle) -> DriverResult<bool> {
        Ok(self.find(element)?.enabled)
    }

    fn inner_text(&self, element: &ElementHandle) -> DriverResult<String> {
        Ok(self.find(element)?.text.clone())
    }

    fn set_input_files(&mut self, element: &ElementHandle, files: &[PathBuf]) -> DriverResult<()> {
        self.ensure_started()?;
        self.calls.push(format!("set_input_files:{element}"));
        if self.failures.upload_failure {
            return Err(DriverError::Protocol("injected upload failure".into()));
        }
        let target = self.find_mut(element)?;
        target.files = files
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        Ok(())
    }

    fn input_files(&self, element: &ElementHandle) -> DriverResult<Vec<String>> {
        Ok(self.find(element)?.files.clone())
    }

    fn title(&self) -> DriverResult<String> {
        self.ensure_started()?;
        Ok(self.current.title.clone())
    }

    fn url(&self) -> DriverResult<String> {
        self.ensure_started()?;
        Ok(self.current.url.clone())
    }

    fn evaluate(&self, script: &str) -> DriverResult<Value> {
        self.ensure_started()?;
        if script == scripts::KEY_ELEMENTS_PROBE {
            return Ok(self.key_elements());
        }
        self.script_results
            .get(script)
            .cloned()
            .ok_or_else(|| DriverError::Unsupported("script not scripted in fake".into()))
    }

    fn screenshot(&self, options: &ScreenshotOptions) -> DriverResult<Vec<u8>> {
        self.ensure_started()?;
        if self.failures.screenshot_failure {
            return Err(DriverError::Protocol("injected screenshot failure".into()));
        }
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        let visible = self
            .current
            .elements
            .iter()
            .filter(|el| el.visible)
            .map(|el| format!("{}:{:016x}:{}", el.tag, glyphs(&el.text), el.value.len()))
            .collect::<Vec<_>>()
            .join(";");
        bytes.extend_from_slice(
            format!(
                "fake|{}|{}|{}|full={}|masks={}",
                self.current.url,
                self.current.title,
                visible,
                options.full_page,
                options.mask.len()
            )
            .as_bytes(),
        );
        Ok(bytes)
    }

    fn content(&self) -> DriverResult<String> {
        self.ensure_started()?;
        if self.failures.content_failure {
            return Err(DriverError::Protocol("injected content failure".into()));
        }
        let mut html = format!(
            "<html><head><title>{}</title></head><body>",
            escape_html(&self.current.title)
        );
        for el in &self.current.elements {
            html.push('<');
            html.push_str(&el.tag);
            for (name, value) in &el.attrs {
                html.push_str(&format!(" {}=\"{}\"", name, escape_html(value)));
            }
            if matches!(el.tag.as_str(), "input" | "textarea") {
                html.push_str(&format!(" value=\"{}\"", escape_html(&el.value)));
            }
            html.push('>');
            if el.tag != "input" {
                html.push_str(&escape_html(&el.text));
                html.push_str(&format!("</{}>", el.tag));
            }
        }
        html.push_str("</body></html>");
        Ok(html)
    }

    fn wait_for_load_state(&self, state: LoadState, _timeout: Duration) -> DriverResult<()> {
        self.ensure_started()?;
        if state == LoadState::NetworkIdle && self.failures.network_idle_timeout {
            return Err(DriverError::Timeout("network idle".into()));
        }
        Ok(())
    }

    fn downloads(&self) -> DriverResult<Vec<String>> {
        Ok(self.downloads.clone())
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn locator_matches(locator: &Locator, el: &FakeElement) -> bool {
    match locator {
        Locator::Css { selector } => css_matches(selector, el),
        Locator::Xpath { expression } => xpath_matches(expression, el),
        Locator::Text { text, exact } => {
            let actual = normalize(&el.text);
            if actual.is_empty() {
                return false;
            }
            if *exact {
                actual == normalize(text)
            } else {
                actual
                    .to_lowercase()
                    .contains(&normalize(text).to_lowercase())
            }
        }
        Locator::Role { role, name, exact } => {
            if el.role().as_deref() != Some(role.as_str()) {
                return false;
            }
            match name {
                None => true,
                Some(expected) => {
                    let actual = el.accessible_name();
                    if *exact {
                        actual == *expected
                    } else {
                        actual.to_lowercase().contains(&expected.to_lowercase())
                    }
                }
            }
        }
        Locator::Label { label } => {
            el.attr_value("aria-label") == Some(label.as_str())
                || el.attr_value("label") == Some(label.as_str())
                || el.attr_value("placeholder") == Some(label.as_str())
        }
        Locator::TestId { test_id } => el.attr_value("data-testid") == Some(test_id.as_str()),
    }
}

#[derive(Debug, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Compound {
    fn matches(&self, el: &FakeElement) -> bool {
        if let Some(tag) = &self.tag {
            if tag != "*" && !tag.eq_ignore_ascii_case(&el.tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if el.attr_value("id") != Some(id.as_str()) {
                return false;
            }
        }
        let classes: Vec<&str> = el
            .attr_value("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default();
        if !self.classes.iter().all(|c| classes.contains(&c.as_str())) {
            return false;
        }
        self.attrs.iter().all(|(name, expected)| {
            let actual = if name == "value" && !el.attrs.contains_key("value") {
                Some(el.value.as_str())
            } else {
                el.attr_value(name)
            };
            match (expected, actual) {
                (None, actual) => actual.is_some(),
                (Some(expected), Some(actual)) => expected == actual,
                (Some(_), None) => false,
            }
        })
    }
}

fn css_matches(selector: &str, el: &FakeElement) -> bool {
    selector.split(',').any(|part| {
        let last = part
            .split(|c: char| c.is_whitespace() || c == '>')
            .filter(|s| !s.is_empty())
            .last();
        match last.and_then(parse_compound) {
            Some(compound) => compound.matches(el),
            None => false,
        }
    })
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn parse_compound(raw: &str) -> Option<Compound> {
    let mut compound = Compound::default();
    let chars: Vec<char> = raw.chars().collect();
    let mut i = 0;
    let read_ident = |start: usize| -> (String, usize) {
        let mut end = start;
        while end < chars.len() && is_ident(chars[end]) {
            end += 1;
        }
        (chars[start..end].iter().collect(), end)
    };
    if i < chars.len() && (chars[i] == '*' || is_ident(chars[i])) {
        if chars[i] == '*' {
            compound.tag = Some("*".into());
            i += 1;
        } else {
            let (tag, next) = read_ident(i);
            compound.tag = Some(tag);
            i = next;
        }
    }
    while i < chars.len() {
        match chars[i] {
            '#' => {
                let (id, next) = read_ident(i + 1);
                compound.id = Some(id);
                i = next;
            }
            '.' => {
                let (class, next) = read_ident(i + 1);
                compound.classes.push(class);
                i = next;
            }
            '[' => {
                let close = chars[i..].iter().position(|c| *c == ']')? + i;
                let inner: String = chars[i + 1..close].iter().collect();
                let attr = match inner.split_once('=') {
                    Some((name, value)) => (
                        name.trim().to_string(),
                        Some(value.trim().trim_matches(|c| c == '"' || c == '\'').to_string()),
                    ),
                    None => (inner.trim().to_string(), None),
                };
                compound.attrs.push(attr);
                i = close + 1;
            }
            _ => return None,
        }
    }
    Some(compound)
}

/// Supports `//tag`, `//*` and predicates `[@attr='v']`, `[@attr]`, `[text()='v']`.
fn xpath_matches(expression: &str, el: &FakeElement) -> bool {
    let Some(body) = expression.trim().strip_prefix("//") else {
        return false;
    };
    let (tag, mut rest) = match body.find('[') {
        Some(idx) => (&body[..idx], &body[idx..]),
        None => (body, ""),
    };
    if tag != "*" && !tag.eq_ignore_ascii_case(&el.tag) {
        return false;
    }
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(end) = stripped.find(']') else {
            return false;
        };
        let predicate = &stripped[..end];
        rest = &stripped[end + 1..];
        let ok = if let Some(attr) = predicate.strip_prefix('@') {
            match attr.split_once('=') {
                Some((name, value)) => {
                    let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
                    el.attr_value(name.trim()) == Some(value)
                }
                None => el.attrs.contains_key(attr.trim()),
            }
        } else if let Some(value) = predicate.strip_prefix("text()=") {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            normalize(&el.text) == value
        } else {
            false
        };
        if !ok {
            return false;
        }
    }
    true
}

/// Stand-in for rendered text in fake screenshots
fn glyphs(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.trim().hash(&mut hasher);
    hasher.finish()
}
