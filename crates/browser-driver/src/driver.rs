//! The capability trait a browser bridge implements

use crate::errors::DriverResult;
use crate::types::{ElementHandle, LoadState, Locator, ScreenshotOptions};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

/// Blocking browser capability interface.
///
/// One value drives one session. Read-only calls take `&self` so condition
/// evaluation can never mutate the page; dispatch calls take `&mut self`.
pub trait BrowserDriver: Send {
    /// Open the session
    fn start(&mut self) -> DriverResult<()>;

    /// Tear the session down; idempotent
    fn close(&mut self) -> DriverResult<()>;

    /// Drive the top-level document to `url`
    fn navigate(&mut self, url: &str, timeout: Duration) -> DriverResult<()>;

    /// Reload the current document
    fn reload(&mut self, timeout: Duration) -> DriverResult<()>;

    /// Evaluate a primitive locator inside the document reached through `frames`
    /// (outermost first). Returns every attached match in document order.
    fn query(&self, frames: &[String], locator: &Locator) -> DriverResult<Vec<ElementHandle>>;

    fn click(&mut self, element: &ElementHandle, timeout: Duration) -> DriverResult<()>;

    /// Replace the element's value
    fn fill(&mut self, element: &ElementHandle, value: &str, timeout: Duration)
        -> DriverResult<()>;

    fn attribute(&self, element: &ElementHandle, name: &str) -> DriverResult<Option<String>>;

    /// Live `value` property of a form control
    fn input_value(&self, element: &ElementHandle) -> DriverResult<String>;

    /// Lower-case tag name
    fn tag_name(&self, element: &ElementHandle) -> DriverResult<String>;

    fn is_visible(&self, element: &ElementHandle) -> DriverResult<bool>;

    fn is_enabled(&self, element: &ElementHandle) -> DriverResult<bool>;

    fn inner_text(&self, element: &ElementHandle) -> DriverResult<String>;

    fn set_input_files(&mut self, element: &ElementHandle, files: &[PathBuf]) -> DriverResult<()>;

    /// File names currently selected in a file input
    fn input_files(&self, element: &ElementHandle) -> DriverResult<Vec<String>>;

    fn title(&self) -> DriverResult<String>;

    fn url(&self) -> DriverResult<String>;

    /// Run a script in the top-level document and return its JSON result
    fn evaluate(&self, script: &str) -> DriverResult<Value>;

    /// Encoded PNG bytes
    fn screenshot(&self, options: &ScreenshotOptions) -> DriverResult<Vec<u8>>;

    /// Serialized HTML of the top-level document
    fn content(&self) -> DriverResult<String>;

    /// Bounded wait; observes the page without changing it
    fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> DriverResult<()>;

    /// Suggested file names of downloads started in this session
    fn downloads(&self) -> DriverResult<Vec<String>>;
}
