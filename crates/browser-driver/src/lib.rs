//! Browser driver capability interface.
//!
//! The engine never talks to a browser directly. It consumes the
//! [`BrowserDriver`] trait, which a CDP, WebDriver or Playwright bridge
//! implements at the integration edge. Calls are synchronous and bounded by
//! explicit timeouts; a concurrent host offloads the whole run to a worker.
//!
//! With the `fake` feature the crate also ships [`fake::FakeBrowser`], a
//! scriptable in-memory page used by the engine's tests.

pub mod driver;
pub mod errors;
pub mod scripts;
pub mod types;

#[cfg(any(test, feature = "fake"))]
pub mod fake;

pub use driver::BrowserDriver;
pub use errors::{DriverError, DriverResult};
pub use types::{ElementHandle, LoadState, Locator, ScreenshotOptions};
