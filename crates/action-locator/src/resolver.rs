//! Target resolver: plan compilation and evaluation against a driver

use crate::{errors::LocatorError, types::*};
use std::thread;
use std::time::{Duration, Instant};
use stepwright_driver::{BrowserDriver, ElementHandle, Locator};
use tracing::{debug, info};

/// Default interval between attachment polls
pub const DEFAULT_ATTACH_POLL: Duration = Duration::from_millis(100);

/// Compile `spec` into a lazily evaluated plan.
///
/// Recursion follows the target tree: `frame` pushes its selector onto the frame
/// path before compiling the inner spec, `nth` compiles its base and appends an
/// index filter.
pub fn resolve(spec: &TargetSpec) -> Result<TargetPlan, LocatorError> {
    spec.validate()?;
    let mut frames = Vec::new();
    let mut filters = Vec::new();
    let locator = compile(spec, &mut frames, &mut filters)?;
    Ok(TargetPlan {
        frames,
        locator,
        filters,
        description: spec.to_string(),
    })
}

fn compile(
    spec: &TargetSpec,
    frames: &mut Vec<String>,
    filters: &mut Vec<i64>,
) -> Result<Locator, LocatorError> {
    let locator = match spec {
        TargetSpec::Css { selector } => Locator::css(selector.clone()),
        TargetSpec::Xpath { expression } => Locator::Xpath {
            expression: expression.clone(),
        },
        TargetSpec::Text { text, exact } => Locator::text(text.clone(), *exact),
        TargetSpec::Role { role, name, exact } => Locator::Role {
            role: role.clone(),
            name: name.clone(),
            exact: *exact,
        },
        TargetSpec::Label { label } => Locator::Label {
            label: label.clone(),
        },
        TargetSpec::TestId { test_id } => Locator::TestId {
            test_id: test_id.clone(),
        },
        TargetSpec::Frame { selector, target } => {
            frames.push(selector.clone());
            return compile(target, frames, filters);
        }
        TargetSpec::Nth { base, index } => {
            let locator = compile(base, frames, filters)?;
            filters.push(*index);
            return Ok(locator);
        }
        TargetSpec::Url { url } => {
            return Err(LocatorError::InvalidTarget(format!(
                "url target {url} is a navigation destination, not an element"
            )))
        }
    };
    Ok(locator)
}

impl TargetPlan {
    /// Evaluate the plan now and return every match in document order
    pub fn handles(&self, driver: &dyn BrowserDriver) -> Result<Vec<ElementHandle>, LocatorError> {
        let mut handles = driver.query(&self.frames, &self.locator)?;
        for index in &self.filters {
            handles = pick_index(&handles, *index).into_iter().collect();
        }
        debug!(spec = %self.description, count = handles.len(), "evaluated target plan");
        Ok(handles)
    }

    pub fn count(&self, driver: &dyn BrowserDriver) -> Result<usize, LocatorError> {
        Ok(self.handles(driver)?.len())
    }
}

/// Resolver with attachment polling
#[derive(Debug, Clone)]
pub struct TargetResolver {
    poll_interval: Duration,
}

impl Default for TargetResolver {
    fn default() -> Self {
        Self::new(DEFAULT_ATTACH_POLL)
    }
}

impl TargetResolver {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    /// Lazily evaluated handle set for `spec`; cardinality is not judged
    pub fn resolve(&self, spec: &TargetSpec) -> Result<TargetPlan, LocatorError> {
        resolve(spec)
    }

    /// Wait up to `timeout` for at least one match, then require exactly one.
    pub fn resolve_unique(
        &self,
        driver: &dyn BrowserDriver,
        spec: &TargetSpec,
        timeout: Duration,
    ) -> Result<ElementHandle, LocatorError> {
        let plan = resolve(spec)?;
        let started = Instant::now();
        let mut handles = loop {
            match plan.handles(driver) {
                Ok(found) if !found.is_empty() => break found,
                Ok(_) => {}
                Err(LocatorError::Driver(err)) if err.is_retryable() => {
                    debug!(spec = %plan.description, error = %err, "transient driver error while waiting for target");
                }
                Err(err) => return Err(err),
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(LocatorError::NotFound(format!(
                    "{} (waited {} ms)",
                    plan.description,
                    timeout.as_millis()
                )));
            }
            thread::sleep(self.poll_interval.min(timeout - elapsed));
        };

        if handles.len() > 1 {
            info!(spec = %plan.description, count = handles.len(), "target is ambiguous");
            return Err(LocatorError::NotUnique {
                target: plan.description,
                count: handles.len(),
            });
        }
        handles
            .pop()
            .ok_or_else(|| LocatorError::NotFound(plan.description.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stepwright_driver::fake::{FakeBrowser, FakeElement, FakePage};

    fn browser() -> FakeBrowser {
        let page = FakePage::new("https://shop.test", "Shop")
            .with(FakeElement::new("li").test_id("row").text("one"))
            .with(FakeElement::new("li").test_id("row").text("two"))
            .with(FakeElement::new("li").test_id("row").text("three"))
            .with(FakeElement::new("button").id("buy").text("Buy"))
            .with(FakeElement::new("button").id("buy").text("Buy").in_frame("#checkout"));
        let mut browser = FakeBrowser::with_page(page);
        browser.start().unwrap();
        browser
    }

    #[test]
    fn test_plan_composes_frames_and_filters() {
        let spec = TargetSpec::in_frame(
            "#outer",
            TargetSpec::in_frame("#inner", TargetSpec::nth(TargetSpec::css("a"), 2)),
        );
        let plan = resolve(&spec).unwrap();
        assert_eq!(plan.frames, vec!["#outer".to_string(), "#inner".to_string()]);
        assert_eq!(plan.filters, vec![2]);
        assert_eq!(plan.locator, Locator::css("a"));
    }

    #[test]
    fn test_url_target_is_rejected() {
        let err = resolve(&TargetSpec::Url {
            url: "https://x.test".into(),
        })
        .unwrap_err();
        assert!(matches!(err, LocatorError::InvalidTarget(_)));
    }

    #[test]
    fn test_nth_selects_from_base_set() {
        let browser = browser();
        let last = resolve(&TargetSpec::nth(TargetSpec::test_id("row"), -1))
            .unwrap()
            .handles(&browser)
            .unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(browser.inner_text(&last[0]).unwrap(), "three");

        let none = resolve(&TargetSpec::nth(TargetSpec::test_id("row"), 5))
            .unwrap()
            .count(&browser)
            .unwrap();
        assert_eq!(none, 0);
    }

    #[test]
    fn test_resolve_unique_enforces_cardinality() {
        let browser = browser();
        let resolver = TargetResolver::new(Duration::from_millis(5));
        let timeout = Duration::from_millis(20);

        let err = resolver
            .resolve_unique(&browser, &TargetSpec::test_id("row"), timeout)
            .unwrap_err();
        assert_eq!(
            err,
            LocatorError::NotUnique {
                target: "testid=row".into(),
                count: 3
            }
        );

        let err = resolver
            .resolve_unique(&browser, &TargetSpec::css("#missing"), timeout)
            .unwrap_err();
        assert!(matches!(err, LocatorError::NotFound(_)));

        let buy = resolver
            .resolve_unique(&browser, &TargetSpec::css("#buy"), timeout)
            .unwrap();
        let framed = resolver
            .resolve_unique(
                &browser,
                &TargetSpec::in_frame("#checkout", TargetSpec::css("#buy")),
                timeout,
            )
            .unwrap();
        assert_ne!(buy, framed);
    }
}
