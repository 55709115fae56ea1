//! Page-level helpers over a browser session
//!
//! Wraps the raw browser with app-relative navigation and bounded waits.
//! Waits never fail on their own: when the deadline passes they hand back the
//! last observation and the calling step decides whether that is a failure.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

use crate::browser::{Browser, ElementRef, Locator};
use crate::error::GradeResult;

/// Settle and wait timings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Pause after navigation so client-side rendering can finish
    pub settle_ms: u64,

    /// Upper bound for postcondition waits
    pub wait_timeout_ms: u64,

    pub poll_interval_ms: u64,
}

impl Timing {
    /// No pauses at all; for in-process test doubles
    pub fn immediate() -> Self {
        Self {
            settle_ms: 0,
            wait_timeout_ms: 0,
            poll_interval_ms: 1,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            settle_ms: 500,
            wait_timeout_ms: 5_000,
            poll_interval_ms: 100,
        }
    }
}

/// The app under test as seen through a browser
pub struct Page {
    browser: Box<dyn Browser>,
    base_url: String,
    app_name: String,
    timing: Timing,
}

impl Page {
    pub fn new(
        browser: Box<dyn Browser>,
        base_url: impl Into<String>,
        app_name: impl Into<String>,
        timing: Timing,
    ) -> Self {
        Self {
            browser,
            base_url: base_url.into(),
            app_name: app_name.into(),
            timing,
        }
    }

    /// Absolute URL of an app-relative path
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.app_name,
            path.trim_start_matches('/')
        )
    }

    pub async fn navigate(&mut self, path: &str) -> GradeResult<()> {
        let url = self.url(path);
        debug!("Navigating to {}", url);
        self.browser.goto(&url).await?;
        self.settle().await;
        Ok(())
    }

    pub async fn refresh(&mut self) -> GradeResult<()> {
        self.browser.refresh().await?;
        self.settle().await;
        Ok(())
    }

    pub async fn settle(&self) {
        if self.timing.settle_ms > 0 {
            sleep(Duration::from_millis(self.timing.settle_ms)).await;
        }
    }

    pub async fn find(&mut self, locator: &Locator) -> GradeResult<ElementRef> {
        self.browser.find(None, locator).await
    }

    pub async fn find_all(&mut self, locator: &Locator) -> GradeResult<Vec<ElementRef>> {
        self.browser.find_all(None, locator).await
    }

    pub async fn find_in(
        &mut self,
        scope: &ElementRef,
        locator: &Locator,
    ) -> GradeResult<ElementRef> {
        self.browser.find(Some(scope), locator).await
    }

    pub async fn click(&mut self, element: &ElementRef) -> GradeResult<()> {
        self.browser.click(element).await
    }

    pub async fn send_keys(&mut self, element: &ElementRef, text: &str) -> GradeResult<()> {
        self.browser.send_keys(element, text).await
    }

    pub async fn attr(&mut self, element: &ElementRef, name: &str) -> GradeResult<Option<String>> {
        self.browser.attribute(element, name).await
    }

    /// Current `value` of a form control, empty when unset
    pub async fn value(&mut self, element: &ElementRef) -> GradeResult<String> {
        Ok(self.attr(element, "value").await?.unwrap_or_default())
    }

    pub async fn is_readonly(&mut self, element: &ElementRef) -> GradeResult<bool> {
        Ok(self
            .attr(element, "readonly")
            .await?
            .map(|v| v != "false")
            .unwrap_or(false))
    }

    /// Poll until exactly `expected` elements match, returning the last match set
    pub async fn wait_for_count(
        &mut self,
        locator: &Locator,
        expected: usize,
    ) -> GradeResult<Vec<ElementRef>> {
        let deadline = self.deadline();
        loop {
            let found = self.find_all(locator).await?;
            if found.len() == expected || Instant::now() >= deadline {
                return Ok(found);
            }
            self.pause().await;
        }
    }

    /// Poll until `element` has `expected` as its value, returning the last value
    pub async fn wait_for_value(
        &mut self,
        element: &ElementRef,
        expected: &str,
    ) -> GradeResult<String> {
        let deadline = self.deadline();
        loop {
            let value = self.value(element).await?;
            if value == expected || Instant::now() >= deadline {
                return Ok(value);
            }
            self.pause().await;
        }
    }

    /// Poll until `element`'s readonly state is `expected`, returning the last state
    pub async fn wait_for_readonly(
        &mut self,
        element: &ElementRef,
        expected: bool,
    ) -> GradeResult<bool> {
        let deadline = self.deadline();
        loop {
            let readonly = self.is_readonly(element).await?;
            if readonly == expected || Instant::now() >= deadline {
                return Ok(readonly);
            }
            self.pause().await;
        }
    }

    /// Poll until `element`'s `name` attribute equals `expected`
    pub async fn wait_for_attr(
        &mut self,
        element: &ElementRef,
        name: &str,
        expected: &str,
    ) -> GradeResult<Option<String>> {
        let deadline = self.deadline();
        loop {
            let value = self.attr(element, name).await?;
            if value.as_deref() == Some(expected) || Instant::now() >= deadline {
                return Ok(value);
            }
            self.pause().await;
        }
    }

    pub async fn quit(&mut self) -> GradeResult<()> {
        self.browser.quit().await
    }

    fn deadline(&self) -> Instant {
        Instant::now() + Duration::from_millis(self.timing.wait_timeout_ms)
    }

    async fn pause(&self) {
        sleep(Duration::from_millis(self.timing.poll_interval_ms)).await;
    }
}
