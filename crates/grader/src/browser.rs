//! Browser capability used by the grading steps
//!
//! The real implementation is a WebDriver session; tests plug in an
//! in-process double of the app.

use async_trait::async_trait;
use std::fmt;

use crate::error::{GradeError, GradeResult};

/// How to find an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Form field by its `name` attribute
    Name(String),
    /// CSS selector (e.g. `div.contact`)
    Css(String),
}

impl Locator {
    pub fn name(name: impl Into<String>) -> Self {
        Locator::Name(name.into())
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    /// The locator as a CSS selector
    pub fn to_css(&self) -> String {
        match self {
            Locator::Name(name) => format!("[name=\"{}\"]", name.replace('"', "\\\"")),
            Locator::Css(selector) => selector.clone(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Name(name) => write!(f, "name={}", name),
            Locator::Css(selector) => write!(f, "css={}", selector),
        }
    }
}

/// Opaque reference to an element on the current page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(pub String);

impl ElementRef {
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Remote-controlled browser
#[async_trait]
pub trait Browser: Send + Sync {
    /// Load an absolute URL
    async fn goto(&mut self, url: &str) -> GradeResult<()>;

    /// Reload the current page
    async fn refresh(&mut self) -> GradeResult<()>;

    /// All elements matching `locator`, inside `scope` when given, in document order
    async fn find_all(
        &mut self,
        scope: Option<&ElementRef>,
        locator: &Locator,
    ) -> GradeResult<Vec<ElementRef>>;

    async fn click(&mut self, element: &ElementRef) -> GradeResult<()>;

    /// Type text into an element; for file inputs the text is a file path
    async fn send_keys(&mut self, element: &ElementRef, text: &str) -> GradeResult<()>;

    /// Current value of an attribute. Boolean attributes read as `Some("true")`
    /// when set and `None` otherwise; `value` reflects what the user typed.
    async fn attribute(&mut self, element: &ElementRef, name: &str)
        -> GradeResult<Option<String>>;

    /// End the session
    async fn quit(&mut self) -> GradeResult<()>;

    /// First element matching `locator`
    async fn find(
        &mut self,
        scope: Option<&ElementRef>,
        locator: &Locator,
    ) -> GradeResult<ElementRef> {
        self.find_all(scope, locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| GradeError::NoSuchElement(locator.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_locator_as_css() {
        assert_eq!(Locator::name("email").to_css(), "[name=\"email\"]");
        assert_eq!(
            Locator::css("input[type='submit']").to_css(),
            "input[type='submit']"
        );
    }

    #[test]
    fn test_locator_display() {
        assert_eq!(Locator::name("password").to_string(), "name=password");
        assert_eq!(Locator::css("div.contact").to_string(), "css=div.contact");
    }
}
