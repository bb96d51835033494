// Browser automation seam
//
// The session driver only talks to `dyn Browser`. Production uses a W3C
// WebDriver client against chromedriver; tests script a fake.

pub mod chromedriver;
pub mod config;
pub mod launcher;
pub mod webdriver;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use chromedriver::ChromeDriver;
pub use config::BrowserConfig;
pub use launcher::{chrome_capabilities, BrowserLauncher, ChromeLauncher};
pub use webdriver::WebDriverClient;

/// W3C web element reference key
pub const ELEMENT_KEY: &str = "element-6066-11e4-a5ac-9b2dd6e4a4a3";

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebDriver error '{error}': {message}")]
    Protocol { error: String, message: String },

    #[error("Malformed WebDriver response: {0}")]
    Malformed(String),

    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid screenshot data: {0}")]
    Decode(#[from] base64::DecodeError),
}

pub type BrowserResult<T> = std::result::Result<T, BrowserError>;

/// How to locate elements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    Css(String),
    XPath(String),
}

impl Selector {
    pub fn css(selector: impl Into<String>) -> Self {
        Selector::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Selector::XPath(expression.into())
    }

    /// WebDriver location strategy name
    pub fn strategy(&self) -> &'static str {
        match self {
            Selector::Css(_) => "css selector",
            Selector::XPath(_) => "xpath",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Selector::Css(value) | Selector::XPath(value) => value,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css(value) => write!(f, "css `{}`", value),
            Selector::XPath(value) => write!(f, "xpath `{}`", value),
        }
    }
}

/// Opaque reference to an element in the current page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(pub String);

impl ElementId {
    /// Element as a script argument or action origin
    pub fn as_arg(&self) -> Value {
        json!({ ELEMENT_KEY: self.0 })
    }

    /// Parse an element reference from a WebDriver value
    pub fn from_value(value: &Value) -> Option<Self> {
        value
            .get(ELEMENT_KEY)
            .or_else(|| value.get("ELEMENT"))
            .and_then(Value::as_str)
            .map(|id| ElementId(id.to_string()))
    }
}

/// The browser operations the meeting flow needs
#[async_trait]
pub trait Browser: Send + Sync {
    async fn goto(&self, url: &str) -> BrowserResult<()>;

    async fn current_url(&self) -> BrowserResult<String>;

    async fn page_source(&self) -> BrowserResult<String>;

    /// Run a synchronous script; `args` are available as `arguments[i]`
    async fn execute(&self, script: &str, args: Vec<Value>) -> BrowserResult<Value>;

    async fn find_all(&self, selector: &Selector) -> BrowserResult<Vec<ElementId>>;

    async fn is_displayed(&self, element: &ElementId) -> BrowserResult<bool>;

    async fn attribute(&self, element: &ElementId, name: &str) -> BrowserResult<Option<String>>;

    async fn text(&self, element: &ElementId) -> BrowserResult<String>;

    async fn click(&self, element: &ElementId) -> BrowserResult<()>;

    /// Click through synthesized pointer input instead of the element API
    async fn pointer_click(&self, element: &ElementId) -> BrowserResult<()>;

    async fn clear(&self, element: &ElementId) -> BrowserResult<()>;

    async fn send_keys(&self, element: &ElementId, text: &str) -> BrowserResult<()>;

    /// PNG of the current viewport
    async fn screenshot(&self) -> BrowserResult<Vec<u8>>;

    /// End the browser session. Subsequent calls are no-ops.
    async fn quit(&self) -> BrowserResult<()>;
}

pub type SharedBrowser = Arc<dyn Browser>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_reference_round_trip() {
        let element = ElementId("f.1.e.2".to_string());
        assert_eq!(ElementId::from_value(&element.as_arg()), Some(element));
        assert_eq!(
            ElementId::from_value(&json!({ "ELEMENT": "legacy" })),
            Some(ElementId("legacy".to_string()))
        );
        assert_eq!(ElementId::from_value(&json!("nope")), None);
    }

    #[test]
    fn test_selector_strategy() {
        assert_eq!(Selector::css("#c11").strategy(), "css selector");
        assert_eq!(Selector::xpath("//button").strategy(), "xpath");
        assert_eq!(Selector::xpath("//button").value(), "//button");
    }
}
