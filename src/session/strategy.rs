// Ordered detection cascades
//
// Meeting UIs change their markup often, so every interaction is a list of
// interchangeable strategies tried in order. The first one that reports
// success wins; errors only move the cascade along.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::browser::{Browser, BrowserResult, ElementId, Selector};

/// One way of performing an interaction
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(true)` when the interaction happened
    async fn attempt(&self, browser: &dyn Browser) -> BrowserResult<bool>;
}

/// Strategies tried in order until one succeeds
pub struct Cascade {
    label: &'static str,
    strategies: Vec<Box<dyn Strategy>>,
}

impl Cascade {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            strategies: Vec::new(),
        }
    }

    pub fn with(mut self, strategy: impl Strategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Names of the strategies, in order
    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the cascade; returns the name of the winning strategy
    pub async fn run(&self, browser: &dyn Browser) -> Option<String> {
        for strategy in &self.strategies {
            match strategy.attempt(browser).await {
                Ok(true) => {
                    info!("{}: succeeded using {}", self.label, strategy.name());
                    return Some(strategy.name().to_string());
                }
                Ok(false) => debug!("{}: nothing found using {}", self.label, strategy.name()),
                Err(e) => debug!("{}: {} failed: {}", self.label, strategy.name(), e),
            }
        }
        None
    }
}

/// Run a script that returns `true` when it did the work
pub struct ScriptStrategy {
    name: String,
    script: &'static str,
    args: Vec<Value>,
}

impl ScriptStrategy {
    pub fn new(name: impl Into<String>, script: &'static str, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            script,
            args,
        }
    }
}

#[async_trait]
impl Strategy for ScriptStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self, browser: &dyn Browser) -> BrowserResult<bool> {
        let result = browser.execute(self.script, self.args.clone()).await?;
        Ok(result.as_bool() == Some(true))
    }
}

/// Clear and type into the first visible match
pub struct FillFirstVisible {
    name: String,
    selector: Selector,
    text: String,
}

impl FillFirstVisible {
    pub fn new(selector: Selector, text: impl Into<String>) -> Self {
        Self {
            name: selector.to_string(),
            selector,
            text: text.into(),
        }
    }
}

#[async_trait]
impl Strategy for FillFirstVisible {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self, browser: &dyn Browser) -> BrowserResult<bool> {
        match first_visible(browser, &self.selector).await? {
            Some(element) => {
                browser.clear(&element).await?;
                browser.send_keys(&element, &self.text).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Click the first visible (and, optionally, enabled) match
pub struct ClickFirstVisible {
    name: String,
    selector: Selector,
    require_enabled: bool,
}

impl ClickFirstVisible {
    pub fn new(selector: Selector) -> Self {
        Self {
            name: selector.to_string(),
            selector,
            require_enabled: false,
        }
    }

    /// Skip candidates carrying a `disabled` attribute
    pub fn enabled_only(mut self) -> Self {
        self.require_enabled = true;
        self
    }
}

#[async_trait]
impl Strategy for ClickFirstVisible {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self, browser: &dyn Browser) -> BrowserResult<bool> {
        for element in browser.find_all(&self.selector).await? {
            if !browser.is_displayed(&element).await? {
                continue;
            }
            if self.require_enabled && is_disabled(browser, &element).await? {
                continue;
            }

            match click_with_fallback(browser, &element).await {
                Ok(method) => {
                    debug!("Clicked {} ({:?})", self.selector, method);
                    return Ok(true);
                }
                Err(e) => debug!("All click methods failed on {}: {}", self.selector, e),
            }
        }
        Ok(false)
    }
}

/// How a click finally got through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickMethod {
    Direct,
    Scripted,
    Pointer,
}

/// Click via the element API, then a script, then synthesized pointer input
pub async fn click_with_fallback(
    browser: &dyn Browser,
    element: &ElementId,
) -> BrowserResult<ClickMethod> {
    match browser.click(element).await {
        Ok(()) => return Ok(ClickMethod::Direct),
        Err(e) => debug!("Direct click failed: {}", e),
    }

    match browser
        .execute("arguments[0].click();", vec![element.as_arg()])
        .await
    {
        Ok(_) => return Ok(ClickMethod::Scripted),
        Err(e) => debug!("Scripted click failed: {}", e),
    }

    browser.pointer_click(element).await?;
    Ok(ClickMethod::Pointer)
}

pub async fn first_visible(
    browser: &dyn Browser,
    selector: &Selector,
) -> BrowserResult<Option<ElementId>> {
    for element in browser.find_all(selector).await? {
        if browser.is_displayed(&element).await? {
            return Ok(Some(element));
        }
    }
    Ok(None)
}

async fn is_disabled(browser: &dyn Browser, element: &ElementId) -> BrowserResult<bool> {
    Ok(matches!(
        browser.attribute(element, "disabled").await?.as_deref(),
        Some(value) if value != "false"
    ))
}
