// Minimal W3C WebDriver client
//
// Covers the commands the meeting flow uses plus chromedriver's CDP
// passthrough. Every response is `{"value": ...}`; errors carry
// `value.error` and `value.message`.

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::chromedriver::ChromeDriver;
use super::{Browser, BrowserError, BrowserResult, ElementId, Selector};

const HIDE_WEBDRIVER_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

/// A live WebDriver session
pub struct WebDriverClient {
    http: Client,
    base_url: String,
    session_id: String,
    /// Local chromedriver owned by this session, if we spawned it
    driver: Mutex<Option<ChromeDriver>>,
    closed: AtomicBool,
}

impl WebDriverClient {
    /// Open a new session at `base_url` with the given capabilities
    pub async fn connect(
        base_url: &str,
        capabilities: Value,
        command_timeout: Duration,
        driver: Option<ChromeDriver>,
    ) -> BrowserResult<Self> {
        let http = Client::builder().timeout(command_timeout).build()?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let body = json!({ "capabilities": { "alwaysMatch": capabilities } });
        let value = send(http.post(format!("{}/session", base_url)).json(&body)).await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::Malformed("new session response without sessionId".into()))?
            .to_string();

        info!("WebDriver session {} opened at {}", session_id, base_url);

        Ok(Self {
            http,
            base_url,
            session_id,
            driver: Mutex::new(driver),
            closed: AtomicBool::new(false),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Page load and script timeouts; implicit waits stay off
    pub async fn set_timeouts(&self, timeout: Duration) -> BrowserResult<()> {
        let ms = timeout.as_millis() as u64;
        self.post("timeouts", json!({ "implicit": 0, "pageLoad": ms, "script": ms }))
            .await
            .map(|_| ())
    }

    /// Hide `navigator.webdriver` on every new document
    pub async fn hide_automation(&self) -> BrowserResult<()> {
        self.post(
            "goog/cdp/execute",
            json!({
                "cmd": "Page.addScriptToEvaluateOnNewDocument",
                "params": { "source": HIDE_WEBDRIVER_SCRIPT },
            }),
        )
        .await
        .map(|_| ())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/session/{}/{}", self.base_url, self.session_id, path)
    }

    async fn get(&self, path: &str) -> BrowserResult<Value> {
        send(self.http.get(self.url(path))).await
    }

    async fn post(&self, path: &str, body: Value) -> BrowserResult<Value> {
        send(self.http.post(self.url(path)).json(&body)).await
    }

    async fn shutdown_driver(&self) {
        if let Some(driver) = self.driver.lock().await.take() {
            driver.shutdown().await;
        }
    }
}

/// Send a WebDriver command and unwrap its `value`
async fn send(request: RequestBuilder) -> BrowserResult<Value> {
    let response = request.send().await?;
    let status = response.status();
    let body: Value = response.json().await?;

    let value = match body {
        Value::Object(mut map) => map.remove("value").unwrap_or(Value::Null),
        other => return Err(BrowserError::Malformed(format!("expected object, got {}", other))),
    };

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(BrowserError::Protocol {
            error: error.to_string(),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }

    if !status.is_success() {
        return Err(BrowserError::Protocol {
            error: status.to_string(),
            message: value.to_string(),
        });
    }

    Ok(value)
}

/// Whether the WebDriver server at `base_url` accepts new sessions
pub async fn status_ready(http: &Client, base_url: &str) -> BrowserResult<bool> {
    let value = send(http.get(format!("{}/status", base_url.trim_end_matches('/')))).await?;
    Ok(value.get("ready").and_then(Value::as_bool).unwrap_or(false))
}

fn expect_string(value: Value, what: &str) -> BrowserResult<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(BrowserError::Malformed(format!("{}: expected string, got {}", what, other))),
    }
}

#[async_trait]
impl Browser for WebDriverClient {
    async fn goto(&self, url: &str) -> BrowserResult<()> {
        self.post("url", json!({ "url": url })).await.map(|_| ())
    }

    async fn current_url(&self) -> BrowserResult<String> {
        expect_string(self.get("url").await?, "current url")
    }

    async fn page_source(&self) -> BrowserResult<String> {
        expect_string(self.get("source").await?, "page source")
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> BrowserResult<Value> {
        self.post("execute/sync", json!({ "script": script, "args": args }))
            .await
    }

    async fn find_all(&self, selector: &Selector) -> BrowserResult<Vec<ElementId>> {
        let value = self
            .post(
                "elements",
                json!({ "using": selector.strategy(), "value": selector.value() }),
            )
            .await?;

        match value {
            Value::Array(items) => Ok(items.iter().filter_map(ElementId::from_value).collect()),
            other => Err(BrowserError::Malformed(format!("elements: expected array, got {}", other))),
        }
    }

    async fn is_displayed(&self, element: &ElementId) -> BrowserResult<bool> {
        let value = self.get(&format!("element/{}/displayed", element.0)).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn attribute(&self, element: &ElementId, name: &str) -> BrowserResult<Option<String>> {
        let value = self
            .get(&format!("element/{}/attribute/{}", element.0, name))
            .await?;
        Ok(match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }

    async fn text(&self, element: &ElementId) -> BrowserResult<String> {
        expect_string(self.get(&format!("element/{}/text", element.0)).await?, "element text")
    }

    async fn click(&self, element: &ElementId) -> BrowserResult<()> {
        self.post(&format!("element/{}/click", element.0), json!({}))
            .await
            .map(|_| ())
    }

    async fn pointer_click(&self, element: &ElementId) -> BrowserResult<()> {
        let actions = json!({
            "actions": [{
                "type": "pointer",
                "id": "mouse",
                "parameters": { "pointerType": "mouse" },
                "actions": [
                    { "type": "pointerMove", "duration": 0, "origin": element.as_arg(), "x": 0, "y": 0 },
                    { "type": "pointerDown", "button": 0 },
                    { "type": "pointerUp", "button": 0 },
                ],
            }],
        });
        self.post("actions", actions).await.map(|_| ())
    }

    async fn clear(&self, element: &ElementId) -> BrowserResult<()> {
        self.post(&format!("element/{}/clear", element.0), json!({}))
            .await
            .map(|_| ())
    }

    async fn send_keys(&self, element: &ElementId, text: &str) -> BrowserResult<()> {
        self.post(&format!("element/{}/value", element.0), json!({ "text": text }))
            .await
            .map(|_| ())
    }

    async fn screenshot(&self) -> BrowserResult<Vec<u8>> {
        let encoded = expect_string(self.get("screenshot").await?, "screenshot")?;
        Ok(base64::engine::general_purpose::STANDARD.decode(encoded)?)
    }

    async fn quit(&self) -> BrowserResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        debug!("Closing WebDriver session {}", self.session_id);
        let result = send(
            self.http
                .delete(format!("{}/session/{}", self.base_url, self.session_id)),
        )
        .await
        .map(|_| ());

        if let Err(e) = &result {
            warn!("Failed to close WebDriver session cleanly: {}", e);
        }

        self.shutdown_driver().await;
        info!("Browser closed");
        result
    }
}
