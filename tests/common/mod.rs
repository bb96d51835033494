// Scripted browser fake shared by the session and orchestrator tests
//
// Elements are registered under the exact selector string the code queries
// with. Scripts are matched by a marker substring.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use meet_guest::browser::{
    Browser, BrowserError, BrowserLauncher, BrowserResult, ElementId, Selector, SharedBrowser,
};
use meet_guest::SessionConfig;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 1x1 transparent PNG
pub const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

#[derive(Default)]
struct Page {
    url: String,
    source: String,
    redirect: Option<String>,
    elements: HashMap<String, Vec<String>>,
    hidden: HashSet<String>,
    attributes: HashMap<(String, String), String>,
    scripts: Vec<(String, Value)>,
    failing_clicks: HashSet<String>,
    goto_delay: Duration,
    unreachable: bool,
    calls: Vec<String>,
    quits: usize,
}

pub struct FakeBrowser {
    page: Mutex<Page>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self {
            page: Mutex::new(Page {
                url: "about:blank".to_string(),
                ..Page::default()
            }),
        }
    }

    fn page(&self) -> std::sync::MutexGuard<'_, Page> {
        self.page.lock().unwrap()
    }

    /// A visible element matched by `selector`
    pub fn with_element(self, selector: &str, id: &str) -> Self {
        self.page()
            .elements
            .entry(selector.to_string())
            .or_default()
            .push(id.to_string());
        self
    }

    pub fn with_hidden_element(self, selector: &str, id: &str) -> Self {
        self.page().hidden.insert(id.to_string());
        self.with_element(selector, id)
    }

    pub fn with_attribute(self, id: &str, name: &str, value: &str) -> Self {
        self.page()
            .attributes
            .insert((id.to_string(), name.to_string()), value.to_string());
        self
    }

    /// Scripts containing `marker` return `result`
    pub fn with_script(self, marker: &str, result: Value) -> Self {
        self.page().scripts.push((marker.to_string(), result));
        self
    }

    /// Direct clicks on `id` fail
    pub fn with_failing_click(self, id: &str) -> Self {
        self.page().failing_clicks.insert(id.to_string());
        self
    }

    /// Navigation lands on `url` instead of the requested one
    pub fn with_redirect(self, url: &str) -> Self {
        self.page().redirect = Some(url.to_string());
        self
    }

    /// Navigation takes `delay`, like a page that never finishes loading
    pub fn with_goto_delay(self, delay: Duration) -> Self {
        self.page().goto_delay = delay;
        self
    }

    pub fn set_url(&self, url: &str) {
        self.page().url = url.to_string();
    }

    pub fn set_source(&self, source: &str) {
        self.page().source = source.to_string();
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.page().unreachable = unreachable;
    }

    pub fn calls(&self) -> Vec<String> {
        self.page().calls.clone()
    }

    pub fn called(&self, call: &str) -> bool {
        self.page().calls.iter().any(|c| c == call)
    }

    pub fn quit_count(&self) -> usize {
        self.page().quits
    }

    fn record(&self, call: String) -> BrowserResult<()> {
        let mut page = self.page();
        if page.unreachable {
            return Err(unreachable_error());
        }
        page.calls.push(call);
        Ok(())
    }
}

fn unreachable_error() -> BrowserError {
    BrowserError::Protocol {
        error: "invalid session id".to_string(),
        message: "browser has gone away".to_string(),
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn goto(&self, url: &str) -> BrowserResult<()> {
        self.record(format!("goto:{}", url))?;
        let delay = self.page().goto_delay;
        tokio::time::sleep(delay).await;
        let mut page = self.page();
        page.url = page.redirect.clone().unwrap_or_else(|| url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> BrowserResult<String> {
        let page = self.page();
        if page.unreachable {
            return Err(unreachable_error());
        }
        Ok(page.url.clone())
    }

    async fn page_source(&self) -> BrowserResult<String> {
        let page = self.page();
        if page.unreachable {
            return Err(unreachable_error());
        }
        Ok(page.source.clone())
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> BrowserResult<Value> {
        if script.trim() == "arguments[0].click();" {
            let id = args
                .first()
                .and_then(ElementId::from_value)
                .map(|e| e.0)
                .unwrap_or_default();
            self.record(format!("script-click:{}", id))?;
            return Ok(Value::Null);
        }

        self.record("script".to_string())?;
        let page = self.page();
        Ok(page
            .scripts
            .iter()
            .find(|(marker, _)| script.contains(marker.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or(Value::Null))
    }

    async fn find_all(&self, selector: &Selector) -> BrowserResult<Vec<ElementId>> {
        let page = self.page();
        if page.unreachable {
            return Err(unreachable_error());
        }
        Ok(page
            .elements
            .get(selector.value())
            .map(|ids| ids.iter().map(|id| ElementId(id.clone())).collect())
            .unwrap_or_default())
    }

    async fn is_displayed(&self, element: &ElementId) -> BrowserResult<bool> {
        Ok(!self.page().hidden.contains(&element.0))
    }

    async fn attribute(&self, element: &ElementId, name: &str) -> BrowserResult<Option<String>> {
        Ok(self
            .page()
            .attributes
            .get(&(element.0.clone(), name.to_string()))
            .cloned())
    }

    async fn text(&self, element: &ElementId) -> BrowserResult<String> {
        Ok(element.0.clone())
    }

    async fn click(&self, element: &ElementId) -> BrowserResult<()> {
        if self.page().failing_clicks.contains(&element.0) {
            return Err(BrowserError::Protocol {
                error: "element click intercepted".to_string(),
                message: element.0.clone(),
            });
        }
        self.record(format!("click:{}", element.0))
    }

    async fn pointer_click(&self, element: &ElementId) -> BrowserResult<()> {
        self.record(format!("pointer:{}", element.0))
    }

    async fn clear(&self, element: &ElementId) -> BrowserResult<()> {
        self.record(format!("clear:{}", element.0))
    }

    async fn send_keys(&self, element: &ElementId, text: &str) -> BrowserResult<()> {
        self.record(format!("keys:{}:{}", element.0, text))
    }

    async fn screenshot(&self) -> BrowserResult<Vec<u8>> {
        if self.page().unreachable {
            return Err(unreachable_error());
        }
        Ok(TINY_PNG.to_vec())
    }

    async fn quit(&self) -> BrowserResult<()> {
        let mut page = self.page();
        page.quits += 1;
        page.calls.push("quit".to_string());
        Ok(())
    }
}

/// Hands out the same fake browser on every launch
pub struct FakeLauncher {
    browser: Option<Arc<FakeBrowser>>,
    launches: AtomicUsize,
}

impl FakeLauncher {
    pub fn new(browser: Arc<FakeBrowser>) -> Self {
        Self {
            browser: Some(browser),
            launches: AtomicUsize::new(0),
        }
    }

    /// Every launch fails, as when chromedriver is missing
    pub fn failing() -> Self {
        Self {
            browser: None,
            launches: AtomicUsize::new(0),
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> Result<SharedBrowser> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        match &self.browser {
            Some(browser) => Ok(browser.clone() as SharedBrowser),
            None => bail!("chromedriver not found"),
        }
    }
}

/// A Meet pre-join page where the scripted strategies succeed
pub fn meet_page() -> FakeBrowser {
    FakeBrowser::new()
        .with_script("input.id === 'c11'", Value::Bool(true))
        .with_script("UywwFc-LgbsSe", Value::Bool(true))
        .with_element("//button[contains(@aria-label, 'participants')]", "people-button")
}

/// Session config with no waits and screenshots under `dir`
pub fn fast_session_config(dir: &Path) -> SessionConfig {
    SessionConfig {
        screenshots: true,
        screenshots_dir: dir.to_path_buf(),
        page_load_delay_ms: 0,
        action_delay_ms: 0,
        click_settle_ms: 0,
        join_settle_delay_ms: 0,
        leave_delay_ms: 0,
        monitor_interval_ms: 20,
        stay_poll_interval_ms: 20,
        recording_screenshot_delay_ms: 0,
        ..SessionConfig::default()
    }
}

/// Poll `check` until it holds or `timeout` passes
pub async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Extraction runs succeed with a stub MP3
#[cfg(target_os = "linux")]
pub const EXTRACT_OK: &str = r#"printf 'ID3' > "$last"; exit 0"#;

/// Records until SIGTERM, then finalizes and exits cleanly
#[cfg(target_os = "linux")]
pub const RECORDER: &str = r#"trap 'printf done >> "$last"; exit 0' TERM
while :; do printf x >> "$last"; sleep 0.05; done"#;

/// A shell stand-in for ffmpeg
///
/// Runs with `-vn` are extractions: they are logged to `extractions` and
/// run `extract`. Every other run is logged to `launches` and runs
/// `body`. `$last` holds the output path.
#[cfg(target_os = "linux")]
pub fn write_fake_ffmpeg_with(dir: &Path, extract: &str, body: &str) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-ffmpeg");
    let script = format!(
        r#"#!/bin/sh
for last; do :; done
case " $* " in
  *" -vn "*)
    echo "$*" >> "{extractions}"
    {extract}
    ;;
esac
echo "$*" >> "{launches}"
{body}
"#,
        extractions = dir.join("extractions").display(),
        launches = dir.join("launches").display(),
        extract = extract,
        body = body
    );
    fs::write(&path, script)?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

#[cfg(target_os = "linux")]
pub fn write_fake_ffmpeg(dir: &Path, body: &str) -> Result<PathBuf> {
    write_fake_ffmpeg_with(dir, EXTRACT_OK, body)
}

/// Lines logged by the fake ffmpeg under `name`
pub fn logged_runs(dir: &Path, name: &str) -> Vec<String> {
    fs::read_to_string(dir.join(name))
        .map(|text| text.lines().map(String::from).collect())
        .unwrap_or_default()
}
