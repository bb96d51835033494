use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument, Level, Span};

use super::address::{has_meeting_path, is_session_url, MeetingAddress};
use super::config::SessionConfig;
use super::controls;
use super::screenshots::ScreenshotRecorder;
use super::state::{JoinConfidence, JoinState};
use super::stats::SessionStats;
use super::strategy::first_visible;
use crate::browser::{Browser, BrowserLauncher, BrowserResult, Selector, SharedBrowser};
use crate::state::SharedState;

/// Drives one browser through joining, attending and leaving a meeting
///
/// The driver exclusively owns the browser. The meeting monitor only reads
/// the page and writes the `-> Ended` transition.
pub struct SessionDriver {
    config: SessionConfig,
    launcher: Arc<dyn BrowserLauncher>,
    display_name: String,
    address: Option<MeetingAddress>,
    browser: Option<SharedBrowser>,
    state: SharedState<JoinState>,
    confidence: Option<JoinConfidence>,
    joined_at: Option<DateTime<Utc>>,
    screenshots: ScreenshotRecorder,
    monitor: Option<JoinHandle<()>>,
    span: Span,
}

impl SessionDriver {
    pub fn new(
        config: SessionConfig,
        launcher: Arc<dyn BrowserLauncher>,
        display_name: impl Into<String>,
        span: Span,
    ) -> Self {
        let screenshots = if config.screenshots {
            ScreenshotRecorder::new(&config.screenshots_dir)
        } else {
            ScreenshotRecorder::disabled()
        };

        Self {
            config,
            launcher,
            display_name: display_name.into(),
            address: None,
            browser: None,
            state: SharedState::new(JoinState::NotStarted),
            confidence: None,
            joined_at: None,
            screenshots,
            monitor: None,
            span,
        }
    }

    pub fn join_state(&self) -> JoinState {
        self.state.get()
    }

    pub fn confidence(&self) -> Option<JoinConfidence> {
        self.confidence
    }

    pub fn has_browser(&self) -> bool {
        self.browser.is_some()
    }

    pub fn stats(&self) -> SessionStats {
        let duration_secs = self
            .joined_at
            .map(|at| (Utc::now() - at).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);

        SessionStats {
            meeting_id: self
                .address
                .as_ref()
                .map(|a| a.meeting_id().to_string())
                .unwrap_or_default(),
            display_name: self.display_name.clone(),
            join_state: self.state.get(),
            confidence: self.confidence,
            joined_at: self.joined_at,
            duration_secs,
        }
    }

    /// Join the meeting as a guest
    ///
    /// Returns false when the browser could not be launched, the name field
    /// or the join control could not be found, or navigation failed. The
    /// browser is released on every failure.
    pub async fn join(&mut self, address: &MeetingAddress) -> bool {
        let span = self.span.clone();
        self.join_inner(address).instrument(span).await
    }

    async fn join_inner(&mut self, address: &MeetingAddress) -> bool {
        if self.state.get() != JoinState::NotStarted {
            warn!("Session already started ({})", self.state.get());
            return false;
        }

        self.address = Some(address.clone());
        info!("Meeting ID: {}", address.meeting_id());

        let browser = match self.launcher.launch().await {
            Ok(browser) => browser,
            Err(e) => {
                error!("Failed to initialize browser, cannot join meeting: {:#}", e);
                self.state.set(JoinState::Failed);
                return false;
            }
        };
        self.browser = Some(browser.clone());

        match self.enter(browser.as_ref(), address).await {
            Ok(confidence) => {
                self.state
                    .transition(JoinState::AwaitingAdmission, JoinState::Joined);
                self.confidence = Some(confidence);
                self.joined_at = Some(Utc::now());
                info!("Successfully joined Google Meet session ({:?})", confidence);
                true
            }
            Err(e) => {
                error!("Failed to join meeting: {:#}", e);
                self.state.set(JoinState::Failed);
                self.release_browser().await;
                false
            }
        }
    }

    async fn enter(&self, browser: &dyn Browser, address: &MeetingAddress) -> Result<JoinConfidence> {
        info!("Navigating to meeting: {}", address.url());
        if let Err(e) = browser.goto(address.url()).await {
            self.screenshots.capture(browser, "error-exception").await;
            return Err(e).with_context(|| format!("Failed to open {}", address.url()));
        }
        tokio::time::sleep(self.config.page_load_delay()).await;
        self.screenshots.capture(browser, "01-initial-page").await;

        info!("Looking for the name input field");
        if controls::name_cascade(&self.display_name).run(browser).await.is_none() {
            self.screenshots.capture(browser, "error-name-field").await;
            bail!("Could not fill in name field");
        }
        tokio::time::sleep(self.config.action_delay()).await;
        self.screenshots.capture(browser, "01a-name-filled").await;

        info!("Turning off microphone and camera");
        self.mute_before_join(browser).await;
        self.screenshots
            .capture(browser, "01d-after-mic-camera-toggle")
            .await;

        self.screenshots.capture(browser, "02-before-join-click").await;
        if tracing::enabled!(Level::DEBUG) {
            log_visible_buttons(browser).await;
        }

        info!("Looking for 'Ask to join' button");
        if controls::join_cascade().run(browser).await.is_none() {
            self.screenshots.capture(browser, "error-join-button").await;
            bail!("Failed to click join button");
        }
        self.state
            .transition(JoinState::NotStarted, JoinState::AwaitingAdmission);

        tokio::time::sleep(self.config.click_settle()).await;
        self.screenshots.capture(browser, "02a-join-clicked").await;

        info!("Join button clicked, waiting to confirm entry...");
        tokio::time::sleep(self.config.join_settle_delay()).await;
        self.screenshots.capture(browser, "03-after-join").await;

        if verify_in_meeting(browser).await {
            info!("Successfully confirmed we're in the meeting");
            Ok(JoinConfidence::Confirmed)
        } else {
            warn!("Could not verify that we're in the meeting - proceeding anyway");
            Ok(JoinConfidence::Assumed)
        }
    }

    /// Turn off mic and camera before joining; failures are only logged
    async fn mute_before_join(&self, browser: &dyn Browser) {
        for (device, selector) in [
            ("Microphone", controls::MIC_OFF_SELECTOR),
            ("Camera", controls::CAMERA_OFF_SELECTOR),
        ] {
            match self.toggle_off(browser, &Selector::css(selector)).await {
                Ok(true) => info!("{} turned off", device),
                Ok(false) => debug!("No active {} control found", device.to_lowercase()),
                Err(e) => warn!("Could not turn off {} using data attributes: {}", device.to_lowercase(), e),
            }
        }

        match browser.execute(controls::MUTE_SCRIPT, Vec::new()).await {
            Ok(result) => {
                if result.get("micClicked").and_then(Value::as_bool) == Some(true) {
                    info!("Microphone turned off using script");
                }
                if result.get("camClicked").and_then(Value::as_bool) == Some(true) {
                    info!("Camera turned off using script");
                }
            }
            Err(e) => warn!("Scripted mic/camera toggle failed: {}", e),
        }
    }

    async fn toggle_off(&self, browser: &dyn Browser, selector: &Selector) -> BrowserResult<bool> {
        for element in browser.find_all(selector).await? {
            if !browser.is_displayed(&element).await? {
                continue;
            }
            if browser.attribute(&element, "data-is-muted").await?.as_deref() == Some("true") {
                continue;
            }
            browser.click(&element).await?;
            tokio::time::sleep(self.config.action_delay()).await;
            return Ok(true);
        }
        Ok(false)
    }

    /// Save a step screenshot of the current page; no-op without a browser
    pub async fn screenshot(&self, step: &str) {
        if let Some(browser) = &self.browser {
            self.screenshots
                .capture(browser.as_ref(), step)
                .instrument(self.span.clone())
                .await;
        }
    }

    /// Start the background meeting-end monitor
    pub fn start_monitor(&mut self) -> bool {
        let Some(browser) = self.browser.clone() else {
            warn!(parent: &self.span, "No browser session to monitor");
            return false;
        };
        if self.monitor.is_some() {
            return false;
        }

        let handle = tokio::spawn(
            monitor_meeting(
                browser,
                self.state.clone(),
                self.config.monitor_interval(),
                self.config.end_phrases.clone(),
            )
            .instrument(self.span.clone()),
        );
        info!(parent: &self.span, "Started meeting monitoring task");
        self.monitor = Some(handle);
        true
    }

    /// Leave the meeting and close the browser
    ///
    /// The browser is quit exactly once, whether or not a leave control was
    /// found. No-op without a browser.
    pub async fn leave(&mut self) {
        let span = self.span.clone();
        self.leave_inner().instrument(span).await
    }

    async fn leave_inner(&mut self) {
        let Some(browser) = self.browser.take() else {
            debug!("No browser session to leave");
            return;
        };

        if self.state.get() != JoinState::Failed {
            self.state.set(JoinState::Ended);
        }
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }

        info!("Attempting to leave meeting");
        match controls::leave_cascade().run(browser.as_ref()).await {
            Some(_) => {
                info!("Clicked leave button");
                tokio::time::sleep(self.config.leave_delay()).await;
            }
            None => warn!("Could not find leave button, will close browser directly"),
        }

        if let Err(e) = browser.quit().await {
            warn!("Error closing browser: {}", e);
        }
    }

    async fn release_browser(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
        if let Some(browser) = self.browser.take() {
            if let Err(e) = browser.quit().await {
                warn!("Error closing browser: {}", e);
            }
        }
    }
}

impl Drop for SessionDriver {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
    }
}

async fn verify_in_meeting(browser: &dyn Browser) -> bool {
    for selector in controls::join_indicators() {
        match first_visible(browser, &selector).await {
            Ok(Some(_)) => {
                info!("Found meeting indicator: {}", selector);
                return true;
            }
            Ok(None) => {}
            Err(e) => debug!("Indicator check {} failed: {}", selector, e),
        }
    }

    match browser.current_url().await {
        Ok(url) if has_meeting_path(&url) => {
            info!("Currently in a Google Meet URL: {}", url);
            true
        }
        Ok(_) => false,
        Err(e) => {
            warn!("Error while verifying if in meeting: {}", e);
            false
        }
    }
}

async fn log_visible_buttons(browser: &dyn Browser) {
    let buttons = match browser.find_all(&Selector::css("button")).await {
        Ok(buttons) => buttons,
        Err(e) => {
            debug!("Error listing buttons: {}", e);
            return;
        }
    };
    debug!("Found {} buttons on page", buttons.len());

    for (i, button) in buttons.iter().enumerate() {
        if !browser.is_displayed(button).await.unwrap_or(false) {
            continue;
        }
        let text = browser.text(button).await.unwrap_or_default();
        let class = browser.attribute(button, "class").await.ok().flatten();
        let jsname = browser.attribute(button, "jsname").await.ok().flatten();
        let disabled = browser.attribute(button, "disabled").await.ok().flatten();
        debug!(
            "Button {}: '{}' (class: {:?}, jsname: {:?}, disabled: {:?})",
            i,
            text.trim(),
            class,
            jsname,
            disabled
        );
    }
}

/// Why the monitor considers the meeting over
async fn meeting_end_reason(
    browser: &dyn Browser,
    end_phrases: &[String],
) -> BrowserResult<Option<&'static str>> {
    let url = browser.current_url().await?;
    if !is_session_url(&url) {
        return Ok(Some("No longer on Google Meet URL"));
    }

    let source = browser.page_source().await?.to_lowercase();
    if end_phrases
        .iter()
        .any(|phrase| source.contains(&phrase.to_lowercase()))
    {
        return Ok(Some("Detected meeting end message"));
    }
    Ok(None)
}

async fn monitor_meeting(
    browser: SharedBrowser,
    state: SharedState<JoinState>,
    interval: Duration,
    end_phrases: Vec<String>,
) {
    loop {
        tokio::time::sleep(interval).await;

        if state.get().is_terminal() {
            break;
        }

        match meeting_end_reason(browser.as_ref(), &end_phrases).await {
            Ok(None) => continue,
            Ok(Some(reason)) => info!("{} - meeting ended", reason),
            Err(e) => warn!("Browser unreachable in meeting monitor ({}) - treating meeting as ended", e),
        }

        if !state.transition(JoinState::Joined, JoinState::Ended) {
            state.transition(JoinState::AwaitingAdmission, JoinState::Ended);
        }
        break;
    }
    debug!("Meeting monitor stopped");
}
