use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use super::chromedriver::ChromeDriver;
use super::config::BrowserConfig;
use super::webdriver::WebDriverClient;
use super::SharedBrowser;

/// Creates browser sessions for the session driver
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<SharedBrowser>;
}

/// Chrome capabilities for unattended meeting attendance
///
/// Media permission prompts are auto-accepted with fake devices and the
/// usual automation markers are turned off.
pub fn chrome_capabilities(config: &BrowserConfig) -> Value {
    let mut args: Vec<String> = Vec::new();

    if config.headless {
        args.push("--headless=new".into());
        args.push("--disable-gpu".into());
    } else {
        args.push("--start-maximized".into());
    }

    args.extend(
        [
            "--use-fake-ui-for-media-stream",
            "--use-fake-device-for-media-stream",
            "--disable-blink-features=AutomationControlled",
            "--no-sandbox",
            "--disable-dev-shm-usage",
        ]
        .map(String::from),
    );
    args.push(format!("--user-agent={}", config.user_agent));

    let mut options = json!({
        "args": args,
        "excludeSwitches": ["enable-automation"],
        "useAutomationExtension": false,
    });

    if let Some(binary) = &config.chrome_binary {
        options["binary"] = json!(binary.display().to_string());
    }

    json!({
        "browserName": "chrome",
        "goog:chromeOptions": options,
    })
}

/// Launches Chrome through WebDriver
pub struct ChromeLauncher {
    config: BrowserConfig,
}

impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    async fn connect_remote(&self, url: &str) -> Result<WebDriverClient> {
        info!("Connecting to WebDriver at {}", url);
        let client = WebDriverClient::connect(
            url,
            chrome_capabilities(&self.config),
            self.config.command_timeout(),
            None,
        )
        .await?;
        Ok(client)
    }

    async fn connect_local(&self) -> Result<WebDriverClient> {
        let driver = ChromeDriver::spawn(
            &self.config.chromedriver_path,
            self.config.chromedriver_port,
            self.config.startup_timeout(),
        )
        .await
        .context("Failed to start chromedriver")?;

        let url = driver.url().to_string();
        let client = WebDriverClient::connect(
            &url,
            chrome_capabilities(&self.config),
            self.config.command_timeout(),
            Some(driver),
        )
        .await
        .context("Failed to create Chrome session")?;
        Ok(client)
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<SharedBrowser> {
        if self.config.headless {
            info!("Running in headless mode");
        } else {
            info!("Running in debug mode with visible browser");
        }

        let remote = match &self.config.webdriver_url {
            Some(url) => match self.connect_remote(url).await {
                Ok(client) => Some(client),
                Err(e) => {
                    warn!("WebDriver at {} unavailable: {:#}", url, e);
                    None
                }
            },
            None => None,
        };

        let client = match remote {
            Some(client) => client,
            None => self.connect_local().await?,
        };

        if let Err(e) = client.hide_automation().await {
            warn!("Could not apply automation masking: {}", e);
        }
        if let Err(e) = client.set_timeouts(self.config.command_timeout()).await {
            warn!("Could not set session timeouts: {}", e);
        }

        info!("Chrome browser initialized successfully");
        Ok(Arc::new(client))
    }
}
