use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Desktop Chrome user agent presented to the meeting page
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36";

/// Configuration for the automated browser
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Existing WebDriver endpoint (e.g. `http://localhost:4444`).
    /// A local chromedriver is spawned when unset or unreachable.
    pub webdriver_url: Option<String>,

    pub chromedriver_path: PathBuf,

    pub chromedriver_port: u16,

    /// How long chromedriver may take to report ready
    pub startup_timeout_ms: u64,

    /// Run Chrome without a window. `--debug` turns this off.
    pub headless: bool,

    pub user_agent: String,

    /// Chrome executable, when not the one chromedriver finds by itself
    pub chrome_binary: Option<PathBuf>,

    /// Bound on page loads, scripts and each WebDriver request
    pub command_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: None,
            chromedriver_path: PathBuf::from("chromedriver"),
            chromedriver_port: 9515,
            startup_timeout_ms: 15_000,
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            chrome_binary: None,
            command_timeout_ms: 30_000,
        }
    }
}

impl BrowserConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}
