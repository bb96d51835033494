use reqwest::Client;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::webdriver::status_ready;
use super::{BrowserError, BrowserResult};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A chromedriver process we spawned and own
///
/// Killed on `shutdown` or when dropped.
pub struct ChromeDriver {
    child: Child,
    url: String,
}

impl ChromeDriver {
    /// Spawn chromedriver on `port` and wait until it reports ready
    pub async fn spawn(program: &Path, port: u16, startup_timeout: Duration) -> BrowserResult<Self> {
        let program = which::which(program).map_err(|e| {
            BrowserError::Launch(format!("chromedriver not found ({}): {}", program.display(), e))
        })?;

        info!("Starting {} on port {}", program.display(), port);

        let child = Command::new(&program)
            .arg(format!("--port={}", port))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let mut driver = Self {
            child,
            url: format!("http://127.0.0.1:{}", port),
        };
        driver.wait_ready(startup_timeout).await?;
        Ok(driver)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn wait_ready(&mut self, timeout: Duration) -> BrowserResult<()> {
        let http = Client::builder().timeout(Duration::from_secs(2)).build()?;
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(status) = self.child.try_wait()? {
                return Err(BrowserError::Launch(format!(
                    "chromedriver exited during startup ({})",
                    status
                )));
            }

            match status_ready(&http, &self.url).await {
                Ok(true) => {
                    debug!("chromedriver ready at {}", self.url);
                    return Ok(());
                }
                Ok(false) => debug!("chromedriver not ready yet"),
                Err(e) => debug!("chromedriver not reachable yet: {}", e),
            }

            if Instant::now() >= deadline {
                return Err(BrowserError::Launch(format!(
                    "chromedriver did not become ready within {:?}",
                    timeout
                )));
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    pub async fn shutdown(mut self) {
        if let Err(e) = self.child.kill().await {
            warn!("Failed to stop chromedriver: {}", e);
        }
    }
}
