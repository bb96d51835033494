use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::browser::Browser;

/// Writes `<dir>/<step>.png` snapshots of the page; failures are only logged
#[derive(Debug, Clone)]
pub struct ScreenshotRecorder {
    dir: Option<PathBuf>,
}

impl ScreenshotRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub async fn capture(&self, browser: &dyn Browser, step: &str) {
        let Some(dir) = &self.dir else {
            return;
        };

        match save(browser, dir, step).await {
            Ok(path) => info!("Saved screenshot: {}", path.display()),
            Err(e) => warn!("Failed to save screenshot {}: {:#}", step, e),
        }
    }
}

async fn save(browser: &dyn Browser, dir: &Path, step: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let png = browser.screenshot().await?;
    let path = dir.join(format!("{}.png", step));
    tokio::fs::write(&path, png)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
