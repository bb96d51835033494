use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::controls::DEFAULT_END_PHRASES;

/// Configuration for joining and attending a meeting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Save a PNG per join step (best-effort)
    pub screenshots: bool,

    pub screenshots_dir: PathBuf,

    /// Wait after navigating before touching the page
    pub page_load_delay_ms: u64,

    /// Pause after filling the name and toggling devices
    pub action_delay_ms: u64,

    /// Pause after the join click before the first screenshot
    pub click_settle_ms: u64,

    /// Wait before checking whether we were admitted
    pub join_settle_delay_ms: u64,

    /// Wait after clicking leave before closing the browser
    pub leave_delay_ms: u64,

    /// Meeting-end monitor poll interval
    pub monitor_interval_ms: u64,

    /// Granularity of the stay-in-meeting wait
    pub stay_poll_interval_ms: u64,

    /// Wait after recording starts before the `04-recording-started` shot
    pub recording_screenshot_delay_ms: u64,

    /// Time into the stay at which `05-recording-in-progress` is taken
    pub progress_screenshot_after_ms: u64,

    /// Page text (case-insensitive) that means the call is over
    pub end_phrases: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            screenshots: true,
            screenshots_dir: PathBuf::from("./screenshots"),
            page_load_delay_ms: 3_000,
            action_delay_ms: 1_000,
            click_settle_ms: 2_000,
            join_settle_delay_ms: 5_000,
            leave_delay_ms: 2_000,
            monitor_interval_ms: 10_000,
            stay_poll_interval_ms: 15_000,
            recording_screenshot_delay_ms: 2_000,
            progress_screenshot_after_ms: 60_000,
            end_phrases: DEFAULT_END_PHRASES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl SessionConfig {
    pub fn page_load_delay(&self) -> Duration {
        Duration::from_millis(self.page_load_delay_ms)
    }

    pub fn action_delay(&self) -> Duration {
        Duration::from_millis(self.action_delay_ms)
    }

    pub fn click_settle(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }

    pub fn join_settle_delay(&self) -> Duration {
        Duration::from_millis(self.join_settle_delay_ms)
    }

    pub fn leave_delay(&self) -> Duration {
        Duration::from_millis(self.leave_delay_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    pub fn stay_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stay_poll_interval_ms)
    }

    pub fn recording_screenshot_delay(&self) -> Duration {
        Duration::from_millis(self.recording_screenshot_delay_ms)
    }

    pub fn progress_screenshot_after(&self) -> Duration {
        Duration::from_millis(self.progress_screenshot_after_ms)
    }
}
