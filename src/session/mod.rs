//! Meeting session management
//!
//! This module provides the `SessionDriver` that:
//! - Normalizes the meeting address
//! - Fills the guest name, mutes devices and asks to join
//! - Watches for the meeting to end
//! - Leaves and releases the browser

mod address;
mod config;
pub mod controls;
mod driver;
mod screenshots;
mod state;
mod stats;
pub mod strategy;

pub use address::{has_meeting_path, is_session_url, MeetingAddress, MEET_HOST};
pub use config::SessionConfig;
pub use driver::SessionDriver;
pub use screenshots::ScreenshotRecorder;
pub use state::{JoinConfidence, JoinState};
pub use stats::SessionStats;
pub use strategy::{click_with_fallback, Cascade, ClickMethod, Strategy};
