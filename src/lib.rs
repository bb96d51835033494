pub mod audio;
pub mod browser;
pub mod capture;
pub mod config;
pub mod logging;
pub mod orchestrator;
pub mod platform;
pub mod session;
pub mod state;

pub use audio::{AudioArtifact, AudioDevice, AudioExtractor, DeviceResolver, ExtractionMethod};
pub use browser::{Browser, BrowserConfig, BrowserError, BrowserLauncher, ChromeLauncher, Selector};
pub use capture::{CaptureConfig, CaptureManager, CaptureState, CaptureSummary};
pub use config::Config;
pub use orchestrator::{EndReason, Orchestrator, RunOptions, RunOutcome, RunSummary};
pub use platform::Platform;
pub use session::{JoinConfidence, JoinState, MeetingAddress, SessionConfig, SessionDriver, SessionStats};
