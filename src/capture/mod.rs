// Screen (and audio) recording through ffmpeg

pub mod command;
pub mod config;
pub mod display;
pub mod job;
pub mod manager;
pub mod process;

pub use command::CaptureCommand;
pub use config::CaptureConfig;
pub use display::{detect_screen_size, ScreenSize};
pub use job::{CaptureJob, CapturePaths, CaptureState, CaptureSummary};
pub use manager::{is_audio_failure, CaptureManager};
pub use process::{CaptureProcess, ProcessStatus, ProcessWatcher};
