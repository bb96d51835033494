use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for screen/audio capture
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Directory recordings are written to
    pub output_dir: PathBuf,

    /// Filename prefix: `{prefix}_{meeting_id}_{timestamp}.mp4`
    pub prefix: String,

    /// ffmpeg executable (name on PATH or absolute path)
    pub ffmpeg_path: PathBuf,

    /// Capture framerate. Kept low for CPU usage.
    pub framerate: u32,

    /// x264 preset (speed over size)
    pub preset: String,

    /// x264 constant rate factor (higher = smaller file)
    pub crf: u8,

    pub pixel_format: String,

    pub audio_bitrate: String,

    /// `WIDTHxHEIGHT`; detected from the display when unset
    pub video_size: Option<String>,

    /// X11 display to grab on Linux; `$DISPLAY` or `:0.0` when unset
    pub x11_display: Option<String>,

    /// avfoundation screen device index on macOS
    pub screen_device: String,

    /// MP3 quality for the extracted audio (0-9, lower is better)
    pub mp3_quality: u8,

    /// How long to wait after launch before checking the process survived
    pub probe_delay_ms: u64,

    /// Health check interval of the background supervisor
    pub supervisor_interval_ms: u64,

    /// Wait for ffmpeg to finalize the file after a quit request
    pub graceful_stop_timeout_ms: u64,

    /// Wait after a forced kill
    pub kill_timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./recordings"),
            prefix: "meet".to_string(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            framerate: 15,
            preset: "ultrafast".to_string(),
            crf: 28,
            pixel_format: "yuv420p".to_string(),
            audio_bitrate: "128k".to_string(),
            video_size: None,
            x11_display: None,
            screen_device: "1".to_string(),
            mp3_quality: 4,
            probe_delay_ms: 1_000,
            supervisor_interval_ms: 30_000,
            graceful_stop_timeout_ms: 10_000,
            kill_timeout_ms: 5_000,
        }
    }
}

impl CaptureConfig {
    pub fn probe_delay(&self) -> Duration {
        Duration::from_millis(self.probe_delay_ms)
    }

    pub fn supervisor_interval(&self) -> Duration {
        Duration::from_millis(self.supervisor_interval_ms)
    }

    pub fn graceful_stop_timeout(&self) -> Duration {
        Duration::from_millis(self.graceful_stop_timeout_ms)
    }

    pub fn kill_timeout(&self) -> Duration {
        Duration::from_millis(self.kill_timeout_ms)
    }
}
