use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::command::CaptureCommand;
use crate::state::{AtomicState, SharedState};

/// Capture job lifecycle
///
/// `Idle -> Starting -> Recording -> Stopping -> Stopped`, with `Failed`
/// reachable from `Starting` and `Recording`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CaptureState {
    Idle,
    Starting,
    Recording,
    Stopping,
    Stopped,
    Failed,
}

impl AtomicState for CaptureState {
    fn to_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => CaptureState::Idle,
            1 => CaptureState::Starting,
            2 => CaptureState::Recording,
            3 => CaptureState::Stopping,
            4 => CaptureState::Stopped,
            _ => CaptureState::Failed,
        }
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One screen/audio recording run
#[derive(Debug)]
pub struct CaptureJob {
    pub id: Uuid,
    pub video_path: PathBuf,
    pub audio_path: PathBuf,
    /// ffmpeg's diagnostic stream
    pub log_path: PathBuf,
    pub command: CaptureCommand,
    pub start_time: Option<DateTime<Local>>,
    /// Set once audio extraction produced a file
    pub audio_extracted: Option<PathBuf>,
    pub(crate) state: SharedState<CaptureState>,
}

impl CaptureJob {
    pub(crate) fn new(paths: CapturePaths, command: CaptureCommand) -> Self {
        Self {
            id: Uuid::new_v4(),
            video_path: paths.video,
            audio_path: paths.audio,
            log_path: paths.log,
            command,
            start_time: None,
            audio_extracted: None,
            state: SharedState::new(CaptureState::Starting),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state.get()
    }

    pub fn video_size_bytes(&self) -> u64 {
        std::fs::metadata(&self.video_path).map(|m| m.len()).unwrap_or(0)
    }

    pub fn summary(&self) -> CaptureSummary {
        CaptureSummary {
            job_id: self.id,
            state: self.state(),
            video_path: self.video_path.clone(),
            video_bytes: self.video_size_bytes(),
            audio_path: self.audio_extracted.clone(),
            with_audio_input: self.command.has_audio(),
        }
    }
}

/// Serializable outcome of a capture job
#[derive(Debug, Clone, Serialize)]
pub struct CaptureSummary {
    pub job_id: Uuid,
    pub state: CaptureState,
    pub video_path: PathBuf,
    pub video_bytes: u64,
    pub audio_path: Option<PathBuf>,
    pub with_audio_input: bool,
}

/// Output files of one job, all sharing a stem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturePaths {
    pub video: PathBuf,
    pub audio: PathBuf,
    pub log: PathBuf,
}

impl CapturePaths {
    /// `{prefix}_{meeting_id}_{YYYYmmdd_HHMMSS}.{mp4,mp3,ffmpeg.log}`
    pub fn derive(dir: &Path, prefix: &str, meeting_id: &str, at: DateTime<Local>) -> Self {
        let stem = format!("{}_{}_{}", prefix, meeting_id, at.format("%Y%m%d_%H%M%S"));
        Self {
            video: dir.join(format!("{}.mp4", stem)),
            audio: dir.join(format!("{}.mp3", stem)),
            log: dir.join(format!("{}.ffmpeg.log", stem)),
        }
    }
}
