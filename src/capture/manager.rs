use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument, Span};

use super::command::CaptureCommand;
use super::config::CaptureConfig;
use super::display::{detect_screen_size, ScreenSize};
use super::job::{CaptureJob, CapturePaths, CaptureState};
use super::process::{CaptureProcess, ProcessStatus, ProcessWatcher};
use crate::audio::{AudioArtifact, AudioDevice, AudioExtractor};
use crate::platform::Platform;
use crate::state::SharedState;

const MB: f64 = 1024.0 * 1024.0;

/// Lines of ffmpeg diagnostics quoted in error logs
const DIAGNOSTIC_TAIL_LINES: usize = 20;

/// Whether ffmpeg's diagnostics point at the audio input
pub fn is_audio_failure(diagnostics: &str) -> bool {
    let text = diagnostics.to_lowercase();
    text.contains("audio") && text.contains("error")
}

fn read_diagnostics(log_path: &Path) -> String {
    match fs::read_to_string(log_path) {
        Ok(text) => {
            let lines: Vec<&str> = text.lines().collect();
            let start = lines.len().saturating_sub(DIAGNOSTIC_TAIL_LINES);
            let tail = lines[start..].join("\n");
            if tail.trim().is_empty() {
                "No error output".to_string()
            } else {
                tail
            }
        }
        Err(e) => format!("<could not read {}: {}>", log_path.display(), e),
    }
}

enum Launch {
    Running(CaptureProcess),
    Exited {
        status: ProcessStatus,
        diagnostics: String,
    },
    Failed(anyhow::Error),
}

/// Launches, supervises and stops the ffmpeg screen recorder for one meeting
///
/// At most one job is `Starting`/`Recording` at a time. The manager is the
/// only writer of job state apart from the supervisor's
/// `Recording -> Failed` demotion.
pub struct CaptureManager {
    config: CaptureConfig,
    ffmpeg: PathBuf,
    platform: Platform,
    meeting_id: String,
    span: Span,
    job: Option<CaptureJob>,
    process: Option<CaptureProcess>,
    supervisor: Option<JoinHandle<()>>,
}

impl CaptureManager {
    /// Create a manager; fails when ffmpeg is not installed
    pub fn new(config: CaptureConfig, meeting_id: impl Into<String>, span: Span) -> Result<Self> {
        let ffmpeg = which::which(&config.ffmpeg_path).with_context(|| {
            format!(
                "FFmpeg not found ({}). Install FFmpeg (https://ffmpeg.org/download.html) \
                 and make sure it's in your PATH",
                config.ffmpeg_path.display()
            )
        })?;

        fs::create_dir_all(&config.output_dir).with_context(|| {
            format!("Failed to create recordings directory {}", config.output_dir.display())
        })?;

        info!("FFmpeg found at {}", ffmpeg.display());
        info!("Recordings will be saved to: {}", config.output_dir.display());

        Ok(Self {
            config,
            ffmpeg,
            platform: Platform::current(),
            meeting_id: meeting_id.into(),
            span,
            job: None,
            process: None,
            supervisor: None,
        })
    }

    /// Resolved ffmpeg executable
    pub fn ffmpeg(&self) -> &Path {
        &self.ffmpeg
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// State of the current (or last) job; `Idle` before the first start
    pub fn state(&self) -> CaptureState {
        self.job.as_ref().map_or(CaptureState::Idle, CaptureJob::state)
    }

    pub fn job(&self) -> Option<&CaptureJob> {
        self.job.as_ref()
    }

    /// Start recording the screen, with `audio` if given
    ///
    /// Returns false when the recorder could not be brought up; the caller
    /// may carry on without a recording.
    pub async fn start(&mut self, audio: Option<AudioDevice>) -> bool {
        let span = self.span.clone();
        self.start_inner(audio).instrument(span).await
    }

    async fn start_inner(&mut self, audio: Option<AudioDevice>) -> bool {
        if matches!(self.state(), CaptureState::Starting | CaptureState::Recording) {
            warn!("Recording is already in progress");
            return false;
        }

        let paths = CapturePaths::derive(
            &self.config.output_dir,
            &self.config.prefix,
            &self.meeting_id,
            Local::now(),
        );

        let screen = match self.config.video_size.as_deref().and_then(ScreenSize::parse) {
            Some(size) => size,
            None => detect_screen_size(self.platform).await,
        };

        let command = match CaptureCommand::build(
            &self.ffmpeg,
            self.platform,
            &self.config,
            screen,
            audio.as_ref(),
            &paths.video,
        ) {
            Ok(command) => command,
            Err(e) => {
                error!("Failed to create FFmpeg command: {:#}", e);
                return false;
            }
        };

        let mut job = CaptureJob::new(paths, command);
        info!(job_id = %job.id, "Starting recording ({} with audio: {})", screen, job.command.has_audio());

        let process = match self.launch(&job).await {
            Launch::Running(process) => Some(process),
            Launch::Exited {
                status,
                diagnostics,
            } if job.command.has_audio() && is_audio_failure(&diagnostics) => {
                error!("Recording process failed with audio ({:?}): {}", status, diagnostics);
                warn!("Audio capture failed, trying again without audio...");
                job.command = job.command.without_audio();

                match self.launch(&job).await {
                    Launch::Running(process) => Some(process),
                    Launch::Exited {
                        status,
                        diagnostics,
                    } => {
                        error!("Video-only recording also failed ({:?}): {}", status, diagnostics);
                        None
                    }
                    Launch::Failed(e) => {
                        error!("Failed to start video-only recording: {:#}", e);
                        None
                    }
                }
            }
            Launch::Exited {
                status,
                diagnostics,
            } => {
                error!("Recording process failed ({:?}): {}", status, diagnostics);
                None
            }
            Launch::Failed(e) => {
                error!("Failed to start recording: {:#}", e);
                None
            }
        };

        let Some(process) = process else {
            job.state.set(CaptureState::Failed);
            self.job = Some(job);
            return false;
        };

        job.start_time = Some(Local::now());
        job.state.set(CaptureState::Recording);
        info!("Recording to: {}", job.video_path.display());

        let supervisor = tokio::spawn(
            supervise(
                job.state.clone(),
                process.watcher(),
                job.video_path.clone(),
                job.log_path.clone(),
                self.config.supervisor_interval(),
            )
            .instrument(self.span.clone()),
        );

        self.job = Some(job);
        self.process = Some(process);
        self.supervisor = Some(supervisor);
        true
    }

    async fn launch(&self, job: &CaptureJob) -> Launch {
        info!(
            "Running capture command: {} {}",
            job.command.program().display(),
            job.command.args().join(" ")
        );

        let process = match CaptureProcess::spawn(&job.command, &job.log_path, &self.span) {
            Ok(process) => process,
            Err(e) => return Launch::Failed(e),
        };

        // Most misconfigurations (bad device, missing grabber) fail immediately
        tokio::time::sleep(self.config.probe_delay()).await;

        match process.status() {
            ProcessStatus::Running => Launch::Running(process),
            status => Launch::Exited {
                status,
                diagnostics: read_diagnostics(&job.log_path),
            },
        }
    }

    /// Stop the recording and extract its audio track
    ///
    /// No-op returning false unless a job is `Recording`.
    pub async fn stop(&mut self) -> bool {
        let span = self.span.clone();
        self.stop_inner().instrument(span).await
    }

    async fn stop_inner(&mut self) -> bool {
        let Some(job) = self.job.as_mut() else {
            warn!("No active recording to stop");
            return false;
        };

        if !job.state.transition(CaptureState::Recording, CaptureState::Stopping) {
            warn!("No active recording to stop (state: {})", job.state());
            // A job demoted to Failed may still hold a dead process handle
            if let Some(supervisor) = self.supervisor.take() {
                supervisor.abort();
            }
            self.process.take();
            return false;
        }

        if let Some(supervisor) = self.supervisor.take() {
            supervisor.abort();
        }

        info!("Stopping recording");

        if let Some(mut process) = self.process.take() {
            if let Err(e) = process.request_quit().await {
                warn!("Graceful stop request failed: {:#}", e);
            }

            if process.wait_for_exit(self.config.graceful_stop_timeout()).await {
                info!("Recording process terminated cleanly");
            } else {
                warn!("FFmpeg process didn't terminate, forcing...");
                process.kill();
                if !process.wait_for_exit(self.config.kill_timeout()).await {
                    error!("Capture process did not exit after kill");
                }
            }
        }

        job.state.set(CaptureState::Stopped);

        if let Some(started) = job.start_time {
            let duration = Local::now().signed_duration_since(started);
            info!("Recording completed. Duration: {}s", duration.num_seconds());
        }

        let size = job.video_size_bytes();
        if size == 0 {
            warn!(
                "Recording file {} is missing or empty. Check FFmpeg configuration and {}",
                job.video_path.display(),
                job.log_path.display()
            );
            return true;
        }

        info!(
            "Recording saved to: {} (Size: {:.2} MB)",
            job.video_path.display(),
            size as f64 / MB
        );

        let extractor = AudioExtractor::new(&self.ffmpeg, self.config.mp3_quality);
        match extractor.extract(&job.video_path, &job.audio_path).await {
            Ok(method) => {
                debug!("Audio extracted with {:?} settings", method);
                job.audio_extracted = Some(job.audio_path.clone());
                if let Err(e) = AudioArtifact::probe(&job.audio_path) {
                    debug!("Could not probe extracted audio: {:#}", e);
                }
            }
            Err(e) => {
                error!(
                    "Audio extraction failed, video kept at {}: {:#}",
                    job.video_path.display(),
                    e
                );
            }
        }

        true
    }
}

impl Drop for CaptureManager {
    fn drop(&mut self) {
        if let Some(supervisor) = self.supervisor.take() {
            supervisor.abort();
        }
        // Dropping the process handle kills a still-running recorder
        if self.process.take().is_some() {
            warn!("Capture manager dropped while recording; recorder killed");
        }
    }
}

/// Periodic health check of a running capture
///
/// Only ever writes `Recording -> Failed`.
async fn supervise(
    state: SharedState<CaptureState>,
    watcher: ProcessWatcher,
    video_path: PathBuf,
    log_path: PathBuf,
    interval: Duration,
) {
    info!("Started recording verification task");
    let started = Instant::now();
    let mut last_size: Option<u64> = None;

    loop {
        tokio::time::sleep(interval).await;

        if state.get() != CaptureState::Recording {
            break;
        }

        if !watcher.is_running() {
            if state.transition(CaptureState::Recording, CaptureState::Failed) {
                error!(
                    "Recording process terminated unexpectedly ({:?}). Error: {}",
                    watcher.status(),
                    read_diagnostics(&log_path)
                );
            }
            break;
        }

        match fs::metadata(&video_path) {
            Ok(meta) => {
                let size = meta.len();
                info!(
                    "Recording in progress. Duration: {}s, size: {:.2} MB",
                    started.elapsed().as_secs(),
                    size as f64 / MB
                );
                if last_size.is_some_and(|previous| size <= previous) {
                    warn!("Recording file is not growing ({} bytes)", size);
                }
                last_size = Some(size);
            }
            Err(_) => warn!("Recording file not created yet or missing"),
        }
    }
}
