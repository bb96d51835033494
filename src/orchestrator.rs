use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, info_span, warn, Instrument, Span};

use crate::audio::DeviceResolver;
use crate::browser::BrowserLauncher;
use crate::capture::{CaptureManager, CaptureState, CaptureSummary};
use crate::config::Config;
use crate::session::{JoinState, MeetingAddress, SessionDriver, SessionStats};

/// What to attend and for how long
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub address: MeetingAddress,
    pub display_name: String,
    pub duration: Duration,
    pub record: bool,
}

/// Why the bot left the meeting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EndReason {
    DurationElapsed,
    MeetingEnded,
    Interrupted,
}

/// Serializable record of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub session: SessionStats,
    pub end_reason: EndReason,
    pub recording_requested: bool,
    pub capture: Option<CaptureSummary>,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(RunSummary),
    /// Join failed; nothing was recorded
    JoinFailed(SessionStats),
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Completed(_) => 0,
            RunOutcome::JoinFailed(_) => 1,
        }
    }
}

/// Runs join -> record -> stay -> stop recording -> leave
pub struct Orchestrator {
    config: Config,
    launcher: Arc<dyn BrowserLauncher>,
}

impl Orchestrator {
    pub fn new(config: Config, launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self { config, launcher }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Attend one meeting
    ///
    /// `shutdown` resolving abandons a join in progress or ends the stay
    /// early; capture is still stopped and the meeting left before returning.
    pub async fn run<F>(&self, options: RunOptions, shutdown: F) -> RunOutcome
    where
        F: Future<Output = ()>,
    {
        let span = info_span!("meeting", id = %options.address.meeting_id());
        tokio::pin!(shutdown);

        info!(
            parent: &span,
            "Bot initialized: name={}, headless={}, recording={}",
            options.display_name,
            self.config.browser.headless,
            options.record
        );

        let mut session = SessionDriver::new(
            self.config.session.clone(),
            self.launcher.clone(),
            options.display_name.clone(),
            span.clone(),
        );

        let joined = tokio::select! {
            joined = session.join(&options.address) => Some(joined),
            _ = shutdown.as_mut() => None,
        };

        match joined {
            Some(true) => {}
            Some(false) => {
                error!(parent: &span, "Failed to join meeting");
                return RunOutcome::JoinFailed(session.stats());
            }
            None => {
                info!(parent: &span, "Process interrupted by user while joining");
                session.leave().await;
                return RunOutcome::Completed(RunSummary {
                    session: session.stats(),
                    end_reason: EndReason::Interrupted,
                    recording_requested: options.record,
                    capture: None,
                });
            }
        }

        let mut capture = if options.record {
            self.start_capture(&session, options.address.meeting_id(), &span)
                .await
        } else {
            None
        };

        session.start_monitor();

        let end_reason = self
            .stay(&session, capture.as_ref(), options.duration, shutdown.as_mut())
            .instrument(span.clone())
            .await;

        let capture_summary = match capture.as_mut() {
            Some(manager) => {
                info!(parent: &span, "Stopping meeting recording");
                if !manager.stop().await {
                    warn!(parent: &span, "Issue stopping the recording");
                }
                manager.job().map(|job| job.summary())
            }
            None => None,
        };
        drop(capture);

        session.leave().await;

        let summary = RunSummary {
            session: session.stats(),
            end_reason,
            recording_requested: options.record,
            capture: capture_summary,
        };

        match serde_json::to_string(&summary) {
            Ok(json) => info!(parent: &span, "Run summary: {}", json),
            Err(e) => warn!(parent: &span, "Failed to serialize run summary: {}", e),
        }
        info!(parent: &span, "Meeting session completed ({:?})", end_reason);

        RunOutcome::Completed(summary)
    }

    async fn start_capture(
        &self,
        session: &SessionDriver,
        meeting_id: &str,
        span: &Span,
    ) -> Option<CaptureManager> {
        let mut manager =
            match CaptureManager::new(self.config.capture.clone(), meeting_id, span.clone()) {
                Ok(manager) => manager,
                Err(e) => {
                    warn!(parent: span, "Recording disabled: {:#}", e);
                    return None;
                }
            };

        let audio = DeviceResolver::new(manager.ffmpeg())
            .resolve(manager.platform())
            .instrument(span.clone())
            .await;

        match &audio {
            Some(device) => info!(parent: span, "Using audio device: {}", device.label),
            None => warn!(parent: span, "No audio device found, recording video only"),
        }

        info!(parent: span, "Starting meeting recording");
        if manager.start(audio).await {
            info!(parent: span, "Recording started successfully");
            tokio::time::sleep(self.config.session.recording_screenshot_delay()).await;
            session.screenshot("04-recording-started").await;
        } else {
            warn!(parent: span, "Failed to start recording, continuing without it");
        }

        // A failed start still holds the job, so its summary reaches the run record
        Some(manager)
    }

    /// Wait out the meeting in poll-interval slices
    async fn stay<F>(
        &self,
        session: &SessionDriver,
        capture: Option<&CaptureManager>,
        duration: Duration,
        mut shutdown: Pin<&mut F>,
    ) -> EndReason
    where
        F: Future<Output = ()>,
    {
        // Out-of-range durations mean "until the meeting ends"
        let deadline = Instant::now().checked_add(duration);
        let poll = self.config.session.stay_poll_interval();
        let progress_at =
            Instant::now().checked_add(self.config.session.progress_screenshot_after());
        let mut progress_taken = capture.is_none();

        info!(
            "Staying in meeting for {} minutes",
            duration.as_secs_f64() / 60.0
        );

        loop {
            if session.join_state() == JoinState::Ended {
                info!("Meeting ended, leaving");
                return EndReason::MeetingEnded;
            }

            if !progress_taken && progress_at.is_some_and(|at| Instant::now() >= at) {
                progress_taken = true;
                if capture.is_some_and(|manager| manager.state() == CaptureState::Recording) {
                    session.screenshot("05-recording-in-progress").await;
                }
            }

            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        info!("Meeting duration completed");
                        return EndReason::DurationElapsed;
                    }
                    poll.min(deadline - now)
                }
                None => poll,
            };
            let slice = match progress_at {
                Some(at) if !progress_taken => {
                    slice.min(at.saturating_duration_since(Instant::now()))
                }
                _ => slice,
            };

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Received interrupt, leaving meeting early");
                    return EndReason::Interrupted;
                }
                _ = tokio::time::sleep(slice) => {}
            }
        }
    }
}
