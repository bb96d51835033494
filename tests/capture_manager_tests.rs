// Integration tests for the capture process manager
//
// ffmpeg is replaced by small shell scripts (see `common`) so launch, audio
// fallback, supervision, graceful stop and audio extraction run without it.

#![cfg(target_os = "linux")]

mod common;

use anyhow::Result;
use common::{logged_runs, write_fake_ffmpeg, write_fake_ffmpeg_with, RECORDER};
use meet_guest::capture::{is_audio_failure, CaptureConfig, CaptureManager, CaptureState};
use meet_guest::AudioDevice;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use tracing::Span;

// Writing an executable while another test thread forks can fail with
// ETXTBSY, so these tests run one at a time.
static SERIAL: Mutex<()> = Mutex::new(());

fn launches(dir: &Path) -> Vec<String> {
    logged_runs(dir, "launches")
}

fn capture_config(dir: &Path, ffmpeg: PathBuf) -> CaptureConfig {
    CaptureConfig {
        output_dir: dir.join("recordings"),
        ffmpeg_path: ffmpeg,
        video_size: Some("1280x720".to_string()),
        x11_display: Some(":99".to_string()),
        probe_delay_ms: 300,
        supervisor_interval_ms: 100,
        graceful_stop_timeout_ms: 2_000,
        kill_timeout_ms: 2_000,
        ..CaptureConfig::default()
    }
}

fn monitor_device() -> AudioDevice {
    AudioDevice::new("alsa_output.pci.monitor", "Monitor of Built-in Audio")
}

#[tokio::test]
async fn test_record_stop_and_extract() -> Result<()> {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new()?;
    let ffmpeg = write_fake_ffmpeg(temp_dir.path(), RECORDER)?;
    let mut manager = CaptureManager::new(capture_config(temp_dir.path(), ffmpeg), "abc-defg-hij", Span::none())?;

    assert_eq!(manager.state(), CaptureState::Idle);
    assert!(manager.start(Some(monitor_device())).await);
    assert_eq!(manager.state(), CaptureState::Recording);

    // A second start while recording is refused
    assert!(!manager.start(None).await);
    assert_eq!(launches(temp_dir.path()).len(), 1);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(manager.stop().await);
    assert_eq!(manager.state(), CaptureState::Stopped);

    let job = manager.job().expect("job");
    let video = fs::read_to_string(&job.video_path)?;
    assert!(video.ends_with("done"), "Recorder should finalize on graceful stop");
    assert!(job.video_path.file_name().unwrap().to_string_lossy().starts_with("meet_abc-defg-hij_"));
    assert_eq!(job.audio_extracted.as_deref(), Some(job.audio_path.as_path()));
    assert_eq!(fs::read_to_string(&job.audio_path)?, "ID3");
    assert!(job.log_path.exists());

    let launch = &launches(temp_dir.path())[0];
    assert!(launch.contains("x11grab"));
    assert!(launch.contains("1280x720"));
    assert!(launch.contains("-f pulse -i alsa_output.pci.monitor"));

    // Stopping again is a no-op
    assert!(!manager.stop().await);

    Ok(())
}

#[tokio::test]
async fn test_audio_failure_retries_without_audio() -> Result<()> {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new()?;
    let body = format!(
        r#"case " $* " in
  *" pulse "*) echo "[pulse @ 0x1] Error opening audio input: No such entity" >&2; exit 1 ;;
esac
{}"#,
        RECORDER
    );
    let ffmpeg = write_fake_ffmpeg(temp_dir.path(), &body)?;
    let mut manager = CaptureManager::new(capture_config(temp_dir.path(), ffmpeg), "abc-defg-hij", Span::none())?;

    assert!(manager.start(Some(monitor_device())).await);
    assert_eq!(manager.state(), CaptureState::Recording);

    let job = manager.job().expect("job");
    assert!(!job.command.has_audio());

    let launches = launches(temp_dir.path());
    assert_eq!(launches.len(), 2, "Exactly one retry");
    assert!(launches[0].contains("pulse"));
    assert!(!launches[1].contains("pulse"));

    assert!(manager.stop().await);
    Ok(())
}

#[tokio::test]
async fn test_audio_and_video_only_failures_end_failed() -> Result<()> {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new()?;
    let ffmpeg = write_fake_ffmpeg(
        temp_dir.path(),
        r#"echo "[x11grab @ 0x1] audio device error: cannot open display" >&2; exit 1"#,
    )?;
    let mut manager = CaptureManager::new(capture_config(temp_dir.path(), ffmpeg), "abc-defg-hij", Span::none())?;

    assert!(!manager.start(Some(monitor_device())).await);
    assert_eq!(manager.state(), CaptureState::Failed);

    // One launch with audio, one without, and no further attempts
    let launches = launches(temp_dir.path());
    assert_eq!(launches.len(), 2);
    assert!(launches[0].contains("pulse"));
    assert!(!launches[1].contains("pulse"));

    assert!(!manager.stop().await);
    assert!(job_audio_missing(&manager));

    Ok(())
}

#[tokio::test]
async fn test_extraction_falls_back_to_compatible_settings() -> Result<()> {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new()?;
    let extract = r#"case " $* " in
      *" libmp3lame "*) echo "Unknown encoder 'libmp3lame'" >&2; exit 1 ;;
    esac
    printf 'ID3' > "$last"; exit 0"#;
    let ffmpeg = write_fake_ffmpeg_with(temp_dir.path(), extract, RECORDER)?;
    let mut manager = CaptureManager::new(capture_config(temp_dir.path(), ffmpeg), "abc-defg-hij", Span::none())?;

    assert!(manager.start(None).await);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(manager.stop().await);

    let job = manager.job().expect("job");
    assert_eq!(job.audio_extracted.as_deref(), Some(job.audio_path.as_path()));
    assert_eq!(fs::read_to_string(&job.audio_path)?, "ID3");

    let extractions = logged_runs(temp_dir.path(), "extractions");
    assert_eq!(extractions.len(), 2);
    assert!(extractions[0].contains("libmp3lame"));
    let fallback = &extractions[1];
    assert!(fallback.contains("-ar 44100"));
    assert!(fallback.contains("-ac 2"));
    assert!(fallback.contains("-b:a 192k"));
    assert!(!fallback.contains("libmp3lame"));

    Ok(())
}

#[tokio::test]
async fn test_failed_extraction_keeps_video() -> Result<()> {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new()?;
    let ffmpeg = write_fake_ffmpeg_with(
        temp_dir.path(),
        r#"echo "Output file #0 does not contain any stream" >&2; exit 1"#,
        RECORDER,
    )?;
    let mut manager = CaptureManager::new(capture_config(temp_dir.path(), ffmpeg), "abc-defg-hij", Span::none())?;

    assert!(manager.start(None).await);
    tokio::time::sleep(Duration::from_millis(150)).await;

    // The recording itself stopped fine, so stop still reports success
    assert!(manager.stop().await);
    assert_eq!(manager.state(), CaptureState::Stopped);

    let job = manager.job().expect("job");
    assert!(job.audio_extracted.is_none());
    assert!(!job.audio_path.exists());
    assert!(job.video_size_bytes() > 0);
    assert_eq!(logged_runs(temp_dir.path(), "extractions").len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_non_audio_failure_is_not_retried() -> Result<()> {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new()?;
    let ffmpeg = write_fake_ffmpeg(
        temp_dir.path(),
        r#"echo "Unknown encoder 'libx264'" >&2; exit 1"#,
    )?;
    let mut manager = CaptureManager::new(capture_config(temp_dir.path(), ffmpeg), "abc-defg-hij", Span::none())?;

    assert!(!manager.start(Some(monitor_device())).await);
    assert_eq!(manager.state(), CaptureState::Failed);
    assert_eq!(launches(temp_dir.path()).len(), 1);

    let job = manager.job().expect("job");
    let log = fs::read_to_string(&job.log_path)?;
    assert!(log.contains("Unknown encoder"));
    assert!(!is_audio_failure(&log));

    // Nothing to stop, no extraction
    assert!(!manager.stop().await);
    assert!(job_audio_missing(&manager));

    Ok(())
}

#[tokio::test]
async fn test_supervisor_marks_dead_recorder_failed() -> Result<()> {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new()?;
    let ffmpeg = write_fake_ffmpeg(temp_dir.path(), r#"printf x >> "$last"; sleep 0.5; exit 1"#)?;
    let mut manager = CaptureManager::new(capture_config(temp_dir.path(), ffmpeg), "abc-defg-hij", Span::none())?;

    assert!(manager.start(None).await);
    assert_eq!(manager.state(), CaptureState::Recording);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while manager.state() == CaptureState::Recording && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(manager.state(), CaptureState::Failed);

    assert!(!manager.stop().await);
    assert!(job_audio_missing(&manager));

    Ok(())
}

#[tokio::test]
async fn test_stubborn_recorder_is_killed() -> Result<()> {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new()?;
    let ffmpeg = write_fake_ffmpeg(
        temp_dir.path(),
        r#"trap '' TERM
while :; do printf x >> "$last"; sleep 0.05; done"#,
    )?;
    let mut config = capture_config(temp_dir.path(), ffmpeg);
    config.graceful_stop_timeout_ms = 300;
    let mut manager = CaptureManager::new(config, "abc-defg-hij", Span::none())?;

    assert!(manager.start(None).await);
    assert!(manager.stop().await);
    assert_eq!(manager.state(), CaptureState::Stopped);

    // The partial video is still extracted
    assert!(manager.job().and_then(|job| job.audio_extracted.as_ref()).is_some());

    Ok(())
}

#[test]
fn test_missing_ffmpeg_is_reported_at_construction() {
    let temp_dir = TempDir::new().unwrap();
    let config = capture_config(temp_dir.path(), temp_dir.path().join("missing-ffmpeg"));

    assert!(CaptureManager::new(config, "abc-defg-hij", Span::none()).is_err());
}

fn job_audio_missing(manager: &CaptureManager) -> bool {
    manager
        .job()
        .map_or(true, |job| job.audio_extracted.is_none() && !job.audio_path.exists())
}
