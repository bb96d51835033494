use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

/// Default LAME VBR quality (0-9, lower is better)
pub const DEFAULT_MP3_QUALITY: u8 = 4;

/// Which ffmpeg invocation produced the audio file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// libmp3lame VBR at the requested quality
    Primary,
    /// Encoder default codec at 44.1kHz stereo 192k
    Fallback,
}

/// Extracts the audio track of a recording into an MP3 sibling
#[derive(Debug, Clone)]
pub struct AudioExtractor {
    ffmpeg: PathBuf,
    quality: u8,
}

impl AudioExtractor {
    pub fn new(ffmpeg: impl Into<PathBuf>, quality: u8) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            quality: quality.min(9),
        }
    }

    /// Extract audio from `video` into `output`
    ///
    /// Tries the primary codec settings first and the more compatible
    /// fallback second. The video file is never modified.
    pub async fn extract(&self, video: &Path, output: &Path) -> Result<ExtractionMethod> {
        if !video.exists() {
            bail!("Video file not found: {}", video.display());
        }

        info!("Extracting audio from {} to {}", video.display(), output.display());

        match self.run(primary_args(video, output, self.quality)).await {
            Ok(()) => {
                log_output_size(output, "primary");
                return Ok(ExtractionMethod::Primary);
            }
            Err(e) => {
                warn!("Audio extraction failed: {:#}", e);
                info!("Trying alternative audio extraction settings...");
            }
        }

        self.run(fallback_args(video, output))
            .await
            .context("All audio extraction attempts failed")?;
        log_output_size(output, "alternative");
        Ok(ExtractionMethod::Fallback)
    }

    async fn run(&self, args: Vec<OsString>) -> Result<()> {
        info!("Running {} {:?}", self.ffmpeg.display(), args);

        let output = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.ffmpeg.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("ffmpeg exited with {}: {}", output.status, last_lines(&stderr, 5));
        }

        // The target is the last argument
        let target = args.last().map(PathBuf::from).unwrap_or_default();
        let size = fs::metadata(&target).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            bail!("ffmpeg reported success but {} is missing or empty", target.display());
        }

        Ok(())
    }
}

fn log_output_size(output: &Path, method: &str) {
    if let Ok(meta) = fs::metadata(output) {
        info!(
            "Audio extracted ({} settings): {} ({:.2} KB)",
            method,
            output.display(),
            meta.len() as f64 / 1024.0
        );
    }
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join(" | ")
}

/// `-vn -acodec libmp3lame -q:a <quality>`
pub fn primary_args(video: &Path, output: &Path, quality: u8) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-i".into(), video.into()];
    for arg in ["-vn", "-acodec", "libmp3lame", "-q:a"] {
        args.push(arg.into());
    }
    args.push(quality.to_string().into());
    args.push("-y".into());
    args.push(output.into());
    args
}

/// `-vn -ar 44100 -ac 2 -b:a 192k`
pub fn fallback_args(video: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-i".into(), video.into()];
    for arg in ["-vn", "-ar", "44100", "-ac", "2", "-b:a", "192k", "-y"] {
        args.push(arg.into());
    }
    args.push(output.into());
    args
}

/// Audio sibling of a recording: same stem, `.mp3`
pub fn default_audio_path(video: &Path) -> PathBuf {
    video.with_extension("mp3")
}

/// Most recently modified `.mp4` in `dir`
pub fn find_latest_recording(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        bail!("Directory not found: {}", dir.display());
    }

    let mut latest: Option<(std::time::SystemTime, PathBuf)> = None;

    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        let is_mp4 = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("mp4"))
            .unwrap_or(false);
        if !is_mp4 || !path.is_file() {
            continue;
        }

        let modified = fs::metadata(&path)?.modified()?;
        if latest.as_ref().map_or(true, |(newest, _)| modified > *newest) {
            latest = Some((modified, path));
        }
    }

    Ok(latest.map(|(_, path)| path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_primary_args_use_lame_quality() {
        let args = strings(&primary_args(Path::new("in.mp4"), Path::new("out.mp3"), 2));

        assert_eq!(
            args,
            ["-i", "in.mp4", "-vn", "-acodec", "libmp3lame", "-q:a", "2", "-y", "out.mp3"]
        );
    }

    #[test]
    fn test_fallback_args_are_compatible_settings() {
        let args = strings(&fallback_args(Path::new("in.mp4"), Path::new("out.mp3")));

        assert!(args.windows(2).any(|w| w == ["-ar", "44100"]));
        assert!(args.windows(2).any(|w| w == ["-ac", "2"]));
        assert!(args.windows(2).any(|w| w == ["-b:a", "192k"]));
        assert!(!args.contains(&"libmp3lame".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("out.mp3"));
    }

    #[test]
    fn test_default_audio_path_keeps_stem() {
        let path = default_audio_path(Path::new("/rec/meet_abc-defg-hij_20250101_120000.mp4"));
        assert_eq!(path, PathBuf::from("/rec/meet_abc-defg-hij_20250101_120000.mp3"));
    }

    #[test]
    fn test_find_latest_recording_uses_mtime() -> Result<()> {
        let dir = TempDir::new()?;
        let base = SystemTime::now() - Duration::from_secs(3600);

        for (name, age) in [("old.mp4", 300), ("new.mp4", 10), ("newest.mp3", 0)] {
            let file = File::create(dir.path().join(name))?;
            file.set_modified(base + Duration::from_secs(age))?;
        }

        let latest = find_latest_recording(dir.path())?;
        assert_eq!(latest, Some(dir.path().join("new.mp4")));
        Ok(())
    }

    #[test]
    fn test_find_latest_recording_empty_and_missing() -> Result<()> {
        let dir = TempDir::new()?;
        assert_eq!(find_latest_recording(dir.path())?, None);
        assert!(find_latest_recording(&dir.path().join("missing")).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_extract_missing_video_fails() {
        let extractor = AudioExtractor::new("ffmpeg", DEFAULT_MP3_QUALITY);
        let result = extractor
            .extract(Path::new("/nonexistent/video.mp4"), Path::new("/tmp/out.mp3"))
            .await;
        assert!(result.is_err());
    }
}
