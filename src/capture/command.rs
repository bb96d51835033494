use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use super::config::CaptureConfig;
use super::display::ScreenSize;
use crate::audio::AudioDevice;
use crate::platform::Platform;

/// A platform-specific ffmpeg screen capture invocation
///
/// The audio input is kept separate from the rendered argument list so the
/// command can be degraded to video-only without string surgery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureCommand {
    program: PathBuf,
    platform: Platform,
    screen: ScreenSize,
    framerate: u32,
    video_input: String,
    audio_input: Option<String>,
    preset: String,
    crf: u8,
    pixel_format: String,
    audio_bitrate: String,
    output: PathBuf,
}

impl CaptureCommand {
    pub fn build(
        program: &Path,
        platform: Platform,
        config: &CaptureConfig,
        screen: ScreenSize,
        audio: Option<&AudioDevice>,
        output: &Path,
    ) -> Result<Self> {
        let video_input = match platform {
            Platform::Windows => "desktop".to_string(),
            Platform::MacOs => config.screen_device.clone(),
            Platform::Linux => config
                .x11_display
                .clone()
                .or_else(|| std::env::var("DISPLAY").ok())
                .unwrap_or_else(|| ":0.0".to_string()),
            Platform::Unsupported => bail!("Unsupported platform for recording"),
        };

        Ok(Self {
            program: program.to_path_buf(),
            platform,
            screen,
            framerate: config.framerate,
            video_input,
            audio_input: audio.map(|d| d.id.clone()),
            preset: config.preset.clone(),
            crf: config.crf,
            pixel_format: config.pixel_format.clone(),
            audio_bitrate: config.audio_bitrate.clone(),
            output: output.to_path_buf(),
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn has_audio(&self) -> bool {
        self.audio_input.is_some()
    }

    /// Same command with the audio input removed
    pub fn without_audio(&self) -> Self {
        Self {
            audio_input: None,
            ..self.clone()
        }
    }

    /// Full argument list (excluding the program)
    pub fn args(&self) -> Vec<String> {
        let grabber = match self.platform {
            Platform::Windows => "gdigrab",
            Platform::MacOs => "avfoundation",
            _ => "x11grab",
        };

        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-f".into(),
            grabber.into(),
            "-framerate".into(),
            self.framerate.to_string(),
            "-video_size".into(),
            self.screen.to_string(),
            "-i".into(),
        ];

        match (self.platform, &self.audio_input) {
            // avfoundation takes "<screen>:<audio>" as a single input
            (Platform::MacOs, Some(audio)) => args.push(format!("{}:{}", self.video_input, audio)),
            (Platform::Windows, Some(audio)) => {
                args.push(self.video_input.clone());
                args.extend(["-f".into(), "dshow".into(), "-i".into(), audio.clone()]);
            }
            (Platform::Linux, Some(audio)) => {
                args.push(self.video_input.clone());
                args.extend(["-f".into(), "pulse".into(), "-i".into(), audio.clone()]);
            }
            _ => args.push(self.video_input.clone()),
        }

        args.extend([
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            self.preset.clone(),
            "-crf".into(),
            self.crf.to_string(),
            "-pix_fmt".into(),
            self.pixel_format.clone(),
        ]);

        if self.has_audio() {
            args.extend([
                "-c:a".into(),
                "aac".into(),
                "-b:a".into(),
                self.audio_bitrate.clone(),
            ]);
        }

        args.push("-y".into());
        args.push(self.output.display().to_string());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(platform: Platform, audio: Option<&AudioDevice>) -> CaptureCommand {
        let config = CaptureConfig {
            x11_display: Some(":1.0".to_string()),
            ..CaptureConfig::default()
        };
        CaptureCommand::build(
            Path::new("ffmpeg"),
            platform,
            &config,
            ScreenSize {
                width: 1280,
                height: 720,
            },
            audio,
            Path::new("/rec/out.mp4"),
        )
        .unwrap()
    }

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn test_linux_command_with_pulse_audio() {
        let device = AudioDevice::new("alsa_output.monitor", "Monitor of Built-in Audio");
        let args = build(Platform::Linux, Some(&device)).args();

        assert!(has_pair(&args, "-f", "x11grab"));
        assert!(has_pair(&args, "-framerate", "15"));
        assert!(has_pair(&args, "-video_size", "1280x720"));
        assert!(has_pair(&args, "-i", ":1.0"));
        assert!(has_pair(&args, "-f", "pulse"));
        assert!(has_pair(&args, "-i", "alsa_output.monitor"));
        assert!(has_pair(&args, "-preset", "ultrafast"));
        assert!(has_pair(&args, "-crf", "28"));
        assert!(has_pair(&args, "-pix_fmt", "yuv420p"));
        assert!(has_pair(&args, "-c:a", "aac"));
        assert_eq!(args.last().map(String::as_str), Some("/rec/out.mp4"));
    }

    #[test]
    fn test_without_audio_strips_audio_input() {
        let device = AudioDevice::new("audio=Stereo Mix", "Stereo Mix");
        let command = build(Platform::Windows, Some(&device));
        assert!(command.has_audio());

        let video_only = command.without_audio();
        let args = video_only.args();

        assert!(!video_only.has_audio());
        assert!(has_pair(&args, "-f", "gdigrab"));
        assert!(has_pair(&args, "-i", "desktop"));
        assert!(!args.iter().any(|a| a == "dshow" || a == "audio=Stereo Mix" || a == "aac"));
        assert_eq!(video_only.output(), command.output());
    }

    #[test]
    fn test_macos_folds_audio_into_input() {
        let device = AudioDevice::new("0", "BlackHole 2ch");
        let command = build(Platform::MacOs, Some(&device));

        assert!(has_pair(&command.args(), "-i", "1:0"));
        assert!(has_pair(&command.without_audio().args(), "-i", "1"));
    }

    #[test]
    fn test_unsupported_platform_is_rejected() {
        let result = CaptureCommand::build(
            Path::new("ffmpeg"),
            Platform::Unsupported,
            &CaptureConfig::default(),
            ScreenSize::FALLBACK,
            None,
            Path::new("out.mp4"),
        );
        assert!(result.is_err());
    }
}
