// Audio source discovery for screen recordings
//
// Each platform exposes its capture devices through a different tool, all of
// which print free text. We parse that text into `AudioDevice`s and prefer
// anything that looks like a loopback / system-audio source, since the point
// of the recording is to hear the other meeting participants.

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::platform::Platform;

/// Device names that usually carry system audio rather than a microphone
const LOOPBACK_KEYWORDS: &[&str] = &[
    "stereo mix",
    "wave out",
    "what u hear",
    "audio output",
    "virtual audio",
    "cable output",
    "voicemeeter",
    "audio render",
    "monitor",
    "blackhole",
    "soundflower",
    "loopback",
];

/// Upper bound for a single enumeration tool run
const ENUMERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// An audio capture source as understood by ffmpeg on this platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    /// Identifier passed to ffmpeg (`audio=<name>`, pulse source, avfoundation index)
    pub id: String,
    /// Human-readable label
    pub label: String,
    /// Whether the name suggests loopback / system-audio capture
    pub is_recommended: bool,
}

impl AudioDevice {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        let id = id.into();
        let label = label.into();
        let is_recommended = looks_like_loopback(&id) || looks_like_loopback(&label);
        Self {
            id,
            label,
            is_recommended,
        }
    }
}

fn looks_like_loopback(name: &str) -> bool {
    let name = name.to_lowercase();
    LOOPBACK_KEYWORDS.iter().any(|keyword| name.contains(keyword))
}

/// Pick the best capture source: first recommended device, else the first one listed
pub fn select_best(devices: &[AudioDevice]) -> Option<AudioDevice> {
    devices
        .iter()
        .find(|d| d.is_recommended)
        .or_else(|| devices.first())
        .cloned()
}

/// Resolve an audio source for `platform` using ffmpeg from PATH
///
/// `None` means "record video only"; it is never an error.
pub async fn resolve_audio_source(platform: Platform) -> Option<AudioDevice> {
    DeviceResolver::default().resolve(platform).await
}

/// Runs the platform enumeration tools
#[derive(Debug, Clone)]
pub struct DeviceResolver {
    ffmpeg: PathBuf,
}

impl Default for DeviceResolver {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl DeviceResolver {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    /// Best audio source for `platform`, or `None` when nothing usable was found
    pub async fn resolve(&self, platform: Platform) -> Option<AudioDevice> {
        let devices = match self.enumerate(platform).await {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Audio device enumeration failed, recording without audio: {:#}", e);
                return None;
            }
        };

        if devices.is_empty() {
            warn!("No audio capture devices found on {}, recording without audio", platform);
            return None;
        }

        info!(
            "Found {} audio device(s): {:?}",
            devices.len(),
            devices.iter().map(|d| d.label.as_str()).collect::<Vec<_>>()
        );

        let selected = select_best(&devices);
        if let Some(device) = &selected {
            if device.is_recommended {
                info!("Selected audio device: {} ({})", device.label, device.id);
            } else {
                info!(
                    "No loopback device found, using first available: {} ({})",
                    device.label, device.id
                );
            }
        }
        selected
    }

    /// List every audio capture source the platform tool reports
    pub async fn enumerate(&self, platform: Platform) -> Result<Vec<AudioDevice>> {
        match platform {
            Platform::Windows => {
                let output = run_tool(
                    self.ffmpeg.clone(),
                    &["-hide_banner", "-list_devices", "true", "-f", "dshow", "-i", "dummy"],
                )
                .await?;
                // ffmpeg prints the device list on stderr and exits non-zero
                Ok(parse_dshow_devices(&String::from_utf8_lossy(&output.stderr)))
            }
            Platform::MacOs => {
                let output = run_tool(
                    self.ffmpeg.clone(),
                    &["-hide_banner", "-f", "avfoundation", "-list_devices", "true", "-i", ""],
                )
                .await?;
                Ok(parse_avfoundation_devices(&String::from_utf8_lossy(&output.stderr)))
            }
            Platform::Linux => {
                let output = run_tool(PathBuf::from("pactl"), &["list", "sources"]).await?;
                if !output.status.success() {
                    bail!(
                        "pactl exited with {}: {}",
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    );
                }
                Ok(parse_pactl_sources(&String::from_utf8_lossy(&output.stdout)))
            }
            Platform::Unsupported => bail!("Unsupported platform for audio capture"),
        }
    }

    /// ALSA PCM devices (Linux only, informational)
    pub async fn enumerate_alsa(&self) -> Result<Vec<AudioDevice>> {
        let output = run_tool(PathBuf::from("arecord"), &["-L"]).await?;
        if !output.status.success() {
            bail!("arecord exited with {}", output.status);
        }
        Ok(parse_arecord_devices(&String::from_utf8_lossy(&output.stdout)))
    }
}

async fn run_tool(program: PathBuf, args: &[&str]) -> Result<Output> {
    debug!("Running {} {:?}", program.display(), args);

    let child = Command::new(&program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to run {}", program.display()))?;

    tokio::time::timeout(ENUMERATION_TIMEOUT, child.wait_with_output())
        .await
        .with_context(|| format!("{} timed out", program.display()))?
        .with_context(|| format!("Failed to read output of {}", program.display()))
}

fn first_quoted(line: &str) -> Option<&str> {
    let start = line.find('"')? + 1;
    let len = line[start..].find('"')?;
    Some(&line[start..start + len])
}

/// Parse `ffmpeg -list_devices true -f dshow -i dummy` output
///
/// Handles both the sectioned layout of older builds and the
/// `"Name" (audio)` suffix layout of newer ones.
pub fn parse_dshow_devices(output: &str) -> Vec<AudioDevice> {
    let mut devices = Vec::new();
    let mut in_audio_section = false;

    for line in output.lines() {
        if line.contains("DirectShow audio devices") {
            in_audio_section = true;
            continue;
        }
        if line.contains("DirectShow video devices") {
            in_audio_section = false;
            continue;
        }
        if line.contains("Alternative name") {
            continue;
        }

        let Some(name) = first_quoted(line) else {
            continue;
        };

        let tail = line.trim_end();
        let is_audio = tail.ends_with("(audio)") || (in_audio_section && !tail.ends_with("(video)"));
        if is_audio && !name.is_empty() {
            devices.push(AudioDevice::new(format!("audio={}", name), name));
        }
    }

    devices
}

/// Parse `ffmpeg -f avfoundation -list_devices true -i ""` output
pub fn parse_avfoundation_devices(output: &str) -> Vec<AudioDevice> {
    static ENTRY: OnceLock<Regex> = OnceLock::new();
    let entry = ENTRY.get_or_init(|| {
        Regex::new(r"\]\s*\[(\d+)\]\s+(.+?)\s*$").expect("static avfoundation pattern")
    });

    let mut devices = Vec::new();
    let mut in_audio_section = false;

    for line in output.lines() {
        if line.contains("AVFoundation audio devices") {
            in_audio_section = true;
            continue;
        }
        if line.contains("AVFoundation video devices") {
            in_audio_section = false;
            continue;
        }
        if !in_audio_section {
            continue;
        }
        if let Some(caps) = entry.captures(line) {
            devices.push(AudioDevice::new(&caps[1], &caps[2]));
        }
    }

    devices
}

/// Parse `pactl list sources` (long format)
pub fn parse_pactl_sources(output: &str) -> Vec<AudioDevice> {
    let mut devices: Vec<AudioDevice> = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if let Some(name) = line.strip_prefix("Name:") {
            let name = name.trim();
            devices.push(AudioDevice::new(name, name));
        } else if let Some(description) = line.strip_prefix("Description:") {
            if let Some(last) = devices.last_mut() {
                *last = AudioDevice::new(last.id.clone(), description.trim());
            }
        }
    }

    devices
}

/// Parse `arecord -L`: unindented lines are PCM names, the next indented line describes them
pub fn parse_arecord_devices(output: &str) -> Vec<AudioDevice> {
    let mut devices: Vec<AudioDevice> = Vec::new();
    let mut described = true;

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if !line.starts_with(char::is_whitespace) {
            let name = line.trim();
            if name == "null" {
                described = true;
                continue;
            }
            devices.push(AudioDevice::new(name, name));
            described = false;
        } else if !described {
            if let Some(last) = devices.last_mut() {
                *last = AudioDevice::new(last.id.clone(), line.trim());
            }
            described = true;
        }
    }

    devices
}

#[cfg(test)]
mod tests {
    use super::*;

    const DSHOW_LEGACY: &str = r#"[dshow @ 000001] DirectShow video devices (some may be both video and audio devices)
[dshow @ 000001]  "Integrated Camera"
[dshow @ 000001]     Alternative name "@device_pnp_\\?\usb#vid_04f2"
[dshow @ 000001] DirectShow audio devices
[dshow @ 000001]  "Microphone Array (Realtek(R) Audio)"
[dshow @ 000001]     Alternative name "@device_cm_{33D9A762}\wave_{A1B2}"
[dshow @ 000001]  "Stereo Mix (Realtek(R) Audio)"
[dshow @ 000001]     Alternative name "@device_cm_{33D9A762}\wave_{C3D4}"
dummy: Immediate exit requested"#;

    const DSHOW_MODERN: &str = r#"[dshow @ 0000] "Integrated Camera" (video)
[dshow @ 0000]   Alternative name "@device_pnp_\\?\usb"
[dshow @ 0000] "CABLE Output (VB-Audio Virtual Cable)" (audio)
[dshow @ 0000]   Alternative name "@device_cm_{33D9A762}\wave_{E5F6}""#;

    const AVFOUNDATION: &str = r#"[AVFoundation indev @ 0x7f8] AVFoundation video devices:
[AVFoundation indev @ 0x7f8] [0] FaceTime HD Camera
[AVFoundation indev @ 0x7f8] [1] Capture screen 0
[AVFoundation indev @ 0x7f8] AVFoundation audio devices:
[AVFoundation indev @ 0x7f8] [0] MacBook Pro Microphone
[AVFoundation indev @ 0x7f8] [1] BlackHole 2ch
: Input/output error"#;

    const PACTL: &str = "Source #0
\tState: SUSPENDED
\tName: alsa_output.pci-0000_00_1f.3.analog-stereo.monitor
\tDescription: Monitor of Built-in Audio Analog Stereo
\tDriver: module-alsa-card.c

Source #1
\tState: RUNNING
\tName: alsa_input.pci-0000_00_1f.3.analog-stereo
\tDescription: Built-in Audio Analog Stereo
";

    const ARECORD: &str = "null
    Discard all samples (playback) or generate zero samples (capture)
default
    Default Audio Device
sysdefault:CARD=PCH
    HDA Intel PCH, ALC257 Analog
    Default Audio Device
";

    #[test]
    fn test_parse_dshow_legacy_layout() {
        let devices = parse_dshow_devices(DSHOW_LEGACY);

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].id, "audio=Microphone Array (Realtek(R) Audio)");
        assert!(!devices[0].is_recommended);
        assert_eq!(devices[1].label, "Stereo Mix (Realtek(R) Audio)");
        assert!(devices[1].is_recommended);
    }

    #[test]
    fn test_parse_dshow_modern_layout() {
        let devices = parse_dshow_devices(DSHOW_MODERN);

        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, "audio=CABLE Output (VB-Audio Virtual Cable)");
        assert!(devices[0].is_recommended);
    }

    #[test]
    fn test_parse_avfoundation_audio_section_only() {
        let devices = parse_avfoundation_devices(AVFOUNDATION);

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].id, "0");
        assert_eq!(devices[0].label, "MacBook Pro Microphone");
        assert_eq!(devices[1].id, "1");
        assert!(devices[1].is_recommended);
    }

    #[test]
    fn test_parse_pactl_pairs_name_and_description() {
        let devices = parse_pactl_sources(PACTL);

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].id, "alsa_output.pci-0000_00_1f.3.analog-stereo.monitor");
        assert_eq!(devices[0].label, "Monitor of Built-in Audio Analog Stereo");
        assert!(devices[0].is_recommended);
        assert!(!devices[1].is_recommended);
    }

    #[test]
    fn test_parse_arecord_skips_null() {
        let devices = parse_arecord_devices(ARECORD);

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].id, "default");
        assert_eq!(devices[1].id, "sysdefault:CARD=PCH");
        assert_eq!(devices[1].label, "HDA Intel PCH, ALC257 Analog");
    }

    #[test]
    fn test_select_best_prefers_loopback() {
        let devices = vec![
            AudioDevice::new("mic", "USB Microphone"),
            AudioDevice::new("audio=Stereo Mix", "Stereo Mix"),
        ];
        assert_eq!(select_best(&devices).map(|d| d.id), Some("audio=Stereo Mix".to_string()));

        let generic = vec![AudioDevice::new("mic", "USB Microphone")];
        assert_eq!(select_best(&generic).map(|d| d.id), Some("mic".to_string()));

        assert_eq!(select_best(&[]), None);
    }

    #[tokio::test]
    async fn test_resolve_missing_tool_is_none() {
        let resolver = DeviceResolver::new("/nonexistent/bin/ffmpeg");

        assert_eq!(resolver.resolve(Platform::Windows).await, None);
        assert_eq!(resolver.resolve(Platform::MacOs).await, None);
        assert_eq!(resolver.resolve(Platform::Unsupported).await, None);
    }

    #[tokio::test]
    async fn test_resolve_never_panics_on_host() {
        // Whatever the host has installed, the answer is a device or None
        let _ = resolve_audio_source(Platform::current()).await;
    }
}
