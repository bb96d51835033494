// Screen size detection for the capture command

use std::fmt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::platform::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub const FALLBACK: ScreenSize = ScreenSize {
        width: 1920,
        height: 1080,
    };

    /// Parse `1920x1080` (also tolerates ` x ` with spaces)
    pub fn parse(text: &str) -> Option<Self> {
        let (w, h) = text.split_once('x')?;
        let width = w.trim().parse().ok()?;
        let height = h.trim().split_whitespace().next()?.parse().ok()?;
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self { width, height })
    }
}

impl fmt::Display for ScreenSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Detect the primary screen size, falling back to 1920x1080
pub async fn detect_screen_size(platform: Platform) -> ScreenSize {
    let (program, args): (&str, &[&str]) = match platform {
        Platform::Linux => ("xrandr", &[]),
        Platform::MacOs => ("system_profiler", &["SPDisplaysDataType"]),
        Platform::Windows => (
            "wmic",
            &[
                "path",
                "Win32_VideoController",
                "get",
                "CurrentHorizontalResolution,CurrentVerticalResolution",
            ],
        ),
        Platform::Unsupported => return ScreenSize::FALLBACK,
    };

    let output = match Command::new(program).args(args).kill_on_drop(true).output().await {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            warn!("{} exited with {}, using {}", program, output.status, ScreenSize::FALLBACK);
            return ScreenSize::FALLBACK;
        }
        Err(e) => {
            warn!("Failed to detect screen resolution ({}): {}", program, e);
            return ScreenSize::FALLBACK;
        }
    };

    let text = String::from_utf8_lossy(&output.stdout);
    let parsed = match platform {
        Platform::Linux => parse_xrandr(&text),
        Platform::MacOs => parse_system_profiler(&text),
        Platform::Windows => parse_wmic(&text),
        Platform::Unsupported => None,
    };

    match parsed {
        Some(size) => {
            debug!("Detected screen size {}", size);
            size
        }
        None => {
            warn!("Could not parse screen resolution, using {}", ScreenSize::FALLBACK);
            ScreenSize::FALLBACK
        }
    }
}

/// Current mode is the line marked with `*`
pub fn parse_xrandr(output: &str) -> Option<ScreenSize> {
    output
        .lines()
        .find(|line| line.contains('*'))
        .and_then(|line| line.split_whitespace().next())
        .and_then(ScreenSize::parse)
}

/// `Resolution: 2560 x 1600 Retina`
pub fn parse_system_profiler(output: &str) -> Option<ScreenSize> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("Resolution:"))
        .and_then(ScreenSize::parse)
}

/// Header line followed by `1920  1080`
pub fn parse_wmic(output: &str) -> Option<ScreenSize> {
    output.lines().skip(1).find_map(|line| {
        let mut parts = line.split_whitespace();
        let width = parts.next()?.parse().ok()?;
        let height = parts.next()?.parse().ok()?;
        Some(ScreenSize { width, height })
    })
}
