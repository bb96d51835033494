use clap::Parser;
use meet_guest::{DeviceResolver, Platform};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "list-audio-devices")]
#[command(version, about = "Detect available audio devices for recording")]
struct Cli {
    /// Force detection for a platform (windows, macos, linux)
    #[arg(long)]
    platform: Option<String>,

    /// FFmpeg executable
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    meet_guest::logging::init(0);

    let ffmpeg = match which::which(&cli.ffmpeg) {
        Ok(path) => path,
        Err(_) => {
            eprintln!("FFmpeg is not installed or not in PATH");
            eprintln!("Please install FFmpeg: https://ffmpeg.org/download.html");
            return ExitCode::from(1);
        }
    };

    let platform = match cli.platform.as_deref() {
        Some(name) => match Platform::from_name(name) {
            Some(platform) => platform,
            None => {
                eprintln!("Unsupported platform: {}", name);
                return ExitCode::from(1);
            }
        },
        None => Platform::current(),
    };
    if platform == Platform::Unsupported {
        eprintln!("Unsupported platform: {}", std::env::consts::OS);
        return ExitCode::from(1);
    }

    println!("Detecting audio devices for FFmpeg recording on {}...", platform);
    let resolver = DeviceResolver::new(ffmpeg);

    match resolver.enumerate(platform).await {
        Ok(devices) if devices.is_empty() => println!("\nNo audio capture devices found"),
        Ok(devices) => {
            println!("\nAudio capture devices:");
            for device in &devices {
                println!("  {} ({})", device.label, device.id);
            }

            let recommended: Vec<_> = devices.iter().filter(|d| d.is_recommended).collect();
            if !recommended.is_empty() {
                println!("\nPotential system audio capture devices:");
                for device in recommended {
                    println!("  * {} - Use with FFmpeg: {}", device.label, usage(platform, &device.id));
                }
            }
        }
        Err(e) => println!("\nCould not list audio devices: {:#}", e),
    }

    if platform == Platform::Linux {
        match resolver.enumerate_alsa().await {
            Ok(devices) => {
                println!("\nALSA devices:");
                for device in devices {
                    println!("  {} - {}", device.id, device.label);
                }
                println!("  * Use -f alsa -i <device> when using ALSA devices");
            }
            Err(_) => println!("\nALSA tools not available or error listing devices"),
        }
    }

    println!("\nTIP: If you need to capture system audio:");
    println!("- Windows: Enable 'Stereo Mix' in sound settings or use software like VB-Cable");
    println!("- macOS: Install BlackHole or similar audio routing software");
    println!("- Linux: Use PulseAudio monitor sources or pavucontrol to set up audio routing");

    ExitCode::SUCCESS
}

fn usage(platform: Platform, id: &str) -> String {
    match platform {
        Platform::Windows => format!("-f dshow -i \"{}\"", id),
        Platform::MacOs => format!("-f avfoundation -i \"<screen>:{}\"", id),
        _ => format!("-f pulse -i {}", id),
    }
}
