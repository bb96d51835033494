use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser};
use meet_guest::audio::{default_audio_path, find_latest_recording, DEFAULT_MP3_QUALITY};
use meet_guest::{AudioArtifact, AudioExtractor};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "extract-audio")]
#[command(version, about = "Extract audio from video recordings")]
#[command(group(ArgGroup::new("source").required(true).multiple(true).args(["input", "latest"])))]
struct Cli {
    /// Input video file path
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Extract from the latest recording in --dir (takes precedence over --input)
    #[arg(short, long)]
    latest: bool,

    /// Output MP3 file path (defaults to the video path with .mp3)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Directory to search for recordings
    #[arg(short, long, value_name = "DIR", default_value = "./recordings")]
    dir: PathBuf,

    /// MP3 quality (0-9, lower is better)
    #[arg(short, long, default_value_t = DEFAULT_MP3_QUALITY, value_parser = clap::value_parser!(u8).range(0..=9))]
    quality: u8,

    /// FFmpeg executable
    #[arg(long, value_name = "PATH", default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    meet_guest::logging::init(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let video = if cli.latest {
        match find_latest_recording(&cli.dir)? {
            Some(path) => {
                info!("Found latest recording: {}", path.display());
                path
            }
            None => bail!("No recordings found in {}", cli.dir.display()),
        }
    } else {
        cli.input.context("Please specify either --input or --latest")?
    };

    let output = cli.output.unwrap_or_else(|| default_audio_path(&video));
    let ffmpeg = which::which(&cli.ffmpeg)
        .with_context(|| format!("FFmpeg not found ({})", cli.ffmpeg.display()))?;

    AudioExtractor::new(ffmpeg, cli.quality)
        .extract(&video, &output)
        .await?;

    match AudioArtifact::probe(&output) {
        Ok(artifact) => info!(
            "Audio saved to {} ({:.1}s, {:.2} KB)",
            output.display(),
            artifact.duration_seconds.unwrap_or(0.0),
            artifact.size_bytes as f64 / 1024.0
        ),
        Err(_) => info!("Audio saved to {}", output.display()),
    }
    Ok(())
}
