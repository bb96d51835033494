use anyhow::Result;
use clap::Parser;
use meet_guest::{ChromeLauncher, Config, MeetingAddress, Orchestrator, RunOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Exit status when a second interrupt abandons teardown
const FORCED_EXIT_CODE: i32 = 130;

#[derive(Parser)]
#[command(name = "meet-guest")]
#[command(version, about = "Join a Google Meet session as a guest and optionally record it")]
struct Cli {
    /// Google Meet URL or code (e.g. abc-defg-hij)
    address: String,

    /// Your display name in the meeting
    name: String,

    /// Minutes to stay in the meeting
    #[arg(long, default_value_t = 60)]
    duration: u64,

    /// Run with a visible browser
    #[arg(long)]
    debug: bool,

    /// Record the meeting (requires FFmpeg)
    #[arg(long)]
    record: bool,

    /// Directory to save recordings
    #[arg(long, value_name = "DIR")]
    recording_dir: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use an already running WebDriver endpoint
    #[arg(long, value_name = "URL")]
    webdriver_url: Option<String>,

    /// Don't save step screenshots
    #[arg(long)]
    no_screenshots: bool,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    meet_guest::logging::init(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("An error occurred: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let mut config = Config::load(cli.config.as_deref())?;

    // CLI overrides
    if cli.debug {
        config.browser.headless = false;
    }
    if let Some(dir) = cli.recording_dir {
        config.capture.output_dir = dir;
    }
    if let Some(url) = cli.webdriver_url {
        config.browser.webdriver_url = Some(url);
    }
    if cli.no_screenshots {
        config.session.screenshots = false;
    }

    info!("meet-guest v{}", env!("CARGO_PKG_VERSION"));

    let options = RunOptions {
        address: MeetingAddress::parse(&cli.address),
        display_name: cli.name,
        duration: Duration::from_secs(cli.duration.saturating_mul(60)),
        record: cli.record,
    };

    // Registered before joining; an interrupt abandons the join and still tears down
    let shutdown = shutdown_signal()?;

    let launcher = Arc::new(ChromeLauncher::new(config.browser.clone()));
    let orchestrator = Orchestrator::new(config, launcher);
    let outcome = orchestrator.run(options, shutdown).await;

    Ok(outcome.exit_code())
}

#[cfg(unix)]
fn shutdown_signal() -> Result<impl std::future::Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => info!("Process interrupted by user"),
            _ = terminate.recv() => info!("Received SIGTERM"),
        }

        // A second signal during teardown skips the orderly leave
        tokio::spawn(async move {
            tokio::select! {
                _ = interrupt.recv() => {}
                _ = terminate.recv() => {}
            }
            warn!("Second interrupt received, exiting immediately");
            std::process::exit(FORCED_EXIT_CODE);
        });
    })
}

#[cfg(windows)]
fn shutdown_signal() -> Result<impl std::future::Future<Output = ()>> {
    let mut ctrl_c = tokio::signal::windows::ctrl_c()?;

    Ok(async move {
        ctrl_c.recv().await;
        info!("Process interrupted by user");

        tokio::spawn(async move {
            ctrl_c.recv().await;
            warn!("Second interrupt received, exiting immediately");
            std::process::exit(FORCED_EXIT_CODE);
        });
    })
}
