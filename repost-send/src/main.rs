//! repost-send - Republish trending feed images on a fixed schedule
//!
//! Each cycle selects one unpublished image post from the configured
//! subreddit and publishes it to the Facebook Page, its story, and the linked
//! Instagram account.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use libreposter::logging::{LogFormat, LoggingConfig};
use libreposter::{Config, CycleOutcome, Driver, RepostError};
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(name = "repost-send")]
#[command(version)]
#[command(about = "Republish trending feed images to Facebook and Instagram")]
#[command(long_about = "\
repost-send - Republish trending feed images to Facebook and Instagram

DESCRIPTION:
    repost-send picks the best-ranked image post from a subreddit that has
    not been republished yet and posts it to a Facebook Page, the Page's
    story, and an Instagram business account. It then sleeps for a fixed
    interval and repeats.

USAGE:
    # Run forever with the configured interval (default 6h)
    repost-send

    # Run a single cycle and exit
    repost-send --once

    # Machine-readable cycle reports on stdout
    repost-send --once --format json

ENVIRONMENT:
    REDDIT_CLIENT_ID, REDDIT_CLIENT_SECRET   Feed client credentials
    FB_ACCESS_TOKEN, FB_PAGE_ID              Facebook Page token and id
    IG_ACCOUNT_ID                            Instagram account (if enabled)
    REPOSTER_CONFIG                          Settings file path
    REPOSTER_LOG_FORMAT, REPOSTER_LOG_LEVEL  Logging

    A .env file in the working directory is loaded first.

SIGNALS:
    SIGTERM, SIGINT - Stop after the current cycle

EXIT CODES:
    0 - Clean shutdown, or a --once cycle that published or found nothing
    1 - Runtime error, or a --once cycle whose primary post failed
    2 - Configuration error
")]
struct Cli {
    /// Run one cycle and exit
    #[arg(long)]
    once: bool,

    /// Time between cycles, e.g. "6h" or "90m" (overrides config)
    #[arg(long, value_name = "DURATION", value_parser = parse_interval)]
    interval: Option<Duration>,

    /// Output format for cycle reports
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Log output format: text, json or pretty
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Before logging, so REPOSTER_LOG_* in .env apply
    let env_file = libreposter::config::load_env_file();
    LoggingConfig::from_env(cli.log_format, cli.verbose).init();
    if let Some(path) = env_file {
        debug!("Loaded environment from {}", path.display());
    }

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> libreposter::Result<i32> {
    let config = Config::load()?;
    let interval = match cli.interval {
        Some(interval) => interval,
        None => config.settings.schedule.interval()?,
    };
    let driver = Driver::from_config(&config)?;

    info!("repost-send starting");

    if cli.once {
        let outcome = driver.run_once().await;
        print_report(&outcome, cli.format);
        let code = match outcome {
            CycleOutcome::NoCandidate => 0,
            ref published if published.is_success() => 0,
            _ => 1,
        };
        return Ok(code);
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    info!("Cycle interval: {}", humantime::format_duration(interval));
    driver
        .run_loop(interval, shutdown, |outcome| print_report(outcome, cli.format))
        .await;

    info!("repost-send stopped");
    Ok(0)
}

/// Parse `--interval`; a zero interval would spin cycles back to back
fn parse_interval(value: &str) -> Result<Duration, String> {
    let interval = humantime::parse_duration(value).map_err(|e| e.to_string())?;
    if interval.is_zero() {
        return Err("interval must be greater than zero".to_string());
    }
    Ok(interval)
}

fn print_report(outcome: &CycleOutcome, format: OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_string(outcome) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Could not serialize cycle report: {}", e),
        },
        OutputFormat::Text => match outcome {
            CycleOutcome::NoCandidate => println!("no candidate"),
            CycleOutcome::StoreUnavailable { reason } => println!("skipped: {}", reason),
            CycleOutcome::Published { item, result } => {
                println!("{} <{}>", item.title, item.url);
                for entry in &result.outcomes {
                    match &entry.id {
                        Some(id) => println!("  {}: {}", entry.platform, id),
                        None => println!("  {}: none", entry.platform),
                    }
                }
            }
        },
    }
}

/// Set the shutdown flag on SIGINT/SIGTERM
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> libreposter::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};

    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, shutdown.clone()).map_err(|e| {
            RepostError::Runtime(format!("Signal setup failed: {}", e))
        })?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) -> libreposter::Result<()> {
    Ok(())
}
