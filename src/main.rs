//! CLI entry point for the GTFS-RT trip-update harvester.
//!
//! Provides subcommands for a single harvesting run, repeated polling, and
//! dumping a decoded feed as JSON.

use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gtfs_rt_harvest::config::{Config, FeedArgs, FeedLocation, RunArgs};
use gtfs_rt_harvest::parser::{feed_to_json, parse_feed};
use gtfs_rt_harvest::pipeline::{self, PollSettings};
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_rt_harvest")]
#[command(about = "Harvest observed arrivals from a GTFS-RT TripUpdates feed", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the feed once and persist past arrivals
    Run(RunArgs),
    /// Run repeatedly on a fixed interval
    Poll {
        #[command(flatten)]
        run: RunArgs,

        /// Seconds between runs
        #[arg(short = 'r', long, default_value_t = 60)]
        interval_secs: u64,

        /// Number of runs (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 0)]
        samples: usize,
    },
    /// Decode the feed and print it as JSON
    Decode {
        #[command(flatten)]
        feed: FeedArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/gtfs_rt_harvest.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_rt_harvest.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            let config = Config::from_args(&args)?;
            // Captured once, before any network traffic.
            let normalizer = config.normalizer();
            let source = config.feed.source()?;
            let mut sink = config.open_sink();

            match pipeline::run(source.as_ref(), sink.as_mut(), &normalizer).await {
                Ok(summary) => {
                    info!("{}", serde_json::to_string_pretty(&summary)?);
                }
                Err(e) => {
                    error!(stage = %e.stage(), error = %e, "Run failed");
                    return Err(e.into());
                }
            }
        }
        Commands::Poll {
            run,
            interval_secs,
            samples,
        } => {
            let config = Config::from_args(&run)?;
            let source = config.feed.source()?;
            let mut sink = config.open_polling_sink();

            if samples == 0 {
                info!(interval_secs, "Polling infinitely. Press Ctrl+C to stop.");
            } else {
                info!(samples, interval_secs, "Starting polling");
            }

            let failures = pipeline::poll(
                source.as_ref(),
                sink.as_mut(),
                PollSettings {
                    timezone: config.timezone,
                    comparison: config.comparison,
                    interval: Duration::from_secs(interval_secs),
                    samples,
                },
            )
            .await;

            info!(failures, "Finished polling");
        }
        Commands::Decode { feed } => {
            let location = FeedLocation::from_args(&feed)?;
            let bytes = location.source()?.fetch().await?;
            let decoded = parse_feed(&bytes)?;
            println!("{}", serde_json::to_string_pretty(&feed_to_json(&decoded)?)?);
        }
    }

    Ok(())
}
