//! Command-line and environment configuration.
//!
//! Options are read by clap (with environment fallbacks, after `.env` has been
//! loaded by the binary) and resolved into an explicit [`Config`] that is
//! threaded through a run. Nothing here is global.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use reqwest::Url;

use crate::fetch::auth::UrlParam;
use crate::fetch::{BasicClient, FeedSource, FileFeedSource, HttpFeedSource};
use crate::normalize::{FutureComparison, ReferenceNow, TimeNormalizer};
use crate::output::{CsvSink, PostgresSink, RecordSink};

/// Where the feed comes from.
#[derive(Debug, Clone, clap::Args)]
pub struct FeedArgs {
    /// Feed URL, or a path to a saved .pb snapshot
    #[arg(long, env = "FEED_URL")]
    pub feed_url: String,

    /// API key appended to the feed URL as a query parameter
    #[arg(long, env = "FEED_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Query parameter name carrying the API key
    #[arg(long, default_value = "key")]
    pub api_key_param: String,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

/// Options for a harvesting run.
#[derive(Debug, Clone, clap::Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub feed: FeedArgs,

    /// IANA timezone used for dates and seconds after midnight
    #[arg(long, env = "FEED_TIMEZONE", default_value = "America/Los_Angeles")]
    pub timezone: String,

    /// Reference instant (RFC 3339) instead of the wall clock at run start
    #[arg(long)]
    pub now: Option<String>,

    /// How arrivals are compared with the reference instant
    #[arg(long, value_enum, default_value_t = FutureComparison::SecondsOfDay)]
    pub compare: FutureComparison,

    /// CSV file to write retained records to
    #[arg(short, long, env = "OUTPUT_PATH", default_value = "realtime_trip_data.csv")]
    pub output: PathBuf,

    /// Append to the CSV file instead of replacing it
    #[arg(long, default_value_t = false)]
    pub append: bool,

    /// PostgreSQL connection string; when set, rows go to the database
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedLocation {
    Http {
        url: Url,
        api_key: Option<(String, String)>,
        timeout: Duration,
    },
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkTarget {
    Csv { path: PathBuf, append: bool },
    Postgres(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub feed: FeedLocation,
    pub timezone: Tz,
    pub reference_now: Option<DateTime<Utc>>,
    pub comparison: FutureComparison,
    pub sink: SinkTarget,
}

impl FeedLocation {
    pub fn from_args(args: &FeedArgs) -> Result<Self> {
        let url = Url::parse(&args.feed_url)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"));

        if let Some(url) = url {
            Ok(FeedLocation::Http {
                url,
                api_key: args
                    .api_key
                    .clone()
                    .map(|key| (args.api_key_param.clone(), key)),
                timeout: Duration::from_secs(args.timeout_secs),
            })
        } else {
            Ok(FeedLocation::File(PathBuf::from(&args.feed_url)))
        }
    }

    pub fn source(&self) -> Result<Box<dyn FeedSource>> {
        let source: Box<dyn FeedSource> = match self {
            FeedLocation::Http {
                url,
                api_key,
                timeout,
            } => {
                let client = BasicClient::new(*timeout).context("failed to build HTTP client")?;
                match api_key {
                    Some((param, key)) => Box::new(HttpFeedSource::new(
                        UrlParam::new(client, param.as_str(), key.as_str()),
                        url.clone(),
                    )),
                    None => Box::new(HttpFeedSource::new(client, url.clone())),
                }
            }
            FeedLocation::File(path) => Box::new(FileFeedSource::new(path)),
        };
        Ok(source)
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| anyhow!("unknown timezone '{name}': {e}"))
}

impl Config {
    pub fn from_args(args: &RunArgs) -> Result<Self> {
        let reference_now = args
            .now
            .as_deref()
            .map(|s| {
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .with_context(|| format!("invalid --now '{s}', expected RFC 3339"))
            })
            .transpose()?;

        let sink = match &args.database_url {
            Some(url) => SinkTarget::Postgres(url.clone()),
            None => SinkTarget::Csv {
                path: args.output.clone(),
                append: args.append,
            },
        };

        Ok(Self {
            feed: FeedLocation::from_args(&args.feed)?,
            timezone: parse_timezone(&args.timezone)?,
            reference_now,
            comparison: args.compare,
            sink,
        })
    }

    /// Captures the run's reference now: the configured instant, or the
    /// wall clock at the moment of the call.
    pub fn reference_now(&self) -> ReferenceNow {
        match self.reference_now {
            Some(instant) => ReferenceNow::at(instant, self.timezone),
            None => ReferenceNow::capture(self.timezone),
        }
    }

    pub fn normalizer(&self) -> TimeNormalizer {
        TimeNormalizer::new(self.timezone, self.reference_now(), self.comparison)
    }

    /// Builds the sink. Nothing is opened or connected until the first write.
    pub fn open_sink(&self) -> Box<dyn RecordSink> {
        sink_for(&self.sink)
    }

    /// Builds the sink for repeated runs. A CSV file is always appended to,
    /// otherwise each run would replace the rows of the previous one.
    pub fn open_polling_sink(&self) -> Box<dyn RecordSink> {
        sink_for(&self.sink.clone().for_polling())
    }
}

impl SinkTarget {
    pub fn for_polling(self) -> Self {
        match self {
            SinkTarget::Csv { path, .. } => SinkTarget::Csv { path, append: true },
            other => other,
        }
    }
}

fn sink_for(target: &SinkTarget) -> Box<dyn RecordSink> {
    match target {
        SinkTarget::Csv { path, append: true } => Box::new(CsvSink::appending(path)),
        SinkTarget::Csv { path, append: false } => Box::new(CsvSink::new(path)),
        SinkTarget::Postgres(url) => Box::new(PostgresSink::new(url.as_str())),
    }
}
