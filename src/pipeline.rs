//! Batch driver: fetch, decode, extract, normalize, filter, persist.

use std::time::Duration;

use chrono_tz::Tz;
use tracing::{debug, error, info};

use crate::error::PipelineError;
use crate::extract::extract;
use crate::fetch::FeedSource;
use crate::normalize::{FutureComparison, ReferenceNow, TimeNormalizer};
use crate::output::RecordSink;
use crate::parser::parse_feed;
use crate::record::TripStopRecord;
use crate::stats::RunSummary;

/// Runs one batch against `source` and writes the retained rows to `sink`.
///
/// `normalizer` carries the reference now for the whole run; every record is
/// stamped with it and classified against it. Future arrivals are dropped.
/// The sink is only called once everything before it has succeeded.
#[tracing::instrument(skip_all, fields(source = %source.describe()))]
pub async fn run<S, K>(
    source: &S,
    sink: &mut K,
    normalizer: &TimeNormalizer,
) -> Result<RunSummary, PipelineError>
where
    S: FeedSource + ?Sized,
    K: RecordSink + ?Sized,
{
    let fetched_at = normalizer.reference_now().as_fixed_offset();

    let bytes = source.fetch().await?;
    debug!(bytes = bytes.len(), "Feed fetched");

    let feed = parse_feed(&bytes)?;
    debug!(entity_count = feed.entity.len(), "Feed decoded");

    let mut summary = RunSummary::new(fetched_at, bytes.len(), &feed);

    let mut records = extract(&feed)?;
    summary.extracted = records.len();

    for record in &mut records {
        normalizer.apply(record);
        record.timestamp = Some(fetched_at);
    }

    let retained: Vec<TripStopRecord> = records.into_iter().filter(|r| !r.future).collect();
    summary.dropped_future = summary.extracted - retained.len();
    debug!(
        retained = retained.len(),
        dropped_future = summary.dropped_future,
        "Future arrivals filtered"
    );

    summary.persisted = sink.write(&retained).await?;

    info!(
        entities = summary.entities,
        trip_updates = summary.trip_updates,
        extracted = summary.extracted,
        persisted = summary.persisted,
        "Run complete"
    );
    Ok(summary)
}

/// Settings for repeated runs.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub timezone: Tz,
    pub comparison: FutureComparison,
    pub interval: Duration,
    /// Number of runs; 0 polls until the process is stopped.
    pub samples: usize,
}

/// Repeats [`run`] on a fixed interval, capturing a fresh reference now for
/// each run. A failed run is logged and polling continues.
pub async fn poll<S, K>(source: &S, sink: &mut K, settings: PollSettings) -> usize
where
    S: FeedSource + ?Sized,
    K: RecordSink + ?Sized,
{
    let mut sample_count = 0;
    let mut failures = 0;

    loop {
        if settings.samples > 0 && sample_count >= settings.samples {
            break;
        }
        sample_count += 1;

        let now = ReferenceNow::capture(settings.timezone);
        let normalizer = TimeNormalizer::new(settings.timezone, now, settings.comparison);

        if let Err(e) = run(source, &mut *sink, &normalizer).await {
            failures += 1;
            error!(sample = sample_count, stage = %e.stage(), error = %e, "Run failed");
        }

        if settings.samples == 0 || sample_count < settings.samples {
            info!(interval_secs = settings.interval.as_secs(), "Waiting before next run");
            tokio::time::sleep(settings.interval).await;
        }
    }

    failures
}
