use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::gtfs_rt::FeedMessage;

/// Counters describing one completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub fetched_at: DateTime<FixedOffset>,
    pub bytes: usize,
    pub feed_timestamp: Option<u64>,

    // feed shape
    pub entities: usize,
    pub trip_updates: usize,
    pub stop_time_updates: usize,

    // pipeline
    pub extracted: usize,
    pub dropped_future: usize,
    pub persisted: usize,
}

impl RunSummary {
    pub fn new(fetched_at: DateTime<FixedOffset>, bytes: usize, feed: &FeedMessage) -> Self {
        let mut s = RunSummary {
            fetched_at,
            bytes,
            feed_timestamp: feed.header.timestamp,
            entities: feed.entity.len(),
            trip_updates: 0,
            stop_time_updates: 0,
            extracted: 0,
            dropped_future: 0,
            persisted: 0,
        };

        for tu in feed.entity.iter().filter_map(|e| e.trip_update.as_ref()) {
            s.trip_updates += 1;
            s.stop_time_updates += tu.stop_time_update.len();
        }

        s
    }

    pub fn retained(&self) -> usize {
        self.extracted - self.dropped_future
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs_rt::trip_update::StopTimeUpdate;
    use crate::gtfs_rt::{FeedEntity, FeedHeader, TripUpdate};

    fn fetched_at() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-06-01T12:00:00-07:00").unwrap()
    }

    #[test]
    fn test_new_counts_feed_shape() {
        let feed = FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                timestamp: Some(1717268400),
                ..Default::default()
            },
            entity: vec![
                FeedEntity {
                    id: "a".to_string(),
                    ..Default::default()
                },
                FeedEntity {
                    id: "b".to_string(),
                    trip_update: Some(TripUpdate {
                        stop_time_update: vec![StopTimeUpdate::default(); 3],
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ],
        };

        let s = RunSummary::new(fetched_at(), 42, &feed);
        assert_eq!(s.entities, 2);
        assert_eq!(s.trip_updates, 1);
        assert_eq!(s.stop_time_updates, 3);
        assert_eq!(s.feed_timestamp, Some(1717268400));
        assert_eq!(s.persisted, 0);
    }

    #[test]
    fn test_retained() {
        let mut s = RunSummary::new(fetched_at(), 0, &FeedMessage::default());
        s.extracted = 10;
        s.dropped_future = 4;
        assert_eq!(s.retained(), 6);
    }
}
