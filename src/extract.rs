//! Flattens a decoded feed into one [`TripStopRecord`] per stop-time update.

use tracing::debug;

use crate::error::ExtractionError;
use crate::gtfs_rt::FeedMessage;
use crate::gtfs_rt::trip_update::StopTimeEvent;
use crate::record::TripStopRecord;

/// Walks entities in feed order and emits one record per
/// (trip update, stop-time update) pair, keeping stop order within a trip.
///
/// Time fields are passed through untouched. A trip update with no trip
/// descriptor fails the whole extraction rather than being skipped.
pub fn extract(feed: &FeedMessage) -> Result<Vec<TripStopRecord>, ExtractionError> {
    let mut records = Vec::new();

    for (index, entity) in feed.entity.iter().enumerate() {
        let Some(trip_update) = &entity.trip_update else {
            continue;
        };

        let trip = trip_update
            .trip
            .as_ref()
            .ok_or_else(|| ExtractionError::MissingTripDescriptor {
                entity_id: entity.id.clone(),
                entity_index: index,
            })?;

        let trip_id = trip.trip_id.as_deref().unwrap_or_default();
        let route_id = trip.route_id.as_deref().unwrap_or_default();
        let agency_id = trip.agency_id.as_deref().unwrap_or_default();

        for stu in &trip_update.stop_time_update {
            records.push(TripStopRecord::new(
                trip_id,
                route_id,
                agency_id,
                stu.stop_id.as_deref().unwrap_or_default(),
                event_time(stu.arrival.as_ref()),
                event_time(stu.departure.as_ref()),
            ));
        }
    }

    debug!(
        entities = feed.entity.len(),
        records = records.len(),
        "Feed flattened"
    );
    Ok(records)
}

fn event_time(event: Option<&StopTimeEvent>) -> Option<i64> {
    event.and_then(|e| e.time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs_rt::trip_update::StopTimeUpdate;
    use crate::gtfs_rt::{FeedEntity, FeedHeader, TripDescriptor, TripUpdate};

    fn feed(entity: Vec<FeedEntity>) -> FeedMessage {
        FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                ..Default::default()
            },
            entity,
        }
    }

    fn stop(stop_id: &str, arrival: Option<i64>, departure: Option<i64>) -> StopTimeUpdate {
        StopTimeUpdate {
            stop_id: Some(stop_id.to_string()),
            arrival: arrival.map(|t| StopTimeEvent {
                time: Some(t),
                ..Default::default()
            }),
            departure: departure.map(|t| StopTimeEvent {
                time: Some(t),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn trip_entity(id: &str, trip_id: &str, stops: Vec<StopTimeUpdate>) -> FeedEntity {
        FeedEntity {
            id: id.to_string(),
            trip_update: Some(TripUpdate {
                trip: Some(TripDescriptor {
                    trip_id: Some(trip_id.to_string()),
                    route_id: Some(format!("route-{trip_id}")),
                    agency_id: Some("1".to_string()),
                    ..Default::default()
                }),
                stop_time_update: stops,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_feed_yields_no_records() {
        assert!(extract(&feed(vec![])).unwrap().is_empty());
    }

    #[test]
    fn test_n_by_m_preserves_order() {
        let entities: Vec<_> = (0..3)
            .map(|t| {
                let stops = (0..4)
                    .map(|s| stop(&format!("S{s}"), Some(1_000 + s), None))
                    .collect();
                trip_entity(&format!("e{t}"), &format!("T{t}"), stops)
            })
            .collect();

        let records = extract(&feed(entities)).unwrap();
        assert_eq!(records.len(), 12);

        let keys: Vec<_> = records
            .iter()
            .map(|r| format!("{}/{}", r.trip_id, r.stop_id))
            .collect();
        assert_eq!(keys[0], "T0/S0");
        assert_eq!(keys[3], "T0/S3");
        assert_eq!(keys[4], "T1/S0");
        assert_eq!(keys[11], "T2/S3");
        assert_eq!(records[5].route_id, "route-T1");
        assert_eq!(records[5].agency_id, "1");
    }

    #[test]
    fn test_entities_without_trip_update_are_skipped() {
        let entities = vec![
            FeedEntity {
                id: "alert-only".to_string(),
                ..Default::default()
            },
            trip_entity("e1", "T1", vec![stop("S1", Some(10), Some(20))]),
        ];
        let records = extract(&feed(entities)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].arrival_time, Some(10));
        assert_eq!(records[0].departure_time, Some(20));
    }

    #[test]
    fn test_stop_without_times_still_produces_record() {
        let records = extract(&feed(vec![trip_entity(
            "e1",
            "T1",
            vec![stop("S1", None, None)],
        )]))
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].arrival_time, None);
        assert_eq!(records[0].departure_time, None);
        assert_eq!(records[0].arrival_date, None);
        assert_eq!(records[0].departure_seconds, None);
    }

    #[test]
    fn test_event_without_time_is_absent_not_zero() {
        let mut s = stop("S1", None, None);
        s.arrival = Some(StopTimeEvent {
            delay: Some(60),
            ..Default::default()
        });
        let records = extract(&feed(vec![trip_entity("e1", "T1", vec![s])])).unwrap();
        assert_eq!(records[0].arrival_time, None);
    }

    #[test]
    fn test_missing_identifiers_default_to_empty() {
        let entity = FeedEntity {
            id: "e1".to_string(),
            trip_update: Some(TripUpdate {
                trip: Some(TripDescriptor::default()),
                stop_time_update: vec![StopTimeUpdate::default()],
                ..Default::default()
            }),
            ..Default::default()
        };
        let records = extract(&feed(vec![entity])).unwrap();
        assert_eq!(records[0].trip_id, "");
        assert_eq!(records[0].route_id, "");
        assert_eq!(records[0].agency_id, "");
        assert_eq!(records[0].stop_id, "");
    }

    #[test]
    fn test_trip_update_without_stops_yields_nothing() {
        let records = extract(&feed(vec![trip_entity("e1", "T1", vec![])])).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_missing_trip_descriptor_is_an_error() {
        let entities = vec![
            trip_entity("e0", "T0", vec![stop("S1", Some(1), None)]),
            FeedEntity {
                id: "broken".to_string(),
                trip_update: Some(TripUpdate {
                    trip: None,
                    stop_time_update: vec![stop("S1", Some(1), None)],
                    ..Default::default()
                }),
                ..Default::default()
            },
        ];
        let err = extract(&feed(entities)).unwrap_err();
        match err {
            ExtractionError::MissingTripDescriptor {
                entity_id,
                entity_index,
            } => {
                assert_eq!(entity_id, "broken");
                assert_eq!(entity_index, 1);
            }
        }
    }
}
