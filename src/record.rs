use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Serialize, Serializer};

/// Column order shared by every sink.
pub const COLUMNS: [&str; 12] = [
    "trip_id",
    "route_id",
    "agency_id",
    "stop_id",
    "arrival_time",
    "departure_time",
    "arrival_date",
    "arrival_seconds",
    "departure_date",
    "departure_seconds",
    "future",
    "timestamp",
];

/// One flattened (trip, stop) row.
///
/// Identifiers default to the empty string; raw and derived time fields stay
/// `None` when the feed omits them. Field order matches [`COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripStopRecord {
    pub trip_id: String,
    pub route_id: String,
    pub agency_id: String,
    pub stop_id: String,
    pub arrival_time: Option<i64>,
    pub departure_time: Option<i64>,
    pub arrival_date: Option<NaiveDate>,
    pub arrival_seconds: Option<u32>,
    pub departure_date: Option<NaiveDate>,
    pub departure_seconds: Option<u32>,
    #[serde(serialize_with = "as_flag")]
    pub future: bool,
    pub timestamp: Option<DateTime<FixedOffset>>,
}

impl TripStopRecord {
    /// An unnormalized record as produced by extraction.
    pub fn new(
        trip_id: &str,
        route_id: &str,
        agency_id: &str,
        stop_id: &str,
        arrival_time: Option<i64>,
        departure_time: Option<i64>,
    ) -> Self {
        Self {
            trip_id: trip_id.to_string(),
            route_id: route_id.to_string(),
            agency_id: agency_id.to_string(),
            stop_id: stop_id.to_string(),
            arrival_time,
            departure_time,
            arrival_date: None,
            arrival_seconds: None,
            departure_date: None,
            departure_seconds: None,
            future: false,
            timestamp: None,
        }
    }
}

// The `future` column is stored as 1/0.
fn as_flag<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*value))
}
