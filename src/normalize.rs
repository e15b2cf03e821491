//! Epoch-to-civil-time conversion and future classification.
//!
//! `seconds_after_midnight` is wall-clock seconds (`h*3600 + m*60 + s` of the
//! local time), not elapsed seconds since local midnight. On a spring-forward
//! day the skipped hour never appears; on a fall-back day the repeated hour
//! maps twice onto the same values. The range is always `0..86400`.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, TimeDelta, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::record::TripStopRecord;

/// Timezone used when none is configured.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Los_Angeles;

/// A civil date plus wall-clock seconds after midnight in the target timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalTime {
    pub date: NaiveDate,
    pub seconds_after_midnight: u32,
}

impl LocalTime {
    fn of<T: TimeZone>(dt: &DateTime<T>) -> Self {
        Self {
            date: dt.date_naive(),
            seconds_after_midnight: dt.num_seconds_from_midnight(),
        }
    }
}

/// UTC epoch to civil time in `tz`, or `None` when either the instant or its
/// local wall-clock time falls outside chrono's range.
fn civil_time(tz: Tz, epoch: i64) -> Option<LocalTime> {
    let utc = DateTime::from_timestamp(epoch, 0)?.naive_utc();
    let offset = tz.offset_from_utc_datetime(&utc).fix();
    let local = utc.checked_add_signed(TimeDelta::seconds(i64::from(offset.local_minus_utc())))?;
    Some(LocalTime {
        date: local.date(),
        seconds_after_midnight: local.num_seconds_from_midnight(),
    })
}

/// The single instant a run classifies against. Captured once, never re-read.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceNow {
    instant: DateTime<Tz>,
}

impl ReferenceNow {
    /// Reads the wall clock.
    pub fn capture(tz: Tz) -> Self {
        Self::at(Utc::now(), tz)
    }

    pub fn at(instant: DateTime<Utc>, tz: Tz) -> Self {
        Self {
            instant: instant.with_timezone(&tz),
        }
    }

    pub fn from_epoch(epoch_seconds: i64, tz: Tz) -> Option<Self> {
        DateTime::from_timestamp(epoch_seconds, 0).map(|utc| Self::at(utc, tz))
    }

    pub fn local(&self) -> LocalTime {
        LocalTime::of(&self.instant)
    }

    pub fn date(&self) -> NaiveDate {
        self.instant.date_naive()
    }

    pub fn seconds_after_midnight(&self) -> u32 {
        self.instant.num_seconds_from_midnight()
    }

    pub fn as_fixed_offset(&self) -> DateTime<FixedOffset> {
        self.instant.fixed_offset()
    }
}

/// How an arrival is compared against [`ReferenceNow`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FutureComparison {
    /// Compare seconds-after-midnight only, ignoring the date.
    ///
    /// An arrival at 23:00 yesterday counts as future at 08:00 today, and one
    /// at 01:00 tomorrow counts as past at 22:00 today.
    #[default]
    SecondsOfDay,
    /// Compare the full (date, seconds) pair.
    Timestamp,
}

/// Output of [`TimeNormalizer::normalize`]. All three fields are `None` for
/// an absent epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalized {
    pub date: Option<NaiveDate>,
    pub seconds_after_midnight: Option<u32>,
    pub is_future: Option<bool>,
}

#[derive(Debug, Clone, Copy)]
pub struct TimeNormalizer {
    tz: Tz,
    now: ReferenceNow,
    comparison: FutureComparison,
}

impl TimeNormalizer {
    pub fn new(tz: Tz, now: ReferenceNow, comparison: FutureComparison) -> Self {
        Self {
            tz,
            now,
            comparison,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn reference_now(&self) -> &ReferenceNow {
        &self.now
    }

    /// Converts an epoch (UTC seconds) into civil time in the target zone.
    ///
    /// Returns `None` for an absent epoch, or one chrono cannot represent.
    pub fn local_time(&self, epoch_seconds: Option<i64>) -> Option<LocalTime> {
        let epoch = epoch_seconds?;
        let local = civil_time(self.tz, epoch);
        if local.is_none() {
            warn!(epoch, "Epoch out of range, leaving derived time empty");
        }
        local
    }

    pub fn is_future(&self, arrival: Option<LocalTime>) -> Option<bool> {
        let arrival = arrival?;
        let now = self.now.local();

        let future = match self.comparison {
            FutureComparison::SecondsOfDay => {
                if arrival.date != now.date {
                    debug!(
                        arrival_date = %arrival.date,
                        today = %now.date,
                        "Seconds-of-day comparison across dates"
                    );
                }
                arrival.seconds_after_midnight > now.seconds_after_midnight
            }
            FutureComparison::Timestamp => arrival > now,
        };
        Some(future)
    }

    pub fn normalize(&self, epoch_seconds: Option<i64>) -> Normalized {
        let local = self.local_time(epoch_seconds);
        Normalized {
            date: local.map(|l| l.date),
            seconds_after_midnight: local.map(|l| l.seconds_after_midnight),
            is_future: self.is_future(local),
        }
    }

    /// Fills the derived columns of `record` in place.
    ///
    /// `future` follows the arrival only; a record without an arrival time is
    /// never future.
    pub fn apply(&self, record: &mut TripStopRecord) {
        let arrival = self.local_time(record.arrival_time);
        let departure = self.local_time(record.departure_time);

        record.arrival_date = arrival.map(|l| l.date);
        record.arrival_seconds = arrival.map(|l| l.seconds_after_midnight);
        record.departure_date = departure.map(|l| l.date);
        record.departure_seconds = departure.map(|l| l.seconds_after_midnight);
        record.future = self.is_future(arrival) == Some(true);
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    // 2024-03-10T10:00:00Z and 2024-11-03T09:00:00Z, the 2024 transitions
    const SPRING_FORWARD: i64 = 1_710_064_800;
    const FALL_BACK: i64 = 1_730_624_400;

    fn normalizer() -> TimeNormalizer {
        let now = ReferenceNow::from_epoch(1_717_268_400, DEFAULT_TIMEZONE).unwrap();
        TimeNormalizer::new(DEFAULT_TIMEZONE, now, FutureComparison::SecondsOfDay)
    }

    fn direct(epoch: i64) -> LocalTime {
        let dt = Utc
            .timestamp_opt(epoch, 0)
            .unwrap()
            .with_timezone(&DEFAULT_TIMEZONE);
        LocalTime {
            date: dt.date_naive(),
            seconds_after_midnight: dt.num_seconds_from_midnight(),
        }
    }

    fn near_transition() -> impl Strategy<Value = i64> {
        prop_oneof![
            (-7_200i64..7_200).prop_map(|d| SPRING_FORWARD + d),
            (-7_200i64..7_200).prop_map(|d| FALL_BACK + d),
        ]
    }

    proptest! {
        /// Matches converting the epoch to the zone directly.
        #[test]
        fn matches_direct_conversion(epoch in -4_000_000_000i64..8_000_000_000) {
            let local = normalizer().local_time(Some(epoch)).unwrap();
            prop_assert_eq!(local, direct(epoch));
            prop_assert!(local.seconds_after_midnight < 86_400);
        }

        #[test]
        fn matches_direct_conversion_near_dst(epoch in near_transition()) {
            prop_assert_eq!(normalizer().local_time(Some(epoch)).unwrap(), direct(epoch));
        }

        /// Derived date and seconds are both present or both absent.
        #[test]
        fn derived_pairs_agree(arrival in proptest::option::of(any::<i64>()),
                               departure in proptest::option::of(any::<i64>())) {
            let mut r = TripStopRecord::new("T", "R", "", "S", arrival, departure);
            normalizer().apply(&mut r);
            prop_assert_eq!(r.arrival_date.is_some(), r.arrival_seconds.is_some());
            prop_assert_eq!(r.departure_date.is_some(), r.departure_seconds.is_some());
            prop_assert!(arrival.is_some() || r.arrival_date.is_none());
            prop_assert!(departure.is_some() || r.departure_date.is_none());
        }
    }
}
