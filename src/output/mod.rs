//! Destinations for retained records.
//!
//! Every sink writes the columns listed in [`crate::record::COLUMNS`], in
//! that order.

mod csv;
mod postgres;

pub use self::csv::CsvSink;
pub use self::postgres::PostgresSink;

use async_trait::async_trait;

use crate::error::SinkError;
use crate::record::TripStopRecord;

#[async_trait]
pub trait RecordSink: Send {
    /// Persists one run's records and returns how many rows were written.
    async fn write(&mut self, records: &[TripStopRecord]) -> Result<usize, SinkError>;
}
