use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::debug;

use super::RecordSink;
use crate::error::SinkError;
use crate::record::TripStopRecord;

/// Table schema. Columns mirror [`crate::record::COLUMNS`].
pub const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS trip_stop_updates (
    id BIGSERIAL PRIMARY KEY,
    trip_id TEXT NOT NULL,
    route_id TEXT NOT NULL,
    agency_id TEXT NOT NULL,
    stop_id TEXT NOT NULL,
    arrival_time BIGINT,
    departure_time BIGINT,
    arrival_date DATE,
    arrival_seconds INTEGER,
    departure_date DATE,
    departure_seconds INTEGER,
    future BOOLEAN NOT NULL,
    timestamp TIMESTAMPTZ NOT NULL
)";

const INSERT: &str = "INSERT INTO trip_stop_updates (
    trip_id, route_id, agency_id, stop_id, arrival_time, departure_time,
    arrival_date, arrival_seconds, departure_date, departure_seconds,
    future, timestamp
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)";

/// Inserts each run's records into `trip_stop_updates` in one transaction.
///
/// The connection is opened on the first write, after the feed has been
/// processed, so an unreachable database never masks a bad feed.
pub struct PostgresSink {
    database_url: String,
    pool: Option<PgPool>,
}

impl PostgresSink {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            pool: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.pool.is_some()
    }

    /// Connects and creates the table if it is missing. Reuses the pool
    /// once connected.
    async fn pool(&mut self) -> Result<&PgPool, SinkError> {
        let pool = match self.pool.take() {
            Some(pool) => pool,
            None => {
                let pool = PgPoolOptions::new()
                    .max_connections(2)
                    .acquire_timeout(Duration::from_secs(10))
                    .connect(&self.database_url)
                    .await?;

                sqlx::query(CREATE_TABLE).execute(&pool).await?;
                debug!("trip_stop_updates table ready");
                pool
            }
        };
        Ok(self.pool.insert(pool))
    }
}

#[async_trait]
impl RecordSink for PostgresSink {
    async fn write(&mut self, records: &[TripStopRecord]) -> Result<usize, SinkError> {
        let pool = self.pool().await?;
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = pool.begin().await?;

        for r in records {
            sqlx::query(INSERT)
                .bind(&r.trip_id)
                .bind(&r.route_id)
                .bind(&r.agency_id)
                .bind(&r.stop_id)
                .bind(r.arrival_time)
                .bind(r.departure_time)
                .bind(r.arrival_date)
                .bind(r.arrival_seconds.map(|s| s as i32))
                .bind(r.departure_date)
                .bind(r.departure_seconds.map(|s| s as i32))
                .bind(r.future)
                .bind(r.timestamp)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(count = records.len(), "Inserted trip stop records");

        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::COLUMNS;

    fn insert_columns() -> Vec<String> {
        let start = INSERT.find('(').unwrap() + 1;
        let end = INSERT.find(')').unwrap();
        INSERT[start..end]
            .split(',')
            .map(|c| c.trim().to_string())
            .collect()
    }

    fn table_columns() -> Vec<String> {
        CREATE_TABLE
            .lines()
            .skip(1)
            .filter_map(|line| line.split_whitespace().next())
            .filter(|name| *name != ")" && *name != "id")
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_insert_columns_match_record_order() {
        assert_eq!(insert_columns(), COLUMNS.to_vec());
    }

    #[test]
    fn test_insert_has_one_placeholder_per_column() {
        let values = &INSERT[INSERT.find("VALUES").unwrap()..];
        let placeholders = values.matches('$').count();
        assert_eq!(placeholders, COLUMNS.len());
        assert!(values.contains(&format!("${}", COLUMNS.len())));
    }

    #[test]
    fn test_table_declares_record_columns() {
        assert_eq!(table_columns(), COLUMNS.to_vec());
    }

    #[test]
    fn test_new_does_not_connect() {
        let sink = PostgresSink::new("postgres://u:p@127.0.0.1:1/db");
        assert!(!sink.is_connected());
    }
}
