use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use csv::WriterBuilder;
use tracing::debug;

use super::RecordSink;
use crate::error::SinkError;
use crate::record::{COLUMNS, TripStopRecord};

/// Writes records as a delimited file with a header row.
///
/// By default each run replaces the file, so re-running against the same
/// snapshot yields the same output. In append mode the header is written only
/// when the file does not exist yet.
pub struct CsvSink {
    path: PathBuf,
    append: bool,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append: false,
        }
    }

    pub fn appending(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_sync(&self, records: &[TripStopRecord]) -> Result<usize, SinkError> {
        let file_exists = self.path.exists();
        debug!(path = %self.path.display(), file_exists, append = self.append, "Writing CSV");

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = if self.append {
            OpenOptions::new().append(true).create(true).open(&self.path)?
        } else {
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&self.path)?
        };

        // Header is written by hand so an empty run still documents the schema.
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if !(self.append && file_exists) {
            writer.write_record(COLUMNS)?;
        }

        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;

        Ok(records.len())
    }
}

#[async_trait]
impl RecordSink for CsvSink {
    async fn write(&mut self, records: &[TripStopRecord]) -> Result<usize, SinkError> {
        self.write_sync(records)
    }
}
