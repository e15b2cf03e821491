//! Error types for each pipeline stage.
//!
//! Fetch, decode and extraction failures abort a run before anything reaches
//! the sink. Sink failures are reported only after all in-memory processing
//! has succeeded, so callers can tell a bad feed from a bad destination.

use std::fmt;
use thiserror::Error;

/// The stage of a run that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Decode,
    Extract,
    Sink,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Decode => "decode",
            Stage::Extract => "extract",
            Stage::Sink => "sink",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("entity {entity_index} ('{entity_id}') has a trip update without a trip descriptor")]
    MissingTripDescriptor {
        entity_id: String,
        entity_index: usize,
    },
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Top-level failure of a single run. Exactly one stage is identified.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch failed: {0}")]
    FetchFailed(#[source] FetchError),
    #[error("decode failed: {0}")]
    Decode(#[source] prost::DecodeError),
    #[error("extraction failed: {0}")]
    Extraction(#[source] ExtractionError),
    #[error("sink write failed: {0}")]
    Sink(#[source] SinkError),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::FetchFailed(_) => Stage::Fetch,
            PipelineError::Decode(_) => Stage::Decode,
            PipelineError::Extraction(_) => Stage::Extract,
            PipelineError::Sink(_) => Stage::Sink,
        }
    }
}

impl From<FetchError> for PipelineError {
    fn from(e: FetchError) -> Self {
        PipelineError::FetchFailed(e)
    }
}

impl From<prost::DecodeError> for PipelineError {
    fn from(e: prost::DecodeError) -> Self {
        PipelineError::Decode(e)
    }
}

impl From<ExtractionError> for PipelineError {
    fn from(e: ExtractionError) -> Self {
        PipelineError::Extraction(e)
    }
}

impl From<SinkError> for PipelineError {
    fn from(e: SinkError) -> Self {
        PipelineError::Sink(e)
    }
}
