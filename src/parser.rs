//! Protobuf parser for GTFS Realtime feeds.

use prost::Message;

use crate::gtfs_rt::FeedMessage;

/// Decodes a protobuf-encoded GTFS-RT [`FeedMessage`] from raw bytes.
///
/// No filtering or normalization happens here; optional fields stay optional.
///
/// # Errors
///
/// Returns an error if the bytes are not valid protobuf for a `FeedMessage`.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedMessage, prost::DecodeError> {
    FeedMessage::decode(bytes)
}

/// Renders a decoded feed as a JSON tree, for inspection.
pub fn feed_to_json(feed: &FeedMessage) -> serde_json::Result<serde_json::Value> {
    serde_json::to_value(feed)
}
