//! Realtime row-change decoding
//!
//! The backend's change feed delivers one JSON document per row change:
//!
//! ```text
//! {
//!   "eventType": "UPDATE",
//!   "table": "posts",
//!   "commit_timestamp": "2024-05-01T12:00:00.123Z",
//!   "new": { "id": "...", "up_count": 6, "down_count": 2, ... },
//!   "old": { "id": "..." }
//! }
//! ```
//!
//! Only the `posts` and `comments` tables carry vote counts; every other
//! table decodes to `None`.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::{DecodeError, TABLE_COMMENTS, TABLE_POSTS, TargetKind, VoteTarget};

/// Errors decoding a change-feed document.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Payload is not valid JSON or has the wrong shape.
    #[error("malformed change payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Row content could not be interpreted.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// `commit_timestamp` is not RFC 3339.
    #[error("invalid commit timestamp {0:?}")]
    InvalidTimestamp(String),
}

/// Row operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    /// Row inserted.
    Insert,
    /// Row updated.
    Update,
    /// Row deleted.
    Delete,
}

#[derive(Debug, Deserialize)]
struct RowChange {
    #[serde(rename = "eventType")]
    event_type: ChangeKind,
    table: String,
    #[serde(default)]
    commit_timestamp: Option<String>,
    #[serde(default)]
    new: Option<CountsRow>,
    #[serde(default)]
    old: Option<CountsRow>,
}

#[derive(Debug, Default, Deserialize)]
struct CountsRow {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    up_count: Option<i64>,
    #[serde(default)]
    down_count: Option<i64>,
}

/// Count change pushed for one target.
///
/// A `None` count was absent from the row and keeps its known value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountUpdate {
    /// Changed target.
    pub target: VoteTarget,
    /// New upvote count, if present.
    pub up: Option<u64>,
    /// New downvote count, if present.
    pub down: Option<u64>,
    /// Commit time in microseconds since the epoch.
    pub version: Option<u64>,
}

/// Decoded change relevant to vote counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Counts changed.
    Counts(CountUpdate),
    /// Target row was deleted.
    Removed(VoteTarget),
}

impl ChangeEvent {
    /// Target the event concerns.
    pub fn target(&self) -> &VoteTarget {
        match self {
            Self::Counts(update) => &update.target,
            Self::Removed(target) => target,
        }
    }
}

fn table_kind(table: &str) -> Option<TargetKind> {
    match table {
        TABLE_POSTS => Some(TargetKind::Post),
        TABLE_COMMENTS => Some(TargetKind::Comment),
        _ => None,
    }
}

fn row_target(kind: TargetKind, row: &CountsRow) -> Result<VoteTarget, DecodeError> {
    let id = match &row.id {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(DecodeError::InvalidEncoding(format!("row id {other}")));
        }
        None => return Err(DecodeError::MissingField("id")),
    };
    VoteTarget::new(kind, id).map_err(|e| DecodeError::InvalidEncoding(e.to_string()))
}

fn count(raw: Option<i64>) -> Option<u64> {
    raw.map(|v| u64::try_from(v).unwrap_or(0))
}

fn parse_version(raw: Option<&str>) -> Result<Option<u64>, RealtimeError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let parsed = chrono::DateTime::parse_from_rfc3339(raw)
        .map_err(|_| RealtimeError::InvalidTimestamp(raw.to_string()))?;
    u64::try_from(parsed.timestamp_micros())
        .map(Some)
        .map_err(|_| RealtimeError::InvalidTimestamp(raw.to_string()))
}

/// Decode one change-feed document.
///
/// Returns `Ok(None)` for tables that carry no vote counts.
pub fn decode_change(payload: &str) -> Result<Option<ChangeEvent>, RealtimeError> {
    let change: RowChange = serde_json::from_str(payload)?;
    let Some(kind) = table_kind(&change.table) else {
        return Ok(None);
    };

    match change.event_type {
        ChangeKind::Insert | ChangeKind::Update => {
            let row = change.new.ok_or(DecodeError::MissingField("new"))?;
            Ok(Some(ChangeEvent::Counts(CountUpdate {
                target: row_target(kind, &row)?,
                up: count(row.up_count),
                down: count(row.down_count),
                version: parse_version(change.commit_timestamp.as_deref())?,
            })))
        }
        ChangeKind::Delete => {
            let row = change.old.ok_or(DecodeError::MissingField("old"))?;
            Ok(Some(ChangeEvent::Removed(row_target(kind, &row)?)))
        }
    }
}
