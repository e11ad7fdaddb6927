//! Error types for IdeaBoard votes.

use std::fmt;

use thiserror::Error;

use super::constants::{MSG_FORBIDDEN, MSG_SIGN_IN, MSG_VOTE_FAILED};
use super::types::VoteTarget;

/// Errors that can occur when decoding backend values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Vote column held something other than `1`, `-1` or null.
    #[error("invalid vote value: {0}")]
    InvalidVoteValue(i64),

    /// A required field was absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Invalid encoding.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),
}

/// Classification of a backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendErrorKind {
    /// Missing or rejected credentials (HTTP 401).
    Unauthorized,
    /// Row-level policy refused the request (HTTP 403).
    Forbidden,
    /// Target or row does not exist (HTTP 404).
    NotFound,
    /// Any other 4xx.
    Rejected,
    /// 5xx.
    Server,
    /// Connection failure or timeout.
    Transport,
    /// Response body could not be decoded.
    Decode,
}

impl BackendErrorKind {
    /// Map an HTTP status to a kind. Success codes are not errors and map to `None`.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            401 => Some(Self::Unauthorized),
            403 => Some(Self::Forbidden),
            404 => Some(Self::NotFound),
            400..=499 => Some(Self::Rejected),
            _ => Some(Self::Server),
        }
    }

    /// Whether the same request may succeed if repeated.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Server | Self::Transport)
    }
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not found",
            Self::Rejected => "rejected",
            Self::Server => "server error",
            Self::Transport => "transport error",
            Self::Decode => "decode error",
        })
    }
}

/// Tagged failure returned by every backend call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct BackendError {
    /// Failure class.
    pub kind: BackendErrorKind,
    /// Diagnostic detail (operation, status, body excerpt).
    pub message: String,
}

impl BackendError {
    /// Build an error.
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<DecodeError> for BackendError {
    fn from(err: DecodeError) -> Self {
        Self::new(BackendErrorKind::Decode, err.to_string())
    }
}

/// Errors surfaced by the vote reconciler to the UI layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VoteError {
    /// No signed-in user. Nothing was changed locally.
    #[error("not signed in")]
    Unauthenticated,

    /// Backend rejected the upsert/delete. The optimistic change was rolled back.
    #[error("vote mutation failed ({kind}): {message}")]
    MutationFailed {
        /// Backend failure class.
        kind: BackendErrorKind,
        /// Backend diagnostic.
        message: String,
    },

    /// Result arrived for a target that is no longer displayed; discarded.
    #[error("stale read for {target}")]
    StaleRead {
        /// Detached target.
        target: VoteTarget,
    },

    /// Reading counts or the viewer's vote from the backend failed.
    #[error("refresh from backend failed: {0}")]
    Refresh(#[source] BackendError),

    /// Target identifier is unusable or does not match this reconciler.
    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

impl VoteError {
    /// Whether the user can sensibly try again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::MutationFailed { kind, .. } => !matches!(
                kind,
                BackendErrorKind::Unauthorized | BackendErrorKind::Forbidden
            ),
            Self::Refresh(_) => true,
            Self::Unauthenticated | Self::StaleRead { .. } | Self::InvalidTarget(_) => false,
        }
    }

    /// Inline message for the vote control, or `None` when nothing should be shown.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            Self::Unauthenticated => Some(MSG_SIGN_IN),
            Self::MutationFailed {
                kind: BackendErrorKind::Unauthorized,
                ..
            } => Some(MSG_SIGN_IN),
            Self::MutationFailed {
                kind: BackendErrorKind::Forbidden,
                ..
            } => Some(MSG_FORBIDDEN),
            Self::MutationFailed { .. } | Self::InvalidTarget(_) => Some(MSG_VOTE_FAILED),
            Self::StaleRead { .. } | Self::Refresh(_) => None,
        }
    }
}
