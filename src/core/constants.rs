//! Constants shared by the reconciler and the backend clients.
//!
//! Wire values and endpoint paths are fixed by the IdeaBoard backend and
//! MUST NOT be changed independently of it.

use std::time::Duration;

// =============================================================================
// VOTE WIRE VALUES
// =============================================================================

/// Wire value of an upvote.
pub const WIRE_UP: i64 = 1;

/// Wire value of a downvote.
pub const WIRE_DOWN: i64 = -1;

// =============================================================================
// REST API PATHS
// =============================================================================

/// Vote upsert (POST) and delete (DELETE) endpoint.
pub const API_VOTES_PATH: &str = "/api/v1/votes";

/// Viewer's own vote on a target.
pub const API_VIEWER_VOTE_PATH: &str = "/api/v1/votes/me";

/// Single post, carries `up_count` / `down_count`.
pub const API_POSTS_PATH: &str = "/api/v1/posts";

/// Single comment, carries `up_count` / `down_count`.
pub const API_COMMENTS_PATH: &str = "/api/v1/comments";

// =============================================================================
// POSTGREST PATHS
// =============================================================================

/// PostgREST root under the backend base URL.
pub const POSTGREST_ROOT: &str = "/rest/v1";

/// Votes table.
pub const TABLE_VOTES: &str = "votes";

/// Posts table.
pub const TABLE_POSTS: &str = "posts";

/// Comments table.
pub const TABLE_COMMENTS: &str = "comments";

// =============================================================================
// TIMING
// =============================================================================

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default retry attempts for idempotent reads (after the first request).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base retry delay, doubled every attempt.
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

// =============================================================================
// USER-FACING MESSAGES
// =============================================================================

/// Shown when a vote is attempted without a session.
pub const MSG_SIGN_IN: &str = "Please sign in to vote.";

/// Shown when the backend refuses the vote for policy reasons.
pub const MSG_FORBIDDEN: &str = "You do not have permission to vote.";

/// Shown for every other failed vote.
pub const MSG_VOTE_FAILED: &str = "Failed to register vote.";
