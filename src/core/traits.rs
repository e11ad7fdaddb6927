//! Core traits for IdeaBoard votes.
//!
//! The reconciler never reaches for ambient globals: the backend and the
//! authentication context are handed to it as trait objects, so tests can
//! substitute in-memory fakes.

use async_trait::async_trait;

use super::error::BackendError;
use super::types::{CountSnapshot, UserId, VoteKey, VoteMutation, VoteTarget, VoteValue};

/// Source of the signed-in user.
///
/// Answered synchronously from a cached session; no network round trip.
pub trait AuthContext: Send + Sync {
    /// Current user, or `None` when signed out.
    fn current_user(&self) -> Option<UserId>;
}

impl AuthContext for Option<UserId> {
    fn current_user(&self) -> Option<UserId> {
        self.clone()
    }
}

/// Backend operations the vote reconciler depends on.
///
/// # Requirements
///
/// - `upsert_vote` MUST be keyed on (user, target) so repeating it never
///   creates a second row
/// - `delete_vote` MUST succeed when the row is already gone
/// - neither mutation returns counts; use `fetch_counts`
#[async_trait]
pub trait VoteBackend: Send + Sync {
    /// Insert or replace the caller's vote on a target.
    async fn upsert_vote(&self, mutation: &VoteMutation) -> Result<(), BackendError>;

    /// Remove the caller's vote on a target.
    async fn delete_vote(&self, key: &VoteKey) -> Result<(), BackendError>;

    /// Current aggregate counts for a target.
    async fn fetch_counts(&self, target: &VoteTarget) -> Result<CountSnapshot, BackendError>;

    /// The caller's existing vote on a target, `VoteValue::None` if there is none.
    async fn fetch_viewer_vote(&self, key: &VoteKey) -> Result<VoteValue, BackendError>;
}

/// State that supports optimistic local prediction.
///
/// Mirrors speculative input handling: `predict` applies user intent before
/// the backend confirms it, `reconcile` folds in authoritative values.
pub trait Predictable {
    /// User intent.
    type Input;

    /// What a prediction did, enough to undo it.
    type Prediction;

    /// Authoritative server reading.
    type Authoritative;

    /// Apply speculative input locally.
    fn predict(&mut self, input: &Self::Input) -> Self::Prediction;

    /// Reconcile with authoritative server state.
    fn reconcile(&mut self, authoritative: &Self::Authoritative);
}
