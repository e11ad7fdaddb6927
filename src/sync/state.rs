//! Per-target vote state
//!
//! Pure arithmetic for optimistic vote transitions. No I/O, no locking;
//! the reconciler wraps this behind its own lock.

use crate::core::{
    Predictable, VoteCounts, VoteDelta, VoteDirection, VoteTarget, VoteValue,
};

/// What a cast asks the backend to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastAction {
    /// Upsert the row with this direction.
    Upsert(VoteDirection),
    /// Delete the row (toggle-off).
    Remove,
}

/// Record of one optimistic step, sufficient to undo it exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prediction {
    /// Vote before the step.
    pub previous: VoteValue,
    /// Vote after the step.
    pub next: VoteValue,
    /// Count adjustment applied.
    pub delta: VoteDelta,
    /// Backend request implied by the step.
    pub action: CastAction,
}

/// The viewer's vote and the best-known counts for one target.
///
/// Displayed counts are authoritative counts plus any local adjustment not
/// yet reconciled. They never go below zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteState {
    target: VoteTarget,
    current: VoteValue,
    counts: VoteCounts,
}

impl VoteState {
    /// Seed from server-provided counts, with no known viewer vote.
    pub fn new(target: VoteTarget, counts: VoteCounts) -> Self {
        Self {
            target,
            current: VoteValue::None,
            counts,
        }
    }

    /// Seed with a known viewer vote.
    pub fn with_vote(mut self, current: VoteValue) -> Self {
        self.current = current;
        self
    }

    /// Target this state tracks.
    pub fn target(&self) -> &VoteTarget {
        &self.target
    }

    /// Viewer's current vote.
    pub fn current(&self) -> VoteValue {
        self.current
    }

    /// Displayed counts.
    pub fn counts(&self) -> VoteCounts {
        self.counts
    }

    /// Displayed upvotes.
    pub fn displayed_up(&self) -> u64 {
        self.counts.up
    }

    /// Displayed downvotes.
    pub fn displayed_down(&self) -> u64 {
        self.counts.down
    }

    /// Replace the viewer's vote without touching counts.
    ///
    /// Used when the existing vote is loaded lazily: server counts already
    /// include it.
    pub(crate) fn set_current(&mut self, current: VoteValue) {
        self.current = current;
    }

    /// Overwrite displayed counts.
    pub(crate) fn set_counts(&mut self, counts: VoteCounts) {
        self.counts = counts;
    }

    /// Add a delta to the displayed counts.
    pub(crate) fn shift(&mut self, delta: VoteDelta) {
        self.counts = self.counts.apply(delta);
    }
}

impl Predictable for VoteState {
    type Input = VoteDirection;
    type Prediction = Prediction;
    type Authoritative = VoteCounts;

    /// Same direction as the current vote toggles it off; anything else
    /// moves the vote to the requested bucket.
    fn predict(&mut self, input: &VoteDirection) -> Prediction {
        let previous = self.current;
        let requested = VoteValue::from(*input);

        let (next, action) = if previous == requested {
            (VoteValue::None, CastAction::Remove)
        } else {
            (requested, CastAction::Upsert(*input))
        };

        let delta = VoteDelta::transition(previous, next);
        self.shift(delta);
        self.current = next;

        Prediction {
            previous,
            next,
            delta,
            action,
        }
    }

    fn reconcile(&mut self, authoritative: &VoteCounts) {
        self.counts = *authoritative;
    }
}
