//! Vote reconciler
//!
//! Mediates between user intent (vote clicks) and backend truth
//! (authoritative counts). Clicks are applied optimistically before the
//! mutation is sent; failures roll the change back; successes and realtime
//! pushes overwrite displayed counts with authoritative values.
//!
//! The displayed state is only locked for the synchronous part of each
//! transition. No lock is held across a backend call except the optional
//! single-flight gate.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use super::state::{CastAction, VoteState};
use super::tracker::SnapshotTracker;
use crate::core::{
    AuthContext, CountSnapshot, Predictable, VoteBackend, VoteCounts, VoteDelta, VoteDirection,
    VoteError, VoteKey, VoteMutation, VoteTarget, VoteValue,
};

/// What to do once a mutation succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AfterSuccess {
    /// Re-fetch authoritative counts and overwrite. Absorbs votes from other
    /// users that landed while the mutation was in flight.
    #[default]
    Refetch,
    /// Keep the optimistic counts.
    TrustLocal,
}

/// How remote readings treat optimistic deltas that are still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingPolicy {
    /// Remote readings replace displayed counts outright (last writer wins).
    #[default]
    Overwrite,
    /// Remote readings become the base and in-flight deltas are re-applied
    /// on top until their own mutation settles.
    KeepProvisional,
}

/// Reconciler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcilerConfig {
    /// Behaviour after a successful mutation.
    pub after_success: AfterSuccess,
    /// Treatment of in-flight deltas on remote readings.
    pub pending_policy: PendingPolicy,
    /// Allow at most one in-flight mutation for this target.
    pub single_flight: bool,
}

impl ReconcilerConfig {
    /// Set the after-success behaviour.
    pub fn after_success(mut self, after_success: AfterSuccess) -> Self {
        self.after_success = after_success;
        self
    }

    /// Set the pending-delta policy.
    pub fn pending_policy(mut self, policy: PendingPolicy) -> Self {
        self.pending_policy = policy;
        self
    }

    /// Enable or disable per-target single-flight.
    pub fn single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }
}

/// Whether an optimistic mutation is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No mutation in flight.
    Idle,
    /// At least one optimistic change awaits backend confirmation.
    OptimisticPending,
}

/// Result of a successful cast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastOutcome {
    /// State after the mutation settled (and after the refresh, if any).
    pub state: VoteState,
    /// What was sent to the backend.
    pub action: CastAction,
    /// Whether displayed counts were overwritten by a fresh fetch.
    pub refreshed: bool,
}

/// Result of offering an authoritative reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Displayed counts were overwritten.
    Applied(VoteState),
    /// Reading was older than one already applied.
    Ignored {
        /// Version of the reading that wins.
        last_version: u64,
    },
}

/// Optimistic step still tracked by the reconciler.
#[derive(Debug, Clone, Copy)]
struct PendingCast {
    /// Vote to restore if this cast is undone.
    previous: VoteValue,
    /// Count adjustment to undo with it.
    delta: VoteDelta,
    /// Mutation confirmed; kept only while an earlier cast is in flight.
    confirmed: bool,
}

struct Inner {
    state: VoteState,
    tracker: SnapshotTracker,
    /// Casts by operation id, oldest first.
    casts: BTreeMap<u64, PendingCast>,
    attached: bool,
}

impl Inner {
    fn provisional(&self, policy: PendingPolicy) -> VoteDelta {
        match policy {
            PendingPolicy::Overwrite => VoteDelta::default(),
            PendingPolicy::KeepProvisional => self
                .casts
                .values()
                .filter(|cast| !cast.confirmed)
                .map(|cast| cast.delta)
                .sum(),
        }
    }

    /// Overwrite counts from a (possibly partial) remote reading.
    fn apply_remote(&mut self, up: Option<u64>, down: Option<u64>, policy: PendingPolicy) {
        let provisional = self.provisional(policy);
        let base = self.state.counts().apply(provisional.inverse());
        let authoritative = VoteCounts::new(up.unwrap_or(base.up), down.unwrap_or(base.down));
        self.state.reconcile(&authoritative.apply(provisional));
        self.tracker.record_remote();
    }

    /// Drop confirmed casts no earlier cast depends on.
    fn prune(&mut self) {
        while let Some(entry) = self.casts.first_entry() {
            if !entry.get().confirmed {
                break;
            }
            entry.remove();
        }
    }

    fn confirm(&mut self, op: u64) {
        if let Some(cast) = self.casts.get_mut(&op) {
            cast.confirmed = true;
        }
        self.prune();
    }

    /// Undo a failed cast.
    ///
    /// A later cast was predicted on top of this one, so while it stands the
    /// displayed counts already carry the net change. The failed step is
    /// then folded into that cast if it is still in flight, so undoing it
    /// later restores the vote from before both.
    ///
    /// Without a later cast, the pre-call snapshot is restored if nothing
    /// touched the state since the optimistic step. Otherwise the delta is
    /// inverted (when it is still part of the displayed counts) and the
    /// previous vote restored.
    fn roll_back(
        &mut self,
        op: u64,
        before: VoteState,
        generation_after: u64,
        policy: PendingPolicy,
    ) {
        let Some(failed) = self.casts.remove(&op) else {
            return;
        };
        let delta_displayed =
            policy == PendingPolicy::KeepProvisional || !self.tracker.remote_since(op);

        if let Some((_, next)) = self.casts.range_mut(op + 1..).next() {
            if !next.confirmed {
                next.previous = failed.previous;
                if delta_displayed {
                    next.delta = failed.delta + next.delta;
                }
            }
        } else if self.tracker.generation() == generation_after {
            self.state = before;
        } else {
            if delta_displayed {
                self.state.shift(failed.delta.inverse());
            }
            self.state.set_current(failed.previous);
        }
        self.tracker.bump_generation();
        self.prune();
    }
}

/// Optimistic vote state for one target, owned by one vote control.
///
/// # Example
///
/// ```ignore
/// let reconciler = VoteReconciler::new(seed, backend, session);
/// match reconciler.cast_vote(VoteDirection::Up).await {
///     Ok(outcome) => render(outcome.state),
///     Err(err) => show_inline(err.user_message()),
/// }
/// ```
pub struct VoteReconciler {
    target: VoteTarget,
    inner: Mutex<Inner>,
    /// Held across the whole mutation when single-flight is enabled.
    flight: Mutex<()>,
    /// Flipped once by `detach`; observed by realtime pumps.
    detached: watch::Sender<bool>,
    backend: Arc<dyn VoteBackend>,
    auth: Arc<dyn AuthContext>,
    config: ReconcilerConfig,
}

impl VoteReconciler {
    /// Create a reconciler seeded from server-provided state.
    pub fn new(seed: VoteState, backend: Arc<dyn VoteBackend>, auth: Arc<dyn AuthContext>) -> Self {
        Self {
            target: seed.target().clone(),
            inner: Mutex::new(Inner {
                state: seed,
                tracker: SnapshotTracker::new(),
                casts: BTreeMap::new(),
                attached: true,
            }),
            flight: Mutex::new(()),
            detached: watch::Sender::new(false),
            backend,
            auth,
            config: ReconcilerConfig::default(),
        }
    }

    /// Replace the default configuration.
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Target this reconciler tracks.
    pub fn target(&self) -> &VoteTarget {
        &self.target
    }

    /// Active configuration.
    pub fn config(&self) -> ReconcilerConfig {
        self.config
    }

    /// Copy of the current state.
    pub async fn state(&self) -> VoteState {
        self.inner.lock().await.state.clone()
    }

    /// Current phase.
    pub async fn phase(&self) -> Phase {
        if self.inner.lock().await.tracker.has_pending() {
            Phase::OptimisticPending
        } else {
            Phase::Idle
        }
    }

    /// Check if the owning control is still displayed.
    pub async fn is_attached(&self) -> bool {
        self.inner.lock().await.attached
    }

    /// Discard the state: the owning control went away.
    ///
    /// Every later completion, refresh or push is a no-op reported as
    /// [`VoteError::StaleRead`].
    pub async fn detach(&self) {
        let mut inner = self.inner.lock().await;
        if inner.attached {
            inner.attached = false;
            self.detached.send_replace(true);
            debug!(vote_target = %self.target, "reconciler detached");
        }
    }

    /// Resolve once the reconciler is detached.
    pub async fn detached(&self) {
        let mut rx = self.detached.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|detached| *detached).await;
    }

    fn stale(&self) -> VoteError {
        VoteError::StaleRead {
            target: self.target.clone(),
        }
    }

    /// Cast, switch, or toggle off the viewer's vote.
    ///
    /// Same direction as the current vote removes it; anything else upserts.
    /// Displayed counts change before the backend is contacted. On failure
    /// the change is rolled back and [`VoteError::MutationFailed`] returned.
    pub async fn cast_vote(&self, direction: VoteDirection) -> Result<CastOutcome, VoteError> {
        let user = self.auth.current_user().ok_or(VoteError::Unauthenticated)?;

        let _flight = if self.config.single_flight {
            Some(self.flight.lock().await)
        } else {
            None
        };

        let (op, before, prediction, generation_after) = {
            let mut inner = self.inner.lock().await;
            if !inner.attached {
                return Err(self.stale());
            }
            let before = inner.state.clone();
            let prediction = inner.state.predict(&direction);
            let op = inner.tracker.begin_op();
            let generation_after = inner.tracker.bump_generation();
            inner.casts.insert(
                op,
                PendingCast {
                    previous: prediction.previous,
                    delta: prediction.delta,
                    confirmed: false,
                },
            );
            debug!(
                vote_target = %self.target,
                op,
                from = %prediction.previous,
                to = %prediction.next,
                up = inner.state.displayed_up(),
                down = inner.state.displayed_down(),
                "optimistic vote applied"
            );
            (op, before, prediction, generation_after)
        };

        let key = VoteKey {
            user,
            target: self.target.clone(),
        };
        let result = match prediction.action {
            CastAction::Upsert(direction) => {
                self.backend
                    .upsert_vote(&VoteMutation { key, direction })
                    .await
            }
            CastAction::Remove => self.backend.delete_vote(&key).await,
        };

        let state = {
            let mut inner = self.inner.lock().await;
            inner.tracker.settle_op();

            if !inner.attached {
                inner.casts.remove(&op);
                debug!(vote_target = %self.target, op, "mutation settled after detach");
                return Err(self.stale());
            }

            if let Err(err) = result {
                let policy = self.config.pending_policy;
                inner.roll_back(op, before, generation_after, policy);
                warn!(
                    vote_target = %self.target,
                    op,
                    kind = %err.kind,
                    restored = %inner.state.current(),
                    "vote mutation failed, rolled back: {}",
                    err.message
                );
                return Err(VoteError::MutationFailed {
                    kind: err.kind,
                    message: err.message,
                });
            }

            inner.confirm(op);
            info!(
                vote_target = %self.target,
                op,
                value = %prediction.next,
                "vote mutation confirmed"
            );
            inner.state.clone()
        };

        if self.config.after_success == AfterSuccess::TrustLocal {
            return Ok(CastOutcome {
                state,
                action: prediction.action,
                refreshed: false,
            });
        }

        match self.refresh().await {
            Ok(state) => Ok(CastOutcome {
                state,
                action: prediction.action,
                refreshed: true,
            }),
            Err(err @ VoteError::StaleRead { .. }) => Err(err),
            Err(err) => {
                warn!(vote_target = %self.target, op, "keeping optimistic counts: {err}");
                Ok(CastOutcome {
                    state: self.state().await,
                    action: prediction.action,
                    refreshed: false,
                })
            }
        }
    }

    /// Overwrite displayed counts with an authoritative reading.
    ///
    /// Accepted in any phase; never changes the pending flag. Applying the
    /// same reading twice changes nothing the second time.
    pub async fn apply_remote_update(&self, up: u64, down: u64) -> Result<VoteState, VoteError> {
        let mut inner = self.inner.lock().await;
        if !inner.attached {
            return Err(self.stale());
        }
        inner.apply_remote(Some(up), Some(down), self.config.pending_policy);
        debug!(vote_target = %self.target, up, down, "remote counts applied");
        Ok(inner.state.clone())
    }

    /// Offer a snapshot, honouring its version if it carries one.
    pub async fn apply_snapshot(
        &self,
        snapshot: &CountSnapshot,
    ) -> Result<SnapshotOutcome, VoteError> {
        self.apply_partial(
            &snapshot.target,
            Some(snapshot.counts.up),
            Some(snapshot.counts.down),
            snapshot.version,
        )
        .await
    }

    /// Offer a reading that may lack one of the counts.
    ///
    /// A missing count keeps its currently known authoritative value.
    /// Versioned readings not newer than the last applied one are ignored.
    pub async fn apply_partial(
        &self,
        target: &VoteTarget,
        up: Option<u64>,
        down: Option<u64>,
        version: Option<u64>,
    ) -> Result<SnapshotOutcome, VoteError> {
        if target != &self.target {
            return Err(VoteError::InvalidTarget(format!(
                "reading for {target} offered to {}",
                self.target
            )));
        }

        let mut inner = self.inner.lock().await;
        if !inner.attached {
            return Err(self.stale());
        }
        if !inner.tracker.accept_version(version) {
            let last_version = inner.tracker.last_version().unwrap_or_default();
            debug!(vote_target = %self.target, ?version, last_version, "older snapshot ignored");
            return Ok(SnapshotOutcome::Ignored { last_version });
        }

        inner.apply_remote(up, down, self.config.pending_policy);
        debug!(
            vote_target = %self.target,
            ?version,
            up = inner.state.displayed_up(),
            down = inner.state.displayed_down(),
            "snapshot applied"
        );
        Ok(SnapshotOutcome::Applied(inner.state.clone()))
    }

    /// Fetch authoritative counts and overwrite displayed ones.
    pub async fn refresh(&self) -> Result<VoteState, VoteError> {
        if !self.is_attached().await {
            return Err(self.stale());
        }
        let snapshot = self
            .backend
            .fetch_counts(&self.target)
            .await
            .map_err(VoteError::Refresh)?;

        match self.apply_snapshot(&snapshot).await? {
            SnapshotOutcome::Applied(state) => Ok(state),
            SnapshotOutcome::Ignored { .. } => Ok(self.state().await),
        }
    }

    /// Load the viewer's existing vote.
    ///
    /// Returns `Ok(None)` when signed out. The loaded value is only adopted
    /// if the viewer has not cast anything since the reconciler was created;
    /// otherwise their newer intent wins and the current value is returned.
    pub async fn load_viewer_vote(&self) -> Result<Option<VoteValue>, VoteError> {
        let Some(user) = self.auth.current_user() else {
            return Ok(None);
        };
        if !self.is_attached().await {
            return Err(self.stale());
        }

        let key = VoteKey {
            user,
            target: self.target.clone(),
        };
        let value = self
            .backend
            .fetch_viewer_vote(&key)
            .await
            .map_err(VoteError::Refresh)?;

        let mut inner = self.inner.lock().await;
        if !inner.attached {
            return Err(self.stale());
        }
        if inner.tracker.issued_ops() > 0 {
            debug!(
                vote_target = %self.target,
                loaded = %value,
                "viewer vote superseded by local cast"
            );
            return Ok(Some(inner.state.current()));
        }
        inner.state.set_current(value);
        inner.tracker.bump_generation();
        debug!(vote_target = %self.target, value = %value, "viewer vote loaded");
        Ok(Some(value))
    }
}

impl std::fmt::Debug for VoteReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoteReconciler")
            .field("target", &self.target)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
