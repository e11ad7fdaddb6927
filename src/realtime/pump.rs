//! Drives a reconciler from a realtime subscription.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::event::ChangeEvent;
use super::hub::Subscription;
use crate::core::VoteError;
use crate::sync::VoteReconciler;

/// Why a pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// The reconciler was detached by its owner.
    Detached,
    /// The target row was deleted; the pump detached the reconciler.
    Removed,
    /// The hub closed the subscription.
    Closed,
}

/// Feed every event of `subscription` into `reconciler` until one side ends.
///
/// Detaching the reconciler stops the pump right away and drops the
/// subscription, without waiting for another event.
pub async fn pump(mut subscription: Subscription, reconciler: Arc<VoteReconciler>) -> PumpExit {
    let target = subscription.target().clone();
    loop {
        let event = tokio::select! {
            biased;
            _ = reconciler.detached() => {
                debug!(vote_target = %target, "reconciler detached, pump stopping");
                return PumpExit::Detached;
            }
            event = subscription.recv() => event,
        };
        let Some(event) = event else {
            return PumpExit::Closed;
        };
        match event {
            ChangeEvent::Counts(update) => {
                let applied = reconciler
                    .apply_partial(&update.target, update.up, update.down, update.version)
                    .await;
                match applied {
                    Ok(_) => {}
                    Err(VoteError::StaleRead { .. }) => return PumpExit::Detached,
                    Err(err) => {
                        warn!(vote_target = %update.target, "realtime update dropped: {err}");
                    }
                }
            }
            ChangeEvent::Removed(target) => {
                debug!(vote_target = %target, "target deleted, detaching");
                reconciler.detach().await;
                return PumpExit::Removed;
            }
        }
    }
}

/// Run [`pump`] on the current runtime.
pub fn spawn_pump(
    subscription: Subscription,
    reconciler: Arc<VoteReconciler>,
) -> JoinHandle<PumpExit> {
    tokio::spawn(pump(subscription, reconciler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        AuthContext, BackendError, BackendErrorKind, CountSnapshot, UserId, VoteBackend,
        VoteCounts, VoteKey, VoteMutation, VoteTarget, VoteValue,
    };
    use crate::realtime::{CountUpdate, RealtimeHub};
    use crate::sync::VoteState;
    use async_trait::async_trait;

    /// Backend that is never reached by the pump.
    struct Unreachable;

    #[async_trait]
    impl VoteBackend for Unreachable {
        async fn upsert_vote(&self, _: &VoteMutation) -> Result<(), BackendError> {
            Err(BackendError::new(BackendErrorKind::Transport, "offline"))
        }
        async fn delete_vote(&self, _: &VoteKey) -> Result<(), BackendError> {
            Err(BackendError::new(BackendErrorKind::Transport, "offline"))
        }
        async fn fetch_counts(&self, _: &VoteTarget) -> Result<CountSnapshot, BackendError> {
            Err(BackendError::new(BackendErrorKind::Transport, "offline"))
        }
        async fn fetch_viewer_vote(&self, _: &VoteKey) -> Result<VoteValue, BackendError> {
            Err(BackendError::new(BackendErrorKind::Transport, "offline"))
        }
    }

    fn reconciler(target: &VoteTarget) -> Arc<VoteReconciler> {
        let auth: Arc<dyn AuthContext> = Arc::new(Some(UserId::new("alice")));
        Arc::new(VoteReconciler::new(
            VoteState::new(target.clone(), VoteCounts::new(1, 1)),
            Arc::new(Unreachable),
            auth,
        ))
    }

    fn counts(
        target: &VoteTarget,
        up: Option<u64>,
        down: Option<u64>,
        version: Option<u64>,
    ) -> ChangeEvent {
        ChangeEvent::Counts(CountUpdate {
            target: target.clone(),
            up,
            down,
            version,
        })
    }

    #[tokio::test]
    async fn test_pump_applies_updates_until_closed() {
        let hub = RealtimeHub::new();
        let target = VoteTarget::post("p1").unwrap();
        let reconciler = reconciler(&target);
        let handle = spawn_pump(hub.subscribe(target.clone()), reconciler.clone());

        hub.publish(&counts(&target, Some(4), Some(2), Some(10)));
        hub.publish(&counts(&target, Some(9), Some(9), Some(5))); // older, ignored
        hub.publish(&counts(&target, None, Some(3), None));
        hub.close();

        assert_eq!(handle.await.unwrap(), PumpExit::Closed);
        assert_eq!(reconciler.state().await.counts(), VoteCounts::new(4, 3));
    }

    #[tokio::test]
    async fn test_pump_detaches_on_delete() {
        let hub = RealtimeHub::new();
        let target = VoteTarget::comment("c1").unwrap();
        let reconciler = reconciler(&target);
        let handle = spawn_pump(hub.subscribe(target.clone()), reconciler.clone());

        hub.publish(&ChangeEvent::Removed(target.clone()));

        assert_eq!(handle.await.unwrap(), PumpExit::Removed);
        assert!(!reconciler.is_attached().await);
    }

    #[tokio::test]
    async fn test_pump_stops_when_owner_detached() {
        let hub = RealtimeHub::new();
        let target = VoteTarget::post("p1").unwrap();
        let reconciler = reconciler(&target);
        reconciler.detach().await;
        let handle = spawn_pump(hub.subscribe(target.clone()), reconciler);

        hub.publish(&counts(&target, Some(1), Some(0), None));

        assert_eq!(handle.await.unwrap(), PumpExit::Detached);
    }

    #[tokio::test]
    async fn test_detach_stops_idle_pump() {
        let hub = RealtimeHub::new();
        let target = VoteTarget::post("p1").unwrap();
        let reconciler = reconciler(&target);
        let handle = spawn_pump(hub.subscribe(target.clone()), reconciler.clone());
        assert_eq!(hub.subscriber_count(&target), 1);

        reconciler.detach().await;
        let weak = Arc::downgrade(&reconciler);
        drop(reconciler);

        // No event is published; the detach alone ends the pump.
        let exit = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("pump still running after detach")
            .unwrap();
        assert_eq!(exit, PumpExit::Detached);
        assert!(weak.upgrade().is_none());
        assert_eq!(hub.subscriber_count(&target), 0);
    }
}
