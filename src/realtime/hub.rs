//! Per-target fan-out of realtime changes.
//!
//! Each displayed vote control subscribes for its own target. Delivery is
//! at-least-once and carries no ordering guarantee relative to the
//! control's own mutations; the reconciler sorts that out.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::event::{ChangeEvent, RealtimeError, decode_change};
use crate::core::VoteTarget;

#[derive(Default)]
struct HubInner {
    subscribers: HashMap<VoteTarget, Vec<mpsc::UnboundedSender<ChangeEvent>>>,
    closed: bool,
}

impl HubInner {
    /// Forget senders whose subscription was dropped, and targets left
    /// without any.
    fn prune_closed(&mut self) {
        self.subscribers.retain(|_, senders| {
            senders.retain(|tx| !tx.is_closed());
            !senders.is_empty()
        });
    }
}

/// Routes change events to the subscriptions of their target.
#[derive(Default)]
pub struct RealtimeHub {
    inner: Mutex<HubInner>,
}

impl RealtimeHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to changes for one target.
    ///
    /// Subscribing to a closed hub yields a subscription that ends at once.
    pub fn subscribe(&self, target: VoteTarget) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        if !inner.closed {
            inner.prune_closed();
            inner.subscribers.entry(target.clone()).or_default().push(tx);
            debug!(vote_target = %target, "realtime subscription added");
        }
        Subscription { target, rx }
    }

    /// Deliver an event to every live subscription of its target.
    ///
    /// Returns the number of subscriptions reached. Subscriptions whose
    /// receiver was dropped are pruned.
    pub fn publish(&self, event: &ChangeEvent) -> usize {
        let mut inner = self.lock();
        let target = event.target();
        let Some(senders) = inner.subscribers.get_mut(target) else {
            trace!(vote_target = %target, "no subscribers");
            return 0;
        };

        senders.retain(|tx| tx.send(event.clone()).is_ok());
        let delivered = senders.len();
        if delivered == 0 {
            inner.subscribers.remove(target);
        }
        delivered
    }

    /// Decode a raw change-feed document and publish it.
    ///
    /// Changes to tables without vote counts are dropped and reach nobody.
    pub fn publish_raw(&self, payload: &str) -> Result<usize, RealtimeError> {
        Ok(decode_change(payload)?.map_or(0, |event| self.publish(&event)))
    }

    /// Number of live subscriptions for a target.
    pub fn subscriber_count(&self, target: &VoteTarget) -> usize {
        let mut inner = self.lock();
        inner.prune_closed();
        inner.subscribers.get(target).map_or(0, Vec::len)
    }

    /// Number of targets with at least one live subscription.
    pub fn target_count(&self) -> usize {
        let mut inner = self.lock();
        inner.prune_closed();
        inner.subscribers.len()
    }

    /// End every subscription; later subscriptions end immediately.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.subscribers.clear();
        debug!("realtime hub closed");
    }
}

/// Stream of change events for one target.
#[derive(Debug)]
pub struct Subscription {
    target: VoteTarget,
    rx: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl Subscription {
    /// Subscribed target.
    pub fn target(&self) -> &VoteTarget {
        &self.target
    }

    /// Next event, or `None` once the hub is closed.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }
}
