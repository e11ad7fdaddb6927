//! Reconciliation bookkeeping
//!
//! Tracks operation and version numbers for one reconciler.
//! Each reconciler maintains its own tracker instance.

/// Reconciliation tracker state
///
/// Tracks counters for optimistic reconciliation:
/// - `issued_ops`: Number of casts started (operation ids are 1-based)
/// - `in_flight`: Casts whose mutation has not settled
/// - `generation`: Bumped on every change to displayed state
/// - `remote_mark`: Value of `issued_ops` when a remote reading was last applied
/// - `last_version`: Highest snapshot version applied
#[derive(Debug, Clone, Default)]
pub struct SnapshotTracker {
    /// Number of casts started (monotonic)
    issued_ops: u64,
    /// Casts awaiting their mutation result
    in_flight: u64,
    /// Displayed-state generation (monotonic)
    generation: u64,
    /// `issued_ops` at the last applied remote reading
    remote_mark: Option<u64>,
    /// Highest applied snapshot version
    last_version: Option<u64>,
}

impl SnapshotTracker {
    /// Create a new tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of casts started so far
    pub fn issued_ops(&self) -> u64 {
        self.issued_ops
    }

    /// Current displayed-state generation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Highest applied snapshot version
    pub fn last_version(&self) -> Option<u64> {
        self.last_version
    }

    /// Check if any cast is awaiting its mutation result
    pub fn has_pending(&self) -> bool {
        self.in_flight > 0
    }

    /// Start a cast, returning its operation id
    pub fn begin_op(&mut self) -> u64 {
        self.issued_ops += 1;
        self.in_flight += 1;
        self.issued_ops
    }

    /// Record that a cast's mutation settled (success or failure)
    pub fn settle_op(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Bump displayed-state generation (call whenever displayed state changes)
    pub fn bump_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Record that an authoritative reading overwrote displayed counts
    pub fn record_remote(&mut self) {
        self.remote_mark = Some(self.issued_ops);
        self.bump_generation();
    }

    /// Check if a remote reading was applied after `op` started
    ///
    /// Such a reading replaced the counts `op` adjusted, so its delta is no
    /// longer present in the displayed values.
    pub fn remote_since(&self, op: u64) -> bool {
        self.remote_mark.is_some_and(|mark| mark >= op)
    }

    /// Decide whether a snapshot with `version` may be applied
    ///
    /// Unversioned snapshots are always accepted. Versioned ones must be
    /// strictly newer than the last applied version; accepted versions are
    /// recorded.
    pub fn accept_version(&mut self, version: Option<u64>) -> bool {
        let Some(version) = version else {
            return true;
        };
        if self.last_version.is_some_and(|last| version <= last) {
            return false;
        }
        self.last_version = Some(version);
        true
    }

}
