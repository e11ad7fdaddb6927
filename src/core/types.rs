//! Identifiers, vote values and count arithmetic.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::constants::{WIRE_DOWN, WIRE_UP};
use super::error::{DecodeError, VoteError};

/// Kind of entity that can receive votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// An idea post.
    Post,
    /// A comment under a post.
    Comment,
}

impl TargetKind {
    /// Foreign-key column naming this kind in vote rows (`post_id` / `comment_id`).
    pub fn id_column(self) -> &'static str {
        match self {
            Self::Post => "post_id",
            Self::Comment => "comment_id",
        }
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identifier of a post or comment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Exactly one post or one comment.
///
/// The kind and identifier travel together, so a target naming both a post
/// and a comment cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoteTarget {
    kind: TargetKind,
    id: TargetId,
}

impl VoteTarget {
    /// Build a target. Blank identifiers are rejected.
    pub fn new(kind: TargetKind, id: impl Into<String>) -> Result<Self, VoteError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(VoteError::InvalidTarget(format!("empty {kind} id")));
        }
        Ok(Self {
            kind,
            id: TargetId(id),
        })
    }

    /// Target a post.
    pub fn post(id: impl Into<String>) -> Result<Self, VoteError> {
        Self::new(TargetKind::Post, id)
    }

    /// Target a comment.
    pub fn comment(id: impl Into<String>) -> Result<Self, VoteError> {
        Self::new(TargetKind::Comment, id)
    }

    /// Kind of the target.
    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    /// Identifier of the target.
    pub fn id(&self) -> &TargetId {
        &self.id
    }
}

impl fmt::Display for VoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Authenticated user identifier (the auth subject).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a raw subject.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw subject.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Direction of a vote click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteDirection {
    /// Upvote.
    Up,
    /// Downvote.
    Down,
}

impl VoteDirection {
    /// Wire encoding (`1` / `-1`).
    pub fn to_wire(self) -> i64 {
        match self {
            Self::Up => WIRE_UP,
            Self::Down => WIRE_DOWN,
        }
    }
}

/// A user's vote on one target. At most one per (user, target).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VoteValue {
    /// No vote.
    #[default]
    None,
    /// Upvoted.
    Up,
    /// Downvoted.
    Down,
}

impl VoteValue {
    /// Decode the backend's nullable integer column.
    pub fn from_wire(raw: Option<i64>) -> Result<Self, DecodeError> {
        match raw {
            None => Ok(Self::None),
            Some(WIRE_UP) => Ok(Self::Up),
            Some(WIRE_DOWN) => Ok(Self::Down),
            Some(other) => Err(DecodeError::InvalidVoteValue(other)),
        }
    }

    /// Encode for the wire; `None` has no row.
    pub fn to_wire(self) -> Option<i64> {
        self.direction().map(VoteDirection::to_wire)
    }

    /// Direction of a cast vote.
    pub fn direction(self) -> Option<VoteDirection> {
        match self {
            Self::None => None,
            Self::Up => Some(VoteDirection::Up),
            Self::Down => Some(VoteDirection::Down),
        }
    }

    /// Whether a vote row exists.
    pub fn is_cast(self) -> bool {
        self != Self::None
    }
}

impl From<VoteDirection> for VoteValue {
    fn from(direction: VoteDirection) -> Self {
        match direction {
            VoteDirection::Up => Self::Up,
            VoteDirection::Down => Self::Down,
        }
    }
}

impl fmt::Display for VoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Up => "up",
            Self::Down => "down",
        })
    }
}

/// Signed adjustment to a pair of counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoteDelta {
    /// Change to the up bucket.
    pub up: i64,
    /// Change to the down bucket.
    pub down: i64,
}

impl VoteDelta {
    /// Delta that moves a user's vote from `from` to `to`.
    ///
    /// -1 on the bucket being left, +1 on the bucket being entered.
    pub fn transition(from: VoteValue, to: VoteValue) -> Self {
        let mut delta = Self::default();
        match from {
            VoteValue::Up => delta.up -= 1,
            VoteValue::Down => delta.down -= 1,
            VoteValue::None => {}
        }
        match to {
            VoteValue::Up => delta.up += 1,
            VoteValue::Down => delta.down += 1,
            VoteValue::None => {}
        }
        delta
    }

    /// Exact inverse.
    pub fn inverse(self) -> Self {
        Self {
            up: -self.up,
            down: -self.down,
        }
    }

    /// Whether the delta changes nothing.
    pub fn is_zero(self) -> bool {
        self.up == 0 && self.down == 0
    }
}

impl std::ops::Add for VoteDelta {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            up: self.up + rhs.up,
            down: self.down + rhs.down,
        }
    }
}

impl std::iter::Sum for VoteDelta {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, d| acc + d)
    }
}

/// Aggregate up/down counts for one target. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct VoteCounts {
    /// Number of upvotes.
    pub up: u64,
    /// Number of downvotes.
    pub down: u64,
}

impl VoteCounts {
    /// Build counts.
    pub const fn new(up: u64, down: u64) -> Self {
        Self { up, down }
    }

    /// Counts from backend columns; missing or negative values read as zero.
    pub fn from_wire(up: Option<i64>, down: Option<i64>) -> Self {
        let clamp = |v: Option<i64>| v.map_or(0, |v| u64::try_from(v).unwrap_or(0));
        Self {
            up: clamp(up),
            down: clamp(down),
        }
    }

    /// Apply a delta, saturating at zero.
    pub fn apply(self, delta: VoteDelta) -> Self {
        Self {
            up: self.up.saturating_add_signed(delta.up),
            down: self.down.saturating_add_signed(delta.down),
        }
    }

    /// Net score (`up - down`).
    pub fn score(self) -> i64 {
        i64::try_from(self.up)
            .unwrap_or(i64::MAX)
            .saturating_sub(i64::try_from(self.down).unwrap_or(i64::MAX))
    }
}

/// Authoritative count reading for a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountSnapshot {
    /// Target the reading belongs to.
    pub target: VoteTarget,
    /// Server-computed counts.
    pub counts: VoteCounts,
    /// Monotonic stamp when the source provides one.
    pub version: Option<u64>,
}

impl CountSnapshot {
    /// Unversioned snapshot.
    pub fn new(target: VoteTarget, counts: VoteCounts) -> Self {
        Self {
            target,
            counts,
            version: None,
        }
    }

    /// Attach a monotonic version.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }
}

/// Uniqueness key of a vote row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VoteKey {
    /// Voter.
    pub user: UserId,
    /// Voted-on target.
    pub target: VoteTarget,
}

/// Upsert request keyed on (user, target).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteMutation {
    /// Row key.
    pub key: VoteKey,
    /// Requested direction.
    pub direction: VoteDirection,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_rejects_blank_id() {
        assert!(VoteTarget::post("").is_err());
        assert!(VoteTarget::comment("   ").is_err());
        let target = VoteTarget::post("p1").unwrap();
        assert_eq!(target.kind(), TargetKind::Post);
        assert_eq!(target.to_string(), "post:p1");
    }

    #[test]
    fn test_wire_values() {
        assert_eq!(VoteValue::from_wire(Some(1)).unwrap(), VoteValue::Up);
        assert_eq!(VoteValue::from_wire(Some(-1)).unwrap(), VoteValue::Down);
        assert_eq!(VoteValue::from_wire(None).unwrap(), VoteValue::None);
        assert!(matches!(
            VoteValue::from_wire(Some(2)),
            Err(DecodeError::InvalidVoteValue(2))
        ));
        assert_eq!(VoteValue::None.to_wire(), None);
        assert_eq!(VoteValue::Down.to_wire(), Some(-1));
    }

    #[test]
    fn test_transition_deltas() {
        assert_eq!(
            VoteDelta::transition(VoteValue::None, VoteValue::Up),
            VoteDelta { up: 1, down: 0 }
        );
        assert_eq!(
            VoteDelta::transition(VoteValue::Up, VoteValue::Down),
            VoteDelta { up: -1, down: 1 }
        );
        assert_eq!(
            VoteDelta::transition(VoteValue::Down, VoteValue::None),
            VoteDelta { up: 0, down: -1 }
        );
        assert!(VoteDelta::transition(VoteValue::Up, VoteValue::Up).is_zero());
    }

    #[test]
    fn test_counts_never_negative() {
        let counts = VoteCounts::new(0, 1).apply(VoteDelta { up: -1, down: -3 });
        assert_eq!(counts, VoteCounts::new(0, 0));

        let wire = VoteCounts::from_wire(Some(-4), None);
        assert_eq!(wire, VoteCounts::new(0, 0));
    }

    #[test]
    fn test_score() {
        assert_eq!(VoteCounts::new(5, 2).score(), 3);
        assert_eq!(VoteCounts::new(1, 4).score(), -3);
    }
}
