use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a connected player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tile on the world grid: planar `x`/`y` plus the floor level `z`.
///
/// Ordering is lexicographic on `(x, y, z)` so positions can key a `BTreeMap`
/// as well as a `HashMap`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub z: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Whether `other` lies within `radius` tiles on both planar axes.
    ///
    /// The floor level is ignored here; callers that care compare it with
    /// [`Position::same_floor`].
    pub fn within_distance(&self, other: &Position, radius: i32) -> bool {
        let radius = i64::from(radius);
        let dx = i64::from(other.x) - i64::from(self.x);
        let dy = i64::from(other.y) - i64::from(self.y);
        dx.abs() <= radius && dy.abs() <= radius
    }

    /// Exact floor comparison.
    pub fn same_floor(&self, other: &Position) -> bool {
        self.z == other.z
    }

    /// Largest per-axis planar delta to `other`.
    pub fn planar_distance(&self, other: &Position) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}
