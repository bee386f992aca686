//! Logical clock for captured facts
//!
//! Every object, call, call completion and side effect captured during one
//! execution gets a timestamp from the execution's own [`Timeline`]. The
//! numbers carry no wall-clock meaning; they only arrange facts in the order
//! they were observed.
//!
//! ## Usage
//!
//! ```
//! use testscope_core::timeline::{Timeline, Timestamp};
//!
//! let mut timeline = Timeline::new();
//! let first = timeline.next_timestamp();
//! let second = timeline.next_timestamp();
//! assert!(first.is_before(second));
//! assert_eq!(timeline.last(), second);
//! ```

use serde::{Deserialize, Serialize};

/// Position of a captured fact on an execution's timeline
///
/// ## Invariants
///
/// - Timestamps handed out by one [`Timeline`] are strictly increasing
/// - `Timestamp::ORIGIN` is never handed out; it marks "nothing captured yet"
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Timestamp preceding every captured fact
    pub const ORIGIN: Timestamp = Timestamp(0);

    /// Create a timestamp from its raw tick count
    #[inline]
    pub const fn from_raw(ticks: u64) -> Self {
        Timestamp(ticks)
    }

    /// Raw tick count
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Check if this timestamp is before another
    #[inline]
    pub fn is_before(&self, other: Timestamp) -> bool {
        self.0 < other.0
    }

    /// Check if this timestamp is after another
    #[inline]
    pub fn is_after(&self, other: Timestamp) -> bool {
        self.0 > other.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Monotonic counter owned by one execution context
#[derive(Debug, Default, Clone)]
pub struct Timeline {
    last: u64,
}

impl Timeline {
    /// Create a timeline with nothing on it
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by one tick and return the new position
    pub fn next_timestamp(&mut self) -> Timestamp {
        self.last += 1;
        Timestamp(self.last)
    }

    /// Most recently handed out timestamp (`ORIGIN` if none)
    pub fn last(&self) -> Timestamp {
        Timestamp(self.last)
    }
}
