//! Arena identifiers for events, frames, and producer threads.
//!
//! Events and frames live in append-only arenas and are addressed by these
//! ids everywhere else; nothing holds a direct reference to another record.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sequence id of an ingested event.
///
/// Assigned by the event store at append time, starting at 1. This is the
/// only definition of "before" and "after" in a trace.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventId(pub u64);

impl EventId {
    /// The first id the store hands out.
    pub const FIRST: Self = Self(1);

    /// Returns the raw sequence number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the id immediately after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the zero-based arena slot for this id.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn index(self) -> usize {
        self.0.saturating_sub(1) as usize
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a call activation.
///
/// `FrameId::ROOT` is the top-level module frame every trace starts in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrameId(pub u32);

impl FrameId {
    /// The module-level frame.
    pub const ROOT: Self = Self(0);

    /// Returns true if this is the module-level frame.
    #[must_use]
    pub const fn is_root(self) -> bool {
        self.0 == 0
    }

    /// Returns the arena slot for this frame.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "frame(root)")
        } else {
            write!(f, "frame({})", self.0)
        }
    }
}

/// Identifier of a producer thread in the traced program.
///
/// Threads only matter for call-stack reconstruction: each has its own stack
/// of open frames, while all events share one global sequence.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ThreadId(pub u64);

impl ThreadId {
    /// The main thread.
    pub const MAIN: Self = Self(0);
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread({})", self.0)
    }
}
