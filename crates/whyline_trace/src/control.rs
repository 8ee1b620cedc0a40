//! Control dependency tracking.
//!
//! Each frame keeps a stack of the predicates whose regions are currently
//! open. Every event is stamped with a persistent snapshot of its frame's
//! stack so later questions can see which decisions governed it.

use std::collections::HashMap;
use std::sync::Arc;

use im::Vector;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use whyline_foundation::{EventId, FrameId};

use crate::event::SourceSite;

// =============================================================================
// Control Entries
// =============================================================================

/// Identity of a loop across its iterations.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LoopKey {
    /// Loop target for `for` loops, normalized predicate for `while` loops.
    pub label: Arc<str>,
    /// Where the loop header is.
    pub site: Option<SourceSite>,
}

/// What kind of region a control entry governs.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RegionKind {
    /// An `if`/`elif`/`else` body.
    Conditional,
    /// A loop body; the entry is replaced on every iteration.
    Loop(LoopKey),
}

/// One active predicate.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ControlEntry {
    /// The evaluation event that opened the region.
    pub origin: EventId,
    /// Predicate text (or loop target).
    pub predicate: Arc<str>,
    /// What the predicate evaluated to.
    pub truth: bool,
    /// Conditional or loop.
    pub kind: RegionKind,
}

impl ControlEntry {
    /// Returns true if this entry is the given loop.
    #[must_use]
    pub fn is_loop(&self, key: &LoopKey) -> bool {
        matches!(&self.kind, RegionKind::Loop(k) if k == key)
    }
}

/// An immutable copy of a frame's control stack, outermost first.
///
/// Snapshots share structure with the live stack, so stamping every event
/// with one is cheap.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ControlSnapshot(Vector<ControlEntry>);

impl ControlSnapshot {
    /// Number of active predicates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no predicate governs the event.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The innermost active predicate.
    #[must_use]
    pub fn innermost(&self) -> Option<&ControlEntry> {
        self.0.back()
    }

    /// Iterates outermost first.
    pub fn iter(&self) -> impl Iterator<Item = &ControlEntry> {
        self.0.iter()
    }

    /// Origins of the active predicates, outermost first.
    pub fn origins(&self) -> impl Iterator<Item = EventId> + '_ {
        self.0.iter().map(|entry| entry.origin)
    }

    /// Returns true if `origin` is one of the active predicates.
    #[must_use]
    pub fn contains(&self, origin: EventId) -> bool {
        self.0.iter().any(|entry| entry.origin == origin)
    }
}

// =============================================================================
// Evaluations
// =============================================================================

/// A recorded predicate evaluation (CONDITION, BRANCH, or WHILE_CONDITION).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Evaluation {
    /// The evaluation event.
    pub event: EventId,
    /// Frame it happened in.
    pub frame: FrameId,
    /// Normalized predicate text.
    pub predicate: Arc<str>,
    /// What it evaluated to.
    pub truth: bool,
    /// Innermost region open when the predicate was evaluated.
    pub enclosing: Option<EventId>,
}

/// Collapses runs of whitespace and trims, so `x  >  5` and `x > 5` match.
#[must_use]
pub fn normalize_predicate(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// =============================================================================
// Control Tracker
// =============================================================================

#[derive(Default)]
struct FrameControl {
    stack: Vector<ControlEntry>,
    evaluations: Vec<usize>,
}

/// Per-frame control stacks plus an index of predicate evaluations.
#[derive(Default)]
pub struct ControlTracker {
    frames: HashMap<FrameId, FrameControl>,
    evaluations: Vec<Evaluation>,
    by_predicate: HashMap<Arc<str>, Vec<usize>>,
}

impl ControlTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a frame's control stack.
    #[must_use]
    pub fn snapshot(&self, frame: FrameId) -> ControlSnapshot {
        self.frames
            .get(&frame)
            .map(|fc| ControlSnapshot(fc.stack.clone()))
            .unwrap_or_default()
    }

    /// Snapshot for a loop event: excludes the loop's own previous
    /// iteration, so iteration N does not depend on iteration N-1's entry.
    #[must_use]
    pub fn loop_snapshot(&self, frame: FrameId, key: &LoopKey) -> ControlSnapshot {
        let mut stack = self.snapshot(frame).0;
        if stack.back().is_some_and(|top| top.is_loop(key)) {
            stack.pop_back();
        }
        ControlSnapshot(stack)
    }

    /// Depth of a frame's control stack.
    #[must_use]
    pub fn depth(&self, frame: FrameId) -> usize {
        self.frames.get(&frame).map_or(0, |fc| fc.stack.len())
    }

    /// Opens a region.
    pub fn push(&mut self, frame: FrameId, entry: ControlEntry) {
        self.frames.entry(frame).or_default().stack.push_back(entry);
    }

    /// Records a loop iteration: replaces the top entry if it belongs to the
    /// same loop, otherwise opens a new loop region.
    pub fn iterate(&mut self, frame: FrameId, entry: ControlEntry) {
        let stack = &mut self.frames.entry(frame).or_default().stack;
        let same_loop = match (&entry.kind, stack.back()) {
            (RegionKind::Loop(key), Some(top)) => top.is_loop(key),
            _ => false,
        };
        if same_loop {
            stack.pop_back();
        }
        stack.push_back(entry);
    }

    /// Closes the innermost region of a frame.
    pub fn pop(&mut self, frame: FrameId) -> Option<ControlEntry> {
        self.frames.get_mut(&frame)?.stack.pop_back()
    }

    /// Discards a frame's control state once the frame has ended.
    pub fn clear(&mut self, frame: FrameId) {
        if let Some(fc) = self.frames.get_mut(&frame) {
            fc.stack.clear();
        }
    }

    /// Indexes a predicate evaluation.
    pub fn record_evaluation(&mut self, evaluation: Evaluation) {
        let slot = self.evaluations.len();
        self.by_predicate
            .entry(Arc::clone(&evaluation.predicate))
            .or_default()
            .push(slot);
        self.frames
            .entry(evaluation.frame)
            .or_default()
            .evaluations
            .push(slot);
        self.evaluations.push(evaluation);
    }

    /// All evaluations of a predicate, oldest first. The text is normalized
    /// before lookup.
    pub fn evaluations_of(&self, predicate: &str) -> impl Iterator<Item = &Evaluation> {
        let key = normalize_predicate(predicate);
        self.by_predicate
            .get(key.as_str())
            .into_iter()
            .flatten()
            .map(|&slot| &self.evaluations[slot])
    }

    /// All evaluations in a frame, oldest first.
    pub fn evaluations_in(&self, frame: FrameId) -> impl Iterator<Item = &Evaluation> {
        self.frames
            .get(&frame)
            .into_iter()
            .flat_map(|fc| fc.evaluations.iter())
            .map(|&slot| &self.evaluations[slot])
    }

    /// Every evaluation strictly after `event`, oldest first.
    pub fn evaluations_after(&self, event: EventId) -> impl Iterator<Item = &Evaluation> {
        let start = self.evaluations.partition_point(|e| e.event <= event);
        self.evaluations[start..].iter()
    }

    /// The evaluation recorded for an event, if it was one.
    #[must_use]
    pub fn evaluation(&self, event: EventId) -> Option<&Evaluation> {
        // Evaluations are recorded in sequence order.
        self.evaluations
            .binary_search_by_key(&event, |e| e.event)
            .ok()
            .map(|slot| &self.evaluations[slot])
    }

    /// Total number of recorded evaluations.
    #[must_use]
    pub fn evaluation_count(&self) -> usize {
        self.evaluations.len()
    }
}
