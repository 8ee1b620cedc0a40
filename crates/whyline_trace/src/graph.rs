//! The dependency graph.
//!
//! Nodes are events; an edge `from -> to` means `from` depends on `to`.
//! Every edge must point strictly backward in time. Edges that would not
//! are refused and their source event is flagged inconsistent.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use whyline_foundation::{Error, EventId, Result};

use crate::event::Read;

/// Why one event depends on another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EdgeKind {
    /// The dependent event read a value the other event produced.
    Data,
    /// The dependent event ran because of the other event's predicate.
    Control,
    /// A parameter binding depends on a caller-side argument source.
    CallArg,
    /// A RETURN depends on a value produced inside the returning frame.
    ReturnValue,
}

impl EdgeKind {
    /// Lowercase name used in messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Control => "control",
            Self::CallArg => "call_arg",
            Self::ReturnValue => "return_value",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One dependency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DependencyEdge {
    /// The dependent event.
    pub from: EventId,
    /// The event depended on.
    pub to: EventId,
    /// Why.
    pub kind: EdgeKind,
}

/// Append-only adjacency lists indexed by event id.
#[derive(Default)]
pub struct DependencyGraph {
    outgoing: Vec<Vec<DependencyEdge>>,
    edge_count: usize,
    inconsistent: BTreeSet<EventId>,
    unresolved: HashMap<EventId, Vec<Read>>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes room for `id`. Nodes are added in sequence order.
    pub fn add_node(&mut self, id: EventId) {
        while self.outgoing.len() <= id.index() {
            self.outgoing.push(Vec::new());
        }
    }

    /// Adds an edge, enforcing `to < from`.
    ///
    /// Returns `Ok(false)` if an identical edge already exists.
    ///
    /// # Errors
    ///
    /// Returns `NonCausalEdge` if the edge points at its source or forward.
    /// The edge is not added.
    pub fn add_edge(&mut self, edge: DependencyEdge) -> Result<bool> {
        if edge.to >= edge.from {
            return Err(Error::non_causal_edge(edge.from, edge.to, edge.kind.as_str()));
        }
        self.add_node(edge.from);
        let slot = &mut self.outgoing[edge.from.index()];
        if slot.contains(&edge) {
            return Ok(false);
        }
        slot.push(edge);
        self.edge_count += 1;
        Ok(true)
    }

    /// Dependencies of `id`, in the order they were synthesized.
    #[must_use]
    pub fn edges_from(&self, id: EventId) -> &[DependencyEdge] {
        self.outgoing.get(id.index()).map_or(&[], Vec::as_slice)
    }

    /// Every edge in the graph, by source event.
    pub fn edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.outgoing.iter().flatten()
    }

    /// Total number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Flags an event whose synthesized dependencies were refused.
    pub fn mark_inconsistent(&mut self, id: EventId) {
        self.inconsistent.insert(id);
    }

    /// Returns true if the event was flagged inconsistent.
    #[must_use]
    pub fn is_inconsistent(&self, id: EventId) -> bool {
        self.inconsistent.contains(&id)
    }

    /// All inconsistent events, ascending.
    pub fn inconsistent_events(&self) -> impl Iterator<Item = EventId> + '_ {
        self.inconsistent.iter().copied()
    }

    /// Records a read of `id` that no earlier write satisfied.
    pub fn record_unresolved(&mut self, id: EventId, read: Read) {
        self.unresolved.entry(id).or_default().push(read);
    }

    /// Reads of `id` that could not be resolved.
    #[must_use]
    pub fn unresolved(&self, id: EventId) -> &[Read] {
        self.unresolved.get(&id).map_or(&[], Vec::as_slice)
    }
}
