//! Variable history index.
//!
//! Maps `(location, frame)` to the ordered list of events that wrote it, so
//! a read at time `t` resolves to the latest write strictly before `t`.
//! Writes to `obj.attr` and `seq[i]` also count as writes to `obj` and `seq`.

use std::collections::HashMap;

use whyline_foundation::{EventId, FrameId};

use crate::event::Location;
use crate::frames::CallStack;

#[derive(Default)]
struct LocationHistory {
    per_frame: HashMap<FrameId, Vec<EventId>>,
    all: Vec<EventId>,
}

/// Write history for every location, per frame.
#[derive(Default)]
pub struct VariableHistory {
    locations: HashMap<Location, LocationHistory>,
    write_count: usize,
}

impl VariableHistory {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `event` wrote `location` in `frame`. Ids must arrive in
    /// increasing order per key.
    pub fn record_write(&mut self, location: Location, frame: FrameId, event: EventId) {
        let history = self.locations.entry(location).or_default();
        let writes = history.per_frame.entry(frame).or_default();
        debug_assert!(writes.last().is_none_or(|last| *last < event));
        writes.push(event);
        history.all.push(event);
        self.write_count += 1;
    }

    /// The latest write of `location` in exactly `frame`, strictly before
    /// `before`.
    #[must_use]
    pub fn latest_before(&self, location: &Location, frame: FrameId, before: EventId) -> Option<EventId> {
        let writes = self.locations.get(location)?.per_frame.get(&frame)?;
        let n = writes.partition_point(|id| *id < before);
        n.checked_sub(1).map(|i| writes[i])
    }

    /// Resolves a read of `location` made in `frame` at `before`.
    ///
    /// Walks the frame and then its callers. In each frame the candidate is
    /// the later of the location's own write and, for attributes and
    /// elements, a write of the root variable (rebinding the container
    /// supersedes earlier element writes). The first frame with any
    /// candidate wins, so a local binding shadows an outer one.
    #[must_use]
    pub fn resolve(
        &self,
        location: &Location,
        frame: FrameId,
        before: EventId,
        calls: &CallStack,
    ) -> Option<EventId> {
        let root = location.root_variable();
        calls.lineage(frame).find_map(|f| {
            let own = self.latest_before(location, f, before);
            let via_root = root
                .as_ref()
                .and_then(|r| self.latest_before(r, f, before));
            own.max(via_root)
        })
    }

    /// The frame whose binding of `variable` is visible from `frame` at
    /// `before`, if any frame in the lineage has written it.
    #[must_use]
    pub fn binding_frame(
        &self,
        variable: &Location,
        frame: FrameId,
        before: EventId,
        calls: &CallStack,
    ) -> Option<FrameId> {
        calls
            .lineage(frame)
            .find(|f| self.latest_before(variable, *f, before).is_some())
    }

    /// Every write to `location`, in any frame, oldest first.
    #[must_use]
    pub fn writes_to(&self, location: &Location) -> &[EventId] {
        self.locations
            .get(location)
            .map_or(&[], |h| h.all.as_slice())
    }

    /// Every write to `location` in `frame`, oldest first.
    #[must_use]
    pub fn writes_in(&self, location: &Location, frame: FrameId) -> &[EventId] {
        self.locations
            .get(location)
            .and_then(|h| h.per_frame.get(&frame))
            .map_or(&[], Vec::as_slice)
    }

    /// Number of distinct locations ever written.
    #[must_use]
    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    /// Total number of recorded writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.write_count
    }
}
