//! The event store.
//!
//! An append-only log of [`TraceRecord`]s addressed by [`EventId`], with
//! secondary indexes by event type, source line, and function name.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use whyline_foundation::{Error, EventId, FrameId, Result};

use crate::control::ControlSnapshot;
use crate::event::{EventOrigin, EventType, TraceEvent, TraceRecord};

/// Append-only, densely numbered event log.
#[derive(Default)]
pub struct EventStore {
    records: Vec<TraceRecord>,
    by_type: HashMap<EventType, Vec<EventId>>,
    by_line: HashMap<(Arc<str>, u32), Vec<EventId>>,
    by_function: HashMap<Arc<str>, Vec<EventId>>,
}

impl EventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with room for `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// The id the next appended event will receive.
    #[must_use]
    pub fn next_id(&self) -> EventId {
        EventId(self.records.len() as u64 + 1)
    }

    /// Appends an event and returns its sequence id.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEvent` if a required field is absent or empty. No id
    /// is consumed.
    pub fn append(
        &mut self,
        event: TraceEvent,
        origin: EventOrigin,
        frame: FrameId,
        control: ControlSnapshot,
    ) -> Result<EventId> {
        event.validate()?;
        let id = self.next_id();
        self.by_type.entry(event.event_type()).or_default().push(id);
        if let Some(site) = &origin.site {
            self.by_line
                .entry((Arc::clone(&site.filename), site.lineno))
                .or_default()
                .push(id);
        }
        if let Some(function) = event.function() {
            self.by_function
                .entry(Arc::clone(function))
                .or_default()
                .push(id);
        }
        self.records.push(TraceRecord {
            id,
            frame,
            origin,
            event,
            control,
        });
        Ok(id)
    }

    /// Looks up an event.
    #[must_use]
    pub fn get(&self, id: EventId) -> Option<&TraceRecord> {
        if id.get() == 0 {
            return None;
        }
        self.records.get(id.index())
    }

    /// Looks up an event that must exist.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEvent` if `id` was never assigned.
    pub fn require(&self, id: EventId) -> Result<&TraceRecord> {
        self.get(id).ok_or_else(|| Error::unknown_event(id))
    }

    /// Events with ids in `from..=to`, clamped to what exists.
    #[must_use]
    pub fn range(&self, from: EventId, to: EventId) -> &[TraceRecord] {
        let start = from.index().min(self.records.len());
        let end = usize::try_from(to.get())
            .unwrap_or(usize::MAX)
            .min(self.records.len());
        if start >= end {
            return &[];
        }
        &self.records[start..end]
    }

    /// Events of one type, oldest first.
    pub fn by_type(&self, event_type: EventType) -> impl Iterator<Item = &TraceRecord> {
        self.lookup(self.by_type.get(&event_type))
    }

    /// Events reported at a source line, oldest first.
    pub fn at_line(&self, filename: &str, lineno: u32) -> impl Iterator<Item = &TraceRecord> {
        self.lookup(self.by_line.get(&(Arc::from(filename), lineno)))
    }

    /// FUNCTION_ENTRY and CALL events of `function`, oldest first.
    pub fn function_calls(&self, function: &str) -> impl Iterator<Item = &TraceRecord> {
        self.lookup(self.by_function.get(function))
            .filter(|r| matches!(r.event_type(), EventType::FunctionEntry | EventType::Call))
    }

    fn lookup<'a>(&'a self, ids: Option<&'a Vec<EventId>>) -> impl Iterator<Item = &'a TraceRecord> {
        ids.into_iter()
            .flatten()
            .filter_map(|id| self.records.get(id.index()))
    }

    /// Iterates over every event in sequence order.
    pub fn iter(&self) -> impl Iterator<Item = &TraceRecord> {
        self.records.iter()
    }

    /// Number of stored events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The most recently stored id.
    #[must_use]
    pub fn last_id(&self) -> Option<EventId> {
        self.records.last().map(|r| r.id)
    }

    /// Totals per event type and distinct source files.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let by_type = self
            .by_type
            .iter()
            .map(|(t, ids)| (*t, ids.len()))
            .collect();
        let files: BTreeSet<&str> = self.by_line.keys().map(|(f, _)| &**f).collect();
        StoreStats {
            total_events: self.records.len(),
            by_type,
            files: files.len(),
        }
    }
}

/// Summary counts for an [`EventStore`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of stored events.
    pub total_events: usize,
    /// Events per type.
    pub by_type: BTreeMap<EventType, usize>,
    /// Distinct source files seen.
    pub files: usize,
}

impl StoreStats {
    /// Number of events of one type.
    #[must_use]
    pub fn count(&self, event_type: EventType) -> usize {
        self.by_type.get(&event_type).copied().unwrap_or(0)
    }
}
