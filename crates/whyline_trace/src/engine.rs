//! The trace engine.
//!
//! [`TraceEngine`] owns the store and every incremental index. Each call to
//! [`TraceEngine::ingest`] sequences one event, places it in a frame, stamps
//! its control snapshot, updates the history and call-stack state, and
//! synthesizes its dependency edges. Nothing is recomputed globally.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use whyline_foundation::{Error, EventId, FrameId, Result};

use crate::control::{
    normalize_predicate, ControlEntry, ControlSnapshot, ControlTracker, Evaluation, LoopKey,
    RegionKind,
};
use crate::event::{EventOrigin, Location, Read, TraceEvent, TraceRecord};
use crate::frames::{CallStack, Frame};
use crate::graph::{DependencyEdge, DependencyGraph, EdgeKind};
use crate::history::VariableHistory;
use crate::raw::RawEvent;
use crate::store::{EventStore, StoreStats};

// =============================================================================
// Ingest Receipt
// =============================================================================

/// What happened to an ingested event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ingested {
    /// Assigned sequence id.
    pub id: EventId,
    /// Frame the event was placed in.
    pub frame: FrameId,
    /// Number of dependency edges added for it.
    pub edges_added: usize,
    /// True if it was a RETURN with no matching open frame.
    pub unbalanced: bool,
}

// =============================================================================
// Edge Planning
// =============================================================================

/// Edges for one event, gathered before any state changes so that reads
/// resolve against the state strictly before the event.
struct EdgePlan {
    id: EventId,
    data: Vec<(EventId, EdgeKind)>,
    control: Vec<(EventId, EdgeKind)>,
    linkage: Vec<(EventId, EdgeKind)>,
    unresolved: Vec<Read>,
}

impl EdgePlan {
    fn new(id: EventId) -> Self {
        Self {
            id,
            data: Vec::new(),
            control: Vec::new(),
            linkage: Vec::new(),
            unresolved: Vec::new(),
        }
    }

    fn push(&mut self, to: EventId, kind: EdgeKind) {
        match kind {
            EdgeKind::Data => self.data.push((to, kind)),
            EdgeKind::Control => self.control.push((to, kind)),
            EdgeKind::CallArg | EdgeKind::ReturnValue => self.linkage.push((to, kind)),
        }
    }

    fn edges(&self) -> impl Iterator<Item = DependencyEdge> + '_ {
        self.data
            .iter()
            .chain(&self.control)
            .chain(&self.linkage)
            .map(|&(to, kind)| DependencyEdge {
                from: self.id,
                to,
                kind,
            })
    }
}

// =============================================================================
// Trace Engine
// =============================================================================

/// The event store plus every index derived from it.
#[derive(Default)]
pub struct TraceEngine {
    store: EventStore,
    history: VariableHistory,
    calls: CallStack,
    control: ControlTracker,
    graph: DependencyGraph,
}

impl std::fmt::Debug for TraceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceEngine").finish_non_exhaustive()
    }
}

impl TraceEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty engine expecting about `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            store: EventStore::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Builds an engine by ingesting events in order.
    ///
    /// Non-causal edges are tolerated (the events stay flagged
    /// inconsistent); any other error stops the replay.
    ///
    /// # Errors
    ///
    /// Returns the first `InvalidEvent`, annotated with its position.
    pub fn replay<I>(events: I) -> Result<Self>
    where
        I: IntoIterator<Item = (TraceEvent, EventOrigin)>,
    {
        let events = events.into_iter();
        let mut engine = Self::with_capacity(events.size_hint().0);
        for (position, (event, origin)) in events.enumerate() {
            if let Err(err) = engine.ingest_from(event, origin) {
                if err.is_rejection() {
                    let context = err.context.clone().unwrap_or_default().with_record(position);
                    return Err(err.with_context(context));
                }
            }
        }
        Ok(engine)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The event store.
    #[must_use]
    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// The variable history index.
    #[must_use]
    pub fn history(&self) -> &VariableHistory {
        &self.history
    }

    /// The reconstructed call stack.
    #[must_use]
    pub fn calls(&self) -> &CallStack {
        &self.calls
    }

    /// Control stacks and predicate evaluations.
    #[must_use]
    pub fn control(&self) -> &ControlTracker {
        &self.control
    }

    /// The dependency graph.
    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Looks up a stored event.
    #[must_use]
    pub fn record(&self, id: EventId) -> Option<&TraceRecord> {
        self.store.get(id)
    }

    /// Looks up a frame.
    #[must_use]
    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.calls.get(id)
    }

    /// Number of stored events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns true if nothing has been ingested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// The accepted event log, in order, as it would be replayed.
    pub fn log(&self) -> impl Iterator<Item = (&TraceEvent, &EventOrigin)> {
        self.store.iter().map(|r| (&r.event, &r.origin))
    }

    /// Summary counts.
    #[must_use]
    pub fn stats(&self) -> TraceStats {
        TraceStats {
            store: self.store.stats(),
            frames: self.calls.len(),
            open_frames: self.calls.open_count(),
            edges: self.graph.edge_count(),
            inconsistent_events: self.graph.inconsistent_events().count(),
            evaluations: self.control.evaluation_count(),
        }
    }

    // =========================================================================
    // Ingestion
    // =========================================================================

    /// Ingests an event from the main thread with no source site.
    ///
    /// # Errors
    ///
    /// See [`TraceEngine::ingest_from`].
    pub fn ingest(&mut self, event: TraceEvent) -> Result<Ingested> {
        self.ingest_from(event, EventOrigin::default())
    }

    /// Converts and ingests an untyped producer record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEvent` if the record cannot be converted, otherwise
    /// as [`TraceEngine::ingest_from`].
    pub fn ingest_raw(&mut self, raw: RawEvent, origin: EventOrigin) -> Result<Ingested> {
        let event = raw.into_event()?;
        self.ingest_from(event, origin)
    }

    /// Ingests one event.
    ///
    /// # Errors
    ///
    /// - `InvalidEvent` if the event is malformed or exits a region when
    ///   none is open. Nothing is stored and no id is consumed.
    /// - `NonCausalEdge` if a synthesized dependency points at the event
    ///   itself or forward. The event *is* stored and flagged inconsistent;
    ///   its other edges are kept.
    pub fn ingest_from(&mut self, event: TraceEvent, origin: EventOrigin) -> Result<Ingested> {
        if let Err(err) = self.validate(&event, &origin) {
            warn!(event_type = %event.event_type(), error = %err, "rejected event");
            return Err(err);
        }

        let id = self.store.next_id();
        let thread = origin.thread;
        let current = self.calls.current(thread);
        let pending = self.calls.take_pending(thread);
        let mut plan = EdgePlan::new(id);
        let mut unbalanced = false;

        // Decide the frame and snapshot, and resolve reads, against the
        // state strictly before this event.
        let (frame, control) = match &event {
            TraceEvent::FunctionEntry { function, args } => {
                let call_site = pending
                    .filter(|p| p.frame == current && p.function == *function)
                    .map(|p| p.event);
                let call_args = call_site
                    .and_then(|call| self.store.get(call))
                    .map_or(&[][..], |r| r.event.arguments());
                for (position, arg) in args.iter().enumerate() {
                    let source = arg
                        .source
                        .as_ref()
                        .or_else(|| call_args.get(position).and_then(|a| a.source.as_ref()));
                    if let Some(read) = source {
                        self.plan_read(&mut plan, read, current, EdgeKind::CallArg);
                    }
                }
                let control = self.control.snapshot(current);
                let frame = self
                    .calls
                    .enter(Arc::clone(function), thread, id, call_site);
                debug!(%frame, %function, entry = %id, linked = call_site.is_some(), "frame opened");
                (frame, control)
            }
            TraceEvent::Return { function, reads, .. } => {
                match self.calls.find_returning(thread, function.as_deref()) {
                    Some(closing) => {
                        for read in reads {
                            self.plan_read(&mut plan, read, closing, EdgeKind::ReturnValue);
                        }
                        (closing, self.control.snapshot(closing))
                    }
                    None => {
                        unbalanced = true;
                        for read in reads {
                            self.plan_read(&mut plan, read, current, EdgeKind::ReturnValue);
                        }
                        (current, self.control.snapshot(current))
                    }
                }
            }
            TraceEvent::LoopIteration { target, reads, .. } => {
                let key = loop_key(target, &origin);
                self.plan_reads(&mut plan, reads, current);
                (current, self.control.loop_snapshot(current, &key))
            }
            TraceEvent::WhileCondition { predicate, reads, .. } => {
                let key = loop_key(&normalize_predicate(predicate), &origin);
                self.plan_reads(&mut plan, reads, current);
                (current, self.control.loop_snapshot(current, &key))
            }
            TraceEvent::AugAssign { target, reads, .. } => {
                let implicit = Read::At(target.clone());
                self.plan_read(&mut plan, &implicit, current, EdgeKind::Data);
                self.plan_reads(&mut plan, reads, current);
                (current, self.control.snapshot(current))
            }
            other => {
                self.plan_reads(&mut plan, other.reads(), current);
                (current, self.control.snapshot(current))
            }
        };
        for origin_event in control.origins() {
            plan.push(origin_event, EdgeKind::Control);
        }

        self.apply(&event, &origin, id, frame, current, &control, unbalanced);

        let stored = self.store.append(event, origin, frame, control)?;
        debug_assert_eq!(stored, id);
        self.graph.add_node(id);

        let mut edges_added = 0;
        let mut violation = None;
        for edge in plan.edges() {
            match self.graph.add_edge(edge) {
                Ok(true) => edges_added += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(from = %edge.from, to = %edge.to, kind = %edge.kind, "non-causal edge");
                    self.graph.mark_inconsistent(id);
                    violation.get_or_insert(err);
                }
            }
        }
        for read in plan.unresolved {
            trace!(event = %id, %read, "unresolved read");
            self.graph.record_unresolved(id, read);
        }

        if let Some(err) = violation {
            return Err(err);
        }
        Ok(Ingested {
            id,
            frame,
            edges_added,
            unbalanced,
        })
    }

    fn validate(&self, event: &TraceEvent, origin: &EventOrigin) -> Result<()> {
        event.validate()?;
        if matches!(event, TraceEvent::RegionExit) {
            let frame = self.calls.current(origin.thread);
            if self.control.depth(frame) == 0 {
                return Err(Error::invalid_event(
                    event.event_type().as_str(),
                    format!("no open region in {frame}"),
                ));
            }
        }
        Ok(())
    }

    fn plan_reads(&self, plan: &mut EdgePlan, reads: &[Read], frame: FrameId) {
        for read in reads {
            self.plan_read(plan, read, frame, EdgeKind::Data);
        }
    }

    fn plan_read(&self, plan: &mut EdgePlan, read: &Read, frame: FrameId, kind: EdgeKind) {
        let producer = match read {
            Read::At(location) => self.history.resolve(location, frame, plan.id, &self.calls),
            Read::CallResult(function) => self.calls.latest_result(frame, function),
            Read::Event(event) => Some(*event),
        };
        match producer {
            Some(to) => plan.push(to, kind),
            None => plan.unresolved.push(read.clone()),
        }
    }

    /// Updates history, call stack, and control state for an event whose
    /// edges have already been planned.
    #[allow(clippy::too_many_arguments)]
    fn apply(
        &mut self,
        event: &TraceEvent,
        origin: &EventOrigin,
        id: EventId,
        frame: FrameId,
        current: FrameId,
        control: &ControlSnapshot,
        unbalanced: bool,
    ) {
        let enclosing = control.innermost().map(|entry| entry.origin);
        match event {
            TraceEvent::Assign { target, .. }
            | TraceEvent::AugAssign {
                target: Location::Variable(target),
                ..
            } => {
                self.history
                    .record_write(Location::Variable(Arc::clone(target)), current, id);
            }
            TraceEvent::AttrAssign { .. }
            | TraceEvent::SubscriptAssign { .. }
            | TraceEvent::SliceAssign { .. }
            | TraceEvent::AugAssign { .. } => {
                if let Some(location) = event.written_location() {
                    self.record_mutation(location, current, id);
                }
            }
            TraceEvent::FunctionEntry { args, .. } => {
                for arg in args {
                    self.history
                        .record_write(Location::Variable(Arc::clone(&arg.name)), frame, id);
                }
            }
            TraceEvent::Return { .. } => {
                if unbalanced {
                    warn!(event = %id, %frame, "return with no matching open frame");
                    self.calls.mark_unbalanced(frame, id);
                } else {
                    let abandoned = self.calls.close(origin.thread, frame, id);
                    for lost in &abandoned {
                        debug!(frame = %lost, by = %id, "frame abandoned");
                        self.control.clear(*lost);
                    }
                    self.control.clear(frame);
                    debug!(%frame, ret = %id, "frame closed");
                }
            }
            TraceEvent::Call { function, .. } => {
                self.calls
                    .record_call(origin.thread, current, Arc::clone(function), id);
            }
            TraceEvent::Condition {
                predicate, truth, ..
            } => {
                self.record_evaluation(id, current, predicate, *truth, enclosing);
                self.control.push(
                    current,
                    ControlEntry {
                        origin: id,
                        predicate: Arc::clone(predicate),
                        truth: *truth,
                        kind: RegionKind::Conditional,
                    },
                );
            }
            TraceEvent::Branch {
                predicate,
                truth,
                decision,
                ..
            } => {
                self.record_evaluation(id, current, predicate, *truth, enclosing);
                if decision.opens_region() {
                    self.control.push(
                        current,
                        ControlEntry {
                            origin: id,
                            predicate: Arc::clone(predicate),
                            truth: *truth,
                            kind: RegionKind::Conditional,
                        },
                    );
                }
            }
            TraceEvent::LoopIteration { target, .. } => {
                self.history
                    .record_write(Location::Variable(Arc::clone(target)), current, id);
                self.control.iterate(
                    current,
                    ControlEntry {
                        origin: id,
                        predicate: Arc::clone(target),
                        truth: true,
                        kind: RegionKind::Loop(loop_key(target, origin)),
                    },
                );
            }
            TraceEvent::WhileCondition {
                predicate, truth, ..
            } => {
                self.record_evaluation(id, current, predicate, *truth, enclosing);
                let key = loop_key(&normalize_predicate(predicate), origin);
                self.control.iterate(
                    current,
                    ControlEntry {
                        origin: id,
                        predicate: Arc::clone(predicate),
                        truth: *truth,
                        kind: RegionKind::Loop(key),
                    },
                );
            }
            TraceEvent::RegionExit => {
                self.control.pop(current);
            }
        }
    }

    /// Records a write through `obj.attr`, `seq[i]`, or a slice. The write
    /// lands in the frame owning the root binding, and also counts as a
    /// write of the root variable.
    fn record_mutation(&mut self, location: Location, current: FrameId, id: EventId) {
        let root = location
            .root_variable()
            .unwrap_or_else(|| location.clone());
        let owner = self
            .history
            .binding_frame(&root, current, id, &self.calls)
            .unwrap_or(current);
        if !location.is_variable() {
            self.history.record_write(location, owner, id);
        }
        self.history.record_write(root, owner, id);
    }

    fn record_evaluation(
        &mut self,
        id: EventId,
        frame: FrameId,
        predicate: &str,
        truth: bool,
        enclosing: Option<EventId>,
    ) {
        self.control.record_evaluation(Evaluation {
            event: id,
            frame,
            predicate: Arc::from(normalize_predicate(predicate)),
            truth,
            enclosing,
        });
    }
}

fn loop_key(label: &str, origin: &EventOrigin) -> LoopKey {
    LoopKey {
        label: Arc::from(label),
        site: origin.site.clone(),
    }
}

/// Summary counts for a [`TraceEngine`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TraceStats {
    /// Store totals.
    pub store: StoreStats,
    /// Frames created, including the root.
    pub frames: usize,
    /// Frames still open.
    pub open_frames: usize,
    /// Dependency edges.
    pub edges: usize,
    /// Events flagged inconsistent.
    pub inconsistent_events: usize,
    /// Recorded predicate evaluations.
    pub evaluations: usize,
}
