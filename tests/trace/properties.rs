//! Property tests over randomly generated, well-formed traces.

use std::collections::HashMap;

use proptest::prelude::*;
use whyline_foundation::{ErrorKind, EventId, ThreadId, Value};
use whyline_trace::{Argument, EventOrigin, Location, Read, TraceEngine, TraceEvent};

const NAMES: [&str; 4] = ["a", "b", "c", "d"];
const THREADS: u64 = 3;

#[derive(Clone, Debug)]
enum Step {
    Assign(usize, Vec<usize>),
    AugAssign(usize, usize),
    AttrAssign(usize, usize),
    SubscriptAssign(usize, i64, usize),
    Condition(usize, bool),
    ForLoop(usize, u8),
    WhileLoop(usize, u8),
    Exit,
    Call(usize, bool),
    Enter(usize),
    Return(usize),
}

fn step() -> impl Strategy<Value = Step> {
    let name = || 0usize..NAMES.len();
    prop_oneof![
        4 => (name(), prop::collection::vec(name(), 0..3))
            .prop_map(|(t, r)| Step::Assign(t, r)),
        1 => (name(), name()).prop_map(|(t, r)| Step::AugAssign(t, r)),
        1 => (name(), name()).prop_map(|(o, r)| Step::AttrAssign(o, r)),
        1 => (name(), 0i64..3, name()).prop_map(|(c, i, r)| Step::SubscriptAssign(c, i, r)),
        2 => (name(), any::<bool>()).prop_map(|(v, b)| Step::Condition(v, b)),
        1 => (name(), 1u8..4).prop_map(|(v, n)| Step::ForLoop(v, n)),
        1 => (name(), 1u8..4).prop_map(|(v, n)| Step::WhileLoop(v, n)),
        3 => Just(Step::Exit),
        1 => (name(), any::<bool>()).prop_map(|(a, linked)| Step::Call(a, linked)),
        1 => name().prop_map(Step::Enter),
        1 => name().prop_map(Step::Return),
    ]
}

fn threaded_steps() -> impl Strategy<Value = Vec<(u64, Step)>> {
    prop::collection::vec((0..THREADS, step()), 0..100)
}

/// Region stack of one frame; loops remember their label so a repeated
/// iteration of the innermost loop replaces it instead of nesting.
type Regions = Vec<Option<String>>;

/// Mirrors the engine's frame and region bookkeeping closely enough to
/// emit only events it will accept.
#[derive(Default)]
struct Shape {
    root: Regions,
    threads: HashMap<u64, Vec<Regions>>,
}

impl Shape {
    fn depth(&self, thread: u64) -> usize {
        self.threads.get(&thread).map_or(0, Vec::len)
    }

    fn regions(&mut self, thread: u64) -> &mut Regions {
        match self.threads.get_mut(&thread).and_then(|frames| frames.last_mut()) {
            Some(regions) => regions,
            None => &mut self.root,
        }
    }

    fn iterate(&mut self, thread: u64, label: String) {
        let regions = self.regions(thread);
        if regions.last() != Some(&Some(label.clone())) {
            regions.push(Some(label));
        }
    }
}

/// Turns arbitrary steps into a stream the engine accepts: exits only
/// while a region is open in the current frame, returns only while the
/// thread has a frame open, and a linked call is followed directly by its
/// entry on the same thread.
fn well_formed(steps: &[(u64, Step)]) -> Vec<(TraceEvent, EventOrigin)> {
    let mut shape = Shape::default();
    let mut events = Vec::new();
    for (thread, step) in steps {
        let thread = *thread;
        let origin = EventOrigin::default().on_thread(ThreadId(thread));
        let mut emit = |event: TraceEvent| events.push((event, origin.clone()));
        let depth = shape.depth(thread);
        match step {
            Step::Assign(target, reads) => emit(TraceEvent::assign(
                NAMES[*target],
                0,
                reads.iter().map(|r| Read::var(NAMES[*r])).collect::<Vec<_>>(),
            )),
            Step::AugAssign(target, read) => emit(TraceEvent::aug_assign(
                Location::var(NAMES[*target]),
                "+=",
                1,
                [Read::var(NAMES[*read])],
            )),
            Step::AttrAssign(object, read) => emit(TraceEvent::attr_assign(
                NAMES[*object],
                "x",
                1,
                [Read::var(NAMES[*read])],
            )),
            Step::SubscriptAssign(container, index, read) => {
                emit(TraceEvent::subscript_assign(
                    NAMES[*container],
                    *index,
                    1,
                    [Read::element(NAMES[*container], *index), Read::var(NAMES[*read])],
                ));
            }
            Step::Condition(var, truth) => {
                emit(TraceEvent::condition(
                    format!("{} > 0", NAMES[*var]),
                    *truth,
                    [Read::var(NAMES[*var])],
                ));
                shape.regions(thread).push(None);
            }
            Step::ForLoop(var, iterations) => {
                for i in 0..*iterations {
                    emit(TraceEvent::loop_iteration(
                        NAMES[*var],
                        i64::from(i),
                        [Read::var("items")],
                    ));
                }
                shape.iterate(thread, NAMES[*var].to_string());
            }
            Step::WhileLoop(var, iterations) => {
                let predicate = format!("{} < 3", NAMES[*var]);
                for i in 0..*iterations {
                    emit(TraceEvent::while_condition(
                        predicate.as_str(),
                        i + 1 < *iterations,
                        [Read::var(NAMES[*var])],
                    ));
                }
                shape.iterate(thread, predicate);
            }
            Step::Exit => {
                if shape.regions(thread).pop().is_some() {
                    emit(TraceEvent::RegionExit);
                }
            }
            Step::Call(arg, linked) => {
                let function = format!("f{depth}");
                emit(TraceEvent::call(
                    function.as_str(),
                    [Argument::new("v", 1).from_read(Read::var(NAMES[*arg]))],
                ));
                if *linked {
                    emit(TraceEvent::function_entry(function, [Argument::new(NAMES[*arg], 1)]));
                    shape.threads.entry(thread).or_default().push(Regions::new());
                }
            }
            Step::Enter(arg) => {
                emit(TraceEvent::function_entry(
                    format!("f{depth}"),
                    [Argument::new(NAMES[*arg], 1)],
                ));
                shape.threads.entry(thread).or_default().push(Regions::new());
            }
            Step::Return(var) => {
                if depth > 0 {
                    emit(TraceEvent::return_from(
                        format!("f{}", depth - 1),
                        Value::None,
                        [Read::var(NAMES[*var])],
                    ));
                    if let Some(frames) = shape.threads.get_mut(&thread) {
                        frames.pop();
                    }
                }
            }
        }
    }
    events
}

proptest! {
    #[test]
    fn well_formed_streams_are_accepted_in_order(steps in threaded_steps()) {
        let events = well_formed(&steps);
        let mut engine = TraceEngine::new();
        for (index, (event, origin)) in events.iter().enumerate() {
            let receipt = engine.ingest_from(event.clone(), origin.clone());
            prop_assert!(receipt.is_ok(), "event {} rejected: {:?}", index, receipt);
            let receipt = receipt.unwrap();
            prop_assert_eq!(receipt.id, EventId(index as u64 + 1));
            prop_assert!(!receipt.unbalanced);
        }
        prop_assert_eq!(engine.len(), events.len());
        prop_assert_eq!(engine.graph().inconsistent_events().count(), 0);
    }

    #[test]
    fn every_edge_points_backwards(steps in threaded_steps()) {
        let mut engine = TraceEngine::new();
        for (event, origin) in well_formed(&steps) {
            let _ = engine.ingest_from(event, origin);
        }
        for edge in engine.graph().edges() {
            prop_assert!(edge.to < edge.from, "{:?}", edge);
            prop_assert!(engine.record(edge.to).is_some());
        }
    }

    #[test]
    fn snapshots_are_prefixes_of_the_live_stack(steps in threaded_steps()) {
        let mut engine = TraceEngine::new();
        for (event, origin) in well_formed(&steps) {
            let current = engine.calls().current(origin.thread);
            let live: Vec<EventId> = engine.control().snapshot(current).origins().collect();
            let receipt = engine.ingest_from(event, origin).unwrap();
            let stamped: Vec<EventId> = engine
                .record(receipt.id)
                .unwrap()
                .control
                .origins()
                .collect();
            prop_assert!(
                live.starts_with(&stamped),
                "{:?} is not a prefix of {:?}", stamped, live
            );
        }
    }

    #[test]
    fn forward_references_are_refused(
        prefix in 0usize..20,
        ahead in 0u64..5,
    ) {
        let mut engine = TraceEngine::new();
        for i in 0..prefix {
            engine.ingest(TraceEvent::assign("x", i64::try_from(i).unwrap(), [])).unwrap();
        }
        let own = engine.store().next_id();
        let err = engine
            .ingest(TraceEvent::assign("y", 0, [Read::Event(EventId(own.get() + ahead))]))
            .unwrap_err();
        let is_non_causal = matches!(err.kind, ErrorKind::NonCausalEdge { .. });
        prop_assert!(is_non_causal);
        prop_assert!(engine.graph().is_inconsistent(own));
        prop_assert!(engine.graph().edges_from(own).is_empty());
    }
}
