//! Properties of answers over random traces.

use std::collections::BTreeSet;

use proptest::prelude::*;
use whyline_debug::{Question, QuestionResolver, Reach, ResolverConfig};
use whyline_foundation::EventId;
use whyline_trace::{Read, TraceEngine, TraceEvent};

const NAMES: [&str; 5] = ["a", "b", "c", "d", "e"];

fn writes() -> impl Strategy<Value = Vec<(usize, Vec<usize>, bool)>> {
    prop::collection::vec(
        (0usize..5, prop::collection::vec(0usize..5, 0..3), any::<bool>()),
        1..50,
    )
}

/// Assignments, some wrapped in a one-statement conditional region.
fn build(writes: &[(usize, Vec<usize>, bool)]) -> TraceEngine {
    let mut engine = TraceEngine::new();
    for (target, reads, guarded) in writes {
        let reads: Vec<Read> = reads.iter().map(|r| Read::var(NAMES[*r])).collect();
        if *guarded {
            let _ = engine.ingest(TraceEvent::condition("guard", true, reads.clone()));
        }
        let _ = engine.ingest(TraceEvent::assign(NAMES[*target], 0, reads));
        if *guarded {
            let _ = engine.ingest(TraceEvent::RegionExit);
        }
    }
    engine
}

/// Every event reachable backward from `from` over any edge.
fn ancestors(engine: &TraceEngine, from: EventId) -> BTreeSet<EventId> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![from];
    while let Some(id) = stack.pop() {
        for edge in engine.graph().edges_from(id) {
            if seen.insert(edge.to) {
                stack.push(edge.to);
            }
        }
    }
    seen
}

proptest! {
    /// Without a limit, the causes of a value are exactly its ancestors.
    #[test]
    fn evidence_is_the_backward_closure(writes in writes()) {
        let engine = build(&writes);
        let resolver = QuestionResolver::with_config(&engine, ResolverConfig::lenient());
        for name in NAMES {
            let answer = resolver.why_variable(name);
            let Some(target) = answer.target() else {
                continue;
            };
            let causes: BTreeSet<EventId> = answer.events().skip(1).collect();
            prop_assert_eq!(causes, ancestors(&engine, target));
            prop_assert!(answer.is_complete());
        }
    }

    /// Asking the same question twice gives the same answer.
    #[test]
    fn answers_are_deterministic(writes in writes()) {
        let engine = build(&writes);
        let resolver = QuestionResolver::new(&engine);
        for name in NAMES {
            let question = Question::why_variable(name);
            prop_assert_eq!(resolver.ask(&question), resolver.ask(&question));
        }
    }

    /// Line-executed answers only ever follow control edges.
    #[test]
    fn line_executed_follows_control_only(writes in writes()) {
        let engine = build(&writes);
        let resolver = QuestionResolver::new(&engine);
        let last = engine.store().last_id().unwrap_or(EventId::FIRST);
        let answer = resolver.why_line_executed(last);
        for link in answer.evidence.iter().skip(1) {
            prop_assert!(matches!(
                link.reached,
                Reach::Edge(whyline_trace::EdgeKind::Control) | Reach::CallSite
            ));
        }
    }

    /// A limit caps the evidence and always keeps the target.
    #[test]
    fn limits_keep_the_target(writes in writes(), limit in 1usize..6) {
        let engine = build(&writes);
        let resolver = QuestionResolver::new(&engine);
        for name in NAMES {
            let answer = resolver.ask(&Question::why_variable(name).with_limit(limit));
            prop_assert!(answer.evidence.len() <= limit);
            if let Some(first) = answer.evidence.first() {
                prop_assert_eq!(first.reached, Reach::Target);
            }
        }
    }
}
