//! Ingestion: sequencing, rejection, and store lookups.

use whyline_foundation::{ErrorKind, EventId, FrameId, Value};
use whyline_trace::{
    Argument, EdgeKind, EventOrigin, EventType, Location, RawEvent, Read, TraceEngine, TraceEvent,
};

// =============================================================================
// Sequencing
// =============================================================================

#[test]
fn ids_are_dense_from_one() {
    let mut engine = TraceEngine::new();
    let ids: Vec<EventId> = (0..5)
        .map(|i| engine.ingest(TraceEvent::assign("x", i, [])).unwrap().id)
        .collect();
    assert_eq!(ids, (1..=5).map(EventId).collect::<Vec<_>>());
    assert_eq!(engine.store().next_id(), EventId(6));
}

#[test]
fn invalid_event_does_not_consume_an_id() {
    let mut engine = TraceEngine::new();
    engine.ingest(TraceEvent::assign("x", 1, [])).unwrap();

    let err = engine.ingest(TraceEvent::assign("", 2, [])).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidEvent { .. }));
    let err = engine
        .ingest(TraceEvent::assign("y", 2, [Read::Event(EventId(0))]))
        .unwrap_err();
    assert!(err.is_rejection());

    let next = engine.ingest(TraceEvent::assign("y", 2, [])).unwrap();
    assert_eq!(next.id, EventId(2));
    assert_eq!(engine.len(), 2);
}

#[test]
fn region_exit_needs_an_open_region() {
    let mut engine = TraceEngine::new();
    assert!(engine.ingest(TraceEvent::RegionExit).unwrap_err().is_rejection());

    engine
        .ingest(TraceEvent::condition("ok", true, []))
        .unwrap();
    engine.ingest(TraceEvent::RegionExit).unwrap();
    assert!(engine.ingest(TraceEvent::RegionExit).is_err());
    assert_eq!(engine.len(), 2);
}

#[test]
fn non_causal_reads_keep_the_event() {
    let mut engine = TraceEngine::new();
    engine.ingest(TraceEvent::assign("x", 1, [])).unwrap();
    let err = engine
        .ingest(TraceEvent::assign(
            "y",
            2,
            [Read::var("x"), Read::Event(EventId(2))],
        ))
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::NonCausalEdge { .. }));
    assert!(!err.is_rejection());

    assert_eq!(engine.len(), 2);
    assert!(engine.graph().is_inconsistent(EventId(2)));
    // The valid read still produced its edge.
    let edges = engine.graph().edges_from(EventId(2));
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].to, EventId(1));
}

#[test]
fn receipt_counts_new_edges() {
    let mut engine = TraceEngine::new();
    engine.ingest(TraceEvent::assign("x", 1, [])).unwrap();
    let receipt = engine
        .ingest(TraceEvent::assign("y", 2, [Read::var("x"), Read::var("x")]))
        .unwrap();
    assert_eq!(receipt.edges_added, 1);
    assert_eq!(receipt.frame, FrameId::ROOT);
    assert!(!receipt.unbalanced);
}

// =============================================================================
// Edges
// =============================================================================

#[test]
fn control_edges_follow_open_regions() {
    let mut engine = TraceEngine::new();
    engine.ingest(TraceEvent::assign("x", 10, [])).unwrap();
    engine
        .ingest(TraceEvent::condition("x > 5", true, [Read::var("x")]))
        .unwrap();
    engine
        .ingest(TraceEvent::assign("x", 5, []))
        .unwrap();
    engine.ingest(TraceEvent::RegionExit).unwrap();
    engine.ingest(TraceEvent::assign("y", 0, [])).unwrap();

    let inside = engine.graph().edges_from(EventId(3));
    assert!(inside
        .iter()
        .any(|e| e.to == EventId(2) && e.kind == EdgeKind::Control));
    assert!(engine.graph().edges_from(EventId(5)).is_empty());
    assert!(engine.record(EventId(3)).unwrap().control.contains(EventId(2)));
}

#[test]
fn loop_iterations_replace_each_other() {
    let mut engine = TraceEngine::new();
    let origin = EventOrigin::at("loop.py", 2);
    for i in 0..3 {
        engine
            .ingest_from(TraceEvent::loop_iteration("i", i, []), origin.clone())
            .unwrap();
        engine
            .ingest(TraceEvent::aug_assign(Location::var("total"), "+=", i, [Read::var("i")]))
            .unwrap();
    }
    engine.ingest(TraceEvent::RegionExit).unwrap();

    // The third iteration is not control dependent on the second.
    assert!(engine
        .graph()
        .edges_from(EventId(5))
        .iter()
        .all(|e| e.kind != EdgeKind::Control));
    // The body depends on its own iteration only.
    let body: Vec<_> = engine
        .graph()
        .edges_from(EventId(6))
        .iter()
        .filter(|e| e.kind == EdgeKind::Control)
        .map(|e| e.to)
        .collect();
    assert_eq!(body, vec![EventId(5)]);
    assert_eq!(engine.control().depth(FrameId::ROOT), 0);
}

// =============================================================================
// Store Lookups
// =============================================================================

#[test]
fn store_indexes() {
    let mut engine = TraceEngine::new();
    let at = |line| EventOrigin::at("app.py", line);
    engine
        .ingest_from(TraceEvent::assign("x", 1, []), at(1))
        .unwrap();
    engine
        .ingest_from(TraceEvent::call("f", [Argument::new("a", 1)]), at(2))
        .unwrap();
    engine
        .ingest_from(TraceEvent::function_entry("f", [Argument::new("a", 1)]), at(9))
        .unwrap();
    engine
        .ingest_from(TraceEvent::return_from("f", Value::None, []), at(10))
        .unwrap();
    engine
        .ingest_from(TraceEvent::assign("x", 2, []), at(1))
        .unwrap();

    let store = engine.store();
    assert_eq!(store.by_type(EventType::Assign).count(), 2);
    assert_eq!(
        store.at_line("app.py", 1).map(|r| r.id).collect::<Vec<_>>(),
        vec![EventId(1), EventId(5)]
    );
    assert_eq!(store.function_calls("f").count(), 2);
    assert_eq!(store.range(EventId(2), EventId(3)).len(), 2);
    assert!(store.get(EventId(0)).is_none());
    assert!(store.get(EventId(6)).is_none());

    let stats = engine.stats();
    assert_eq!(stats.store.total_events, 5);
    assert_eq!(stats.store.count(EventType::Return), 1);
    assert_eq!(stats.store.files, 1);
    assert_eq!(stats.frames, 2);
    assert_eq!(stats.open_frames, 0);
}

// =============================================================================
// Raw Records
// =============================================================================

#[test]
fn raw_records_ingest_like_typed_events() {
    let mut engine = TraceEngine::new();
    let origin = EventOrigin::default();
    engine
        .ingest_raw(
            RawEvent::new("ASSIGN").with("var_name", "x").with("value", 10),
            origin.clone(),
        )
        .unwrap();
    engine
        .ingest_raw(
            RawEvent::new("condition")
                .with("condition", "x > 5")
                .with("result", true)
                .with("reads", Value::List(vec![Value::from("x")])),
            origin.clone(),
        )
        .unwrap();
    let receipt = engine
        .ingest_raw(
            RawEvent::new("assign")
                .with("var_name", "x")
                .with("value", 5),
            origin.clone(),
        )
        .unwrap();
    assert!(engine
        .graph()
        .edges_from(receipt.id)
        .iter()
        .any(|e| e.kind == EdgeKind::Control && e.to == EventId(2)));

    let err = engine
        .ingest_raw(RawEvent::new("teleport"), origin)
        .unwrap_err();
    assert!(err.is_rejection());
    assert_eq!(engine.len(), 3);
}
