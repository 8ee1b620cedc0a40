//! Untyped producer records, recorded through a session and questioned.

use whyline_debug::{Gap, Question, Reach};
use whyline_foundation::{EventId, FrameId, Value};
use whyline_runtime::Session;
use whyline_trace::{EdgeKind, EventOrigin, Location, RawEvent};

fn list(items: &[&str]) -> Value {
    Value::List(items.iter().map(|s| Value::from(*s)).collect())
}

/// p.y = 2
/// def scale(k): p.y = p.y * k; return p.y
/// scale(3)
/// out = p.y
fn record(session: &Session) {
    let records = [
        RawEvent::new("assign")
            .with("var_name", "p")
            .with("value", Value::object("<Point>")),
        RawEvent::new("attr_assign")
            .with("obj", "p")
            .with("obj_attr", "p.y")
            .with("value", 2),
        RawEvent::new("call")
            .with("func_name", "scale")
            .with("args", Value::List(vec![Value::Int(3)]))
            .with("params", list(&["k"])),
        RawEvent::new("function_entry")
            .with("func_name", "scale")
            .with("args", Value::List(vec![Value::Int(3)]))
            .with("params", list(&["k"])),
        RawEvent::new("attr_assign")
            .with("obj", "p")
            .with("attr", "y")
            .with("value", 6)
            .with("reads", list(&["p.y", "k"])),
        RawEvent::new("return")
            .with("func_name", "scale")
            .with("value", 6)
            .with("reads", list(&["p.y"])),
        RawEvent::new("assign")
            .with("var_name", "out")
            .with("value", 6)
            .with("reads", list(&["p.y"])),
    ];
    for (line, raw) in (1..).zip(records) {
        session.append_raw(raw, EventOrigin::at("scale.py", line)).unwrap();
    }
}

#[test]
fn callee_mutation_is_visible_to_the_caller() {
    let session = Session::new();
    record(&session);

    let answer = session.ask(&Question::why_variable("out"));
    assert!(answer.is_complete());
    assert_eq!(answer.target(), Some(EventId(7)));
    assert_eq!(answer.reach_of(EventId(5)), Some(Reach::Edge(EdgeKind::Data)));
    assert_eq!(answer.reach_of(EventId(4)), Some(Reach::Edge(EdgeKind::Data)));
    assert_eq!(answer.reach_of(EventId(3)), Some(Reach::CallSite));
    assert!(answer.contains(EventId(2)));
}

#[test]
fn mutation_is_recorded_in_the_owner_frame() {
    let session = Session::new();
    record(&session);

    let seen_from_root = session.with_engine(|engine| {
        engine.history().resolve(
            &Location::attr("p", "y"),
            FrameId::ROOT,
            engine.store().next_id(),
            engine.calls(),
        )
    });
    assert_eq!(seen_from_root, Some(EventId(5)));
}

#[test]
fn unnamed_arguments_are_positional() {
    let session = Session::new();
    session
        .append_raw(
            RawEvent::new("function_entry")
                .with("func_name", "anon")
                .with("args", Value::List(vec![Value::Int(1), Value::Int(2)])),
            EventOrigin::default(),
        )
        .unwrap();
    session
        .append_raw(
            RawEvent::new("assign")
                .with("var_name", "s")
                .with("value", 3)
                .with("reads", list(&["arg0", "arg1", "missing"])),
            EventOrigin::default(),
        )
        .unwrap();

    let answer = session.ask(&Question::why_value(Location::var("s"), FrameId(1), None));
    assert_eq!(answer.reach_of(EventId(1)), Some(Reach::Edge(EdgeKind::Data)));
    assert!(answer.has_gap(|g| matches!(
        g,
        Gap::UnresolvedVariable { event: Some(EventId(2)), read } if read == "missing"
    )));
    assert!(answer.gaps.contains(&Gap::UnterminatedFrame { frame: FrameId(1) }));
}

#[test]
fn malformed_records_are_rejected_without_a_trace() {
    let session = Session::new();
    let bad = [
        RawEvent::new("assign").with("value", 1),
        RawEvent::new("assign").with("var_name", 5),
        RawEvent::new("condition").with("condition", "x").with("result", "yes"),
        RawEvent::new("region_exit"),
    ];
    for raw in bad {
        let err = session.append_raw(raw, EventOrigin::default()).unwrap_err();
        assert!(err.is_rejection(), "{err}");
    }
    assert!(session.is_empty());
}

#[test]
fn records_without_a_value_are_rejected() {
    let session = Session::new();
    let valueless = [
        RawEvent::new("assign").with("var_name", "x"),
        RawEvent::new("attr_assign").with("obj", "p").with("attr", "y"),
        RawEvent::new("aug_assign").with("target", "total").with("op", "+="),
        RawEvent::new("return").with("func_name", "scale"),
        RawEvent::new("loop_iteration").with("target", "i"),
    ];
    for raw in valueless {
        let err = session.append_raw(raw, EventOrigin::default()).unwrap_err();
        assert!(err.is_rejection(), "{err}");
        assert!(err.to_string().contains("value"), "{err}");
    }
    assert!(session.is_empty());
}

#[test]
fn positional_names_never_shadow_parameters() {
    let session = Session::new();
    session
        .append_raw(
            RawEvent::new("function_entry")
                .with("func_name", "pair")
                .with("args", Value::List(vec![Value::Int(1), Value::Int(2)]))
                .with("params", list(&["arg1"])),
            EventOrigin::default(),
        )
        .unwrap();
    session
        .append_raw(
            RawEvent::new("assign")
                .with("var_name", "s")
                .with("value", 3)
                .with("reads", list(&["arg1", "arg2"])),
            EventOrigin::default(),
        )
        .unwrap();

    let answer = session.ask(&Question::why_value(Location::var("s"), FrameId(1), None));
    assert_eq!(answer.reach_of(EventId(1)), Some(Reach::Edge(EdgeKind::Data)));
    assert!(!answer.has_gap(|g| matches!(g, Gap::UnresolvedVariable { .. })));
}
