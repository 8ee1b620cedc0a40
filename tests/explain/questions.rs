//! Each question kind against small traces.

use whyline_debug::{
    Gap, PredicateScope, Question, QuestionKind, QuestionResolver, Reach, ResolverConfig, Target,
    Unavailable,
};
use whyline_foundation::{EventId, FrameId, Value};
use whyline_trace::{Argument, Decision, EdgeKind, Location, Read, TraceEngine, TraceEvent};

fn engine_of(events: Vec<TraceEvent>) -> TraceEngine {
    let mut engine = TraceEngine::new();
    for event in events {
        let _ = engine.ingest(event);
    }
    engine
}

/// total = 0
/// for i in range(3):
///     total += i
fn summing_loop() -> TraceEngine {
    let mut events = vec![TraceEvent::assign("total", 0, [])];
    for i in 0..3 {
        events.push(TraceEvent::loop_iteration("i", i, []));
        events.push(TraceEvent::aug_assign(
            Location::var("total"),
            "+=",
            i,
            [Read::var("i")],
        ));
    }
    events.push(TraceEvent::RegionExit);
    engine_of(events)
}

/// if ready:
///     f(5)
/// where f(a): return a
fn guarded_call() -> TraceEngine {
    engine_of(vec![
        TraceEvent::condition("ready", true, []),
        TraceEvent::call("f", [Argument::new("a", 5)]),
        TraceEvent::function_entry("f", [Argument::new("a", 5)]),
        TraceEvent::return_from("f", 5, [Read::var("a")]),
        TraceEvent::RegionExit,
    ])
}

// =============================================================================
// WHY_VALUE
// =============================================================================

#[test]
fn value_equals_finds_the_matching_write() {
    let engine = engine_of(vec![
        TraceEvent::assign("x", 1, []),
        TraceEvent::assign("x", 2, []),
        TraceEvent::assign("y", 2, [Read::var("x")]),
        TraceEvent::assign("x", 3, []),
    ]);
    let resolver = QuestionResolver::new(&engine);

    let answer = resolver.ask(&Question::why_value_was(Location::var("x"), 2));
    assert_eq!(answer.target(), Some(EventId(2)));

    let missing = resolver.ask(&Question::why_value_was(Location::var("x"), 9));
    assert_eq!(
        missing.gaps,
        vec![Gap::AnswerUnavailable(Unavailable::NoMatchingEvent)]
    );
}

#[test]
fn value_equals_matches_parameter_bindings() {
    let engine = guarded_call();
    let answer = QuestionResolver::new(&engine)
        .ask(&Question::why_value_was(Location::var("a"), Value::Int(5)));
    assert_eq!(answer.target(), Some(EventId(3)));
    assert_eq!(answer.reach_of(EventId(1)), Some(Reach::Edge(EdgeKind::Control)));
    assert_eq!(answer.reach_of(EventId(2)), Some(Reach::CallSite));
}

#[test]
fn value_at_a_point_in_time() {
    let engine = engine_of(vec![
        TraceEvent::assign("x", 1, []),
        TraceEvent::assign("x", 2, []),
        TraceEvent::assign("x", 3, []),
    ]);
    let resolver = QuestionResolver::new(&engine);

    let answer = resolver.why_value(Location::var("x"), FrameId::ROOT, Some(EventId(3)));
    assert_eq!(answer.target(), Some(EventId(2)));

    let before_any = resolver.why_value(Location::var("x"), FrameId::ROOT, Some(EventId(1)));
    assert!(before_any.evidence.is_empty());
    assert!(before_any.has_gap(|g| matches!(g, Gap::UnresolvedVariable { event: None, .. })));
}

#[test]
fn value_inside_a_finished_frame() {
    let engine = guarded_call();
    let resolver = QuestionResolver::new(&engine);

    let answer = resolver.why_value(Location::var("a"), FrameId(1), None);
    assert_eq!(answer.target(), Some(EventId(3)));
    assert!(answer.is_complete());

    let unknown = resolver.why_value(Location::var("a"), FrameId(7), None);
    assert_eq!(
        unknown.gaps,
        vec![Gap::AnswerUnavailable(Unavailable::UnknownFrame(FrameId(7)))]
    );
}

#[test]
fn loop_accumulator_reaches_every_iteration() {
    let engine = summing_loop();
    let answer = QuestionResolver::new(&engine).why_variable("total");

    assert!(answer.is_complete());
    assert_eq!(answer.target(), Some(EventId(7)));
    assert_eq!(
        answer.events().collect::<Vec<_>>(),
        [7, 1, 2, 3, 4, 5, 6].map(EventId).to_vec()
    );
}

// =============================================================================
// WHY_LINE_EXECUTED / WHY_CALLED
// =============================================================================

#[test]
fn loop_body_depends_on_its_own_iteration_only() {
    let engine = summing_loop();
    let answer = QuestionResolver::new(&engine).why_line_executed(EventId(7));

    assert_eq!(answer.events().collect::<Vec<_>>(), vec![EventId(7), EventId(6)]);
    assert_eq!(answer.reach_of(EventId(6)), Some(Reach::Edge(EdgeKind::Control)));
}

#[test]
fn called_function_reports_call_site_and_guard() {
    let engine = guarded_call();
    let answer = QuestionResolver::new(&engine).why_called("f");

    assert!(answer.is_complete());
    assert_eq!(
        answer.events().collect::<Vec<_>>(),
        vec![EventId(3), EventId(1), EventId(2)]
    );
    assert_eq!(answer.reach_of(EventId(2)), Some(Reach::CallSite));
    assert_eq!(answer.reach_of(EventId(1)), Some(Reach::Edge(EdgeKind::Control)));

    assert!(QuestionResolver::new(&engine).why_called("g").is_unavailable());
}

// =============================================================================
// WHY_RETURNED
// =============================================================================

#[test]
fn function_return_by_value() {
    let engine = guarded_call();
    let resolver = QuestionResolver::new(&engine);

    let answer = resolver.ask(&Question::why_function_returned("f", Some(Value::Int(5))));
    assert_eq!(answer.target(), Some(EventId(4)));
    assert_eq!(answer.reach_of(EventId(3)), Some(Reach::Edge(EdgeKind::ReturnValue)));

    let other = resolver.ask(&Question::why_function_returned("f", Some(Value::Int(6))));
    assert!(other.is_unavailable());
}

#[test]
fn returned_needs_a_return_event() {
    let engine = guarded_call();
    let answer = QuestionResolver::new(&engine).why_returned(EventId(2));
    assert_eq!(
        answer.gaps,
        vec![Gap::AnswerUnavailable(Unavailable::NotAReturn(EventId(2)))]
    );
}

// =============================================================================
// WHY_NOT_BRANCH
// =============================================================================

#[test]
fn why_not_follows_elif_chain() {
    // if n < 0: ...  elif n == 0: ...  else: sign = 1
    let engine = engine_of(vec![
        TraceEvent::assign("n", 4, []),
        TraceEvent::branch("n < 0", false, Decision::If, [Read::var("n")]),
        TraceEvent::branch("n == 0", false, Decision::Elif, [Read::var("n")]),
        TraceEvent::branch("else", true, Decision::Else, []),
        TraceEvent::assign("sign", 1, []),
        TraceEvent::RegionExit,
        TraceEvent::RegionExit,
        TraceEvent::RegionExit,
    ]);
    let resolver = QuestionResolver::new(&engine);

    let answer = resolver.why_not("n < 0", PredicateScope::Anywhere);
    assert_eq!(answer.target(), Some(EventId(2)));
    assert_eq!(answer.reach_of(EventId(1)), Some(Reach::Edge(EdgeKind::Data)));
    assert_eq!(answer.taken_instead(), Some(EventId(4)));

    let terse = QuestionResolver::with_config(&engine, ResolverConfig::terse())
        .why_not("n == 0", PredicateScope::Anywhere);
    assert_eq!(terse.events().collect::<Vec<_>>(), vec![EventId(3), EventId(2), EventId(4)]);
}

// =============================================================================
// WHY_DIDNT_CHANGE / WHY_CREATED
// =============================================================================

/// p = Point()
/// p.x = 0
/// def bump(pt, on):
///     if on: pt.x = 1
/// bump(p, False)
fn skipped_bump() -> TraceEngine {
    engine_of(vec![
        TraceEvent::assign("p", Value::object("<shapes.Point object at 0x10>"), []),
        TraceEvent::attr_assign("p", "x", 0, []),
        TraceEvent::call(
            "bump",
            [
                Argument::new("pt", Value::object("<shapes.Point object at 0x10>"))
                    .from_read(Read::var("p")),
                Argument::new("on", false),
            ],
        ),
        TraceEvent::function_entry(
            "bump",
            [
                Argument::new("pt", Value::object("<shapes.Point object at 0x10>")),
                Argument::new("on", false),
            ],
        ),
        TraceEvent::condition("on", false, [Read::var("on")]),
        TraceEvent::RegionExit,
        TraceEvent::return_from("bump", Value::None, []),
    ])
}

#[test]
fn field_that_kept_its_value_points_at_the_skipped_guard() {
    let engine = skipped_bump();
    let answer = QuestionResolver::new(&engine).ask(&Question::why_didnt_change(
        Location::attr("p", "x"),
        FrameId::ROOT,
        Some(EventId(2)),
    ));
    assert!(answer.is_complete(), "{:?}", answer.gaps);
    assert_eq!(answer.target(), Some(EventId(2)));
    assert_eq!(answer.not_taken().collect::<Vec<_>>(), vec![EventId(5)]);
    assert_eq!(answer.reach_of(EventId(5)), Some(Reach::NotTaken));
}

#[test]
fn field_that_did_change_is_explained_instead() {
    let engine = skipped_bump();
    let answer = QuestionResolver::new(&engine).ask(&Question::why_didnt_change(
        Location::attr("p", "x"),
        FrameId::ROOT,
        Some(EventId(1)),
    ));
    assert_eq!(answer.target(), Some(EventId(2)));
    assert_eq!(answer.evidence.len(), 1);
    assert_eq!(answer.not_taken().count(), 0);
}

#[test]
fn created_object_is_its_first_appearance() {
    let engine = skipped_bump();
    let resolver = QuestionResolver::new(&engine);
    let answer = resolver.ask(&Question::why_created("Point"));
    assert_eq!(answer.target(), Some(EventId(1)));
    assert!(answer.is_complete());
    assert!(resolver
        .ask(&Question::why_created("Line"))
        .has_gap(|g| *g == Gap::AnswerUnavailable(Unavailable::NoMatchingEvent)));
}

// =============================================================================
// Limits and Unsupported Questions
// =============================================================================

#[test]
fn question_limit_overrides_config() {
    let mut events = vec![TraceEvent::assign("x0", 0, [])];
    for i in 1..10 {
        events.push(TraceEvent::assign(
            format!("x{i}"),
            i,
            [Read::var(format!("x{}", i - 1))],
        ));
    }
    let engine = engine_of(events);
    let resolver = QuestionResolver::with_config(&engine, ResolverConfig::interactive());

    let answer = resolver.ask(&Question::why_variable("x9").with_limit(3));
    assert_eq!(answer.evidence.len(), 3);
    assert_eq!(answer.gaps, vec![Gap::Truncated { limit: 3 }]);

    let full = resolver.why_variable("x9");
    assert_eq!(full.evidence.len(), 10);
    assert!(full.is_complete());
}

#[test]
fn mismatched_kind_and_target_is_unsupported() {
    let engine = guarded_call();
    let resolver = QuestionResolver::new(&engine);
    let questions = [
        Question::new(QuestionKind::WhyCalled, Target::Event(EventId(1))),
        Question::new(QuestionKind::WhyCreated, Target::Event(EventId(1))),
        Question::new(
            QuestionKind::WhyValue,
            Target::Object {
                type_name: "Point".into(),
            },
        ),
        Question::new(
            QuestionKind::WhyDidntChange,
            Target::Function {
                name: "f".into(),
                value: None,
            },
        ),
        Question::new(
            QuestionKind::WhyLineExecuted,
            Target::Predicate {
                text: "ready".into(),
                scope: PredicateScope::Anywhere,
            },
        ),
    ];
    for question in &questions {
        let answer = resolver.ask(question);
        assert_eq!(
            answer.gaps,
            vec![Gap::AnswerUnavailable(Unavailable::UnsupportedTarget)]
        );
    }
}
