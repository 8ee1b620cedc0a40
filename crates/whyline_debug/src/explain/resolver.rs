//! Answering questions by walking the dependency graph backward.
//!
//! Every traversal is a best-first walk from the target toward older
//! events: the frontier is a max-heap on sequence id, so the newest pending
//! cause is always expanded next, and a visited set keyed by event id makes
//! diamonds collapse to one entry. Nothing here can fail; whatever the
//! trace cannot justify is recorded as a [`Gap`].

use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashSet};
use std::sync::Arc;

use tracing::debug;

use whyline_foundation::{EventId, FrameId, Value};
use whyline_trace::{EdgeKind, EventType, Location, TraceEngine, TraceEvent};

use super::answer::{Answer, EvidenceLink, Gap, Reach, Unavailable};
use super::question::{PredicateScope, Question, QuestionKind, Target};
use crate::config::ResolverConfig;

// =============================================================================
// Evidence Collector
// =============================================================================

/// Which edges a traversal may follow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Follow {
    /// Data, control, call-argument and return-value edges.
    All,
    /// Control edges only.
    Control,
}

impl Follow {
    fn admits(self, kind: EdgeKind) -> bool {
        match self {
            Self::All => true,
            Self::Control => kind == EdgeKind::Control,
        }
    }
}

/// Accumulates evidence and gaps for one answer.
pub(super) struct Collector<'e> {
    engine: &'e TraceEngine,
    limit: Option<usize>,
    unresolved_is_gap: bool,
    target: Option<EventId>,
    found: BTreeMap<EventId, Reach>,
    inspected: HashSet<EventId>,
    frontier: BinaryHeap<EventId>,
    gaps: BTreeSet<Gap>,
}

impl<'e> Collector<'e> {
    pub(super) fn new(engine: &'e TraceEngine, config: &ResolverConfig, limit: Option<usize>) -> Self {
        Self {
            engine,
            limit: limit.or(config.max_evidence),
            unresolved_is_gap: config.unresolved_is_gap,
            target: None,
            found: BTreeMap::new(),
            inspected: HashSet::new(),
            frontier: BinaryHeap::new(),
            gaps: BTreeSet::new(),
        }
    }

    fn len(&self) -> usize {
        self.found.len() + usize::from(self.target.is_some())
    }

    fn contains(&self, id: EventId) -> bool {
        self.target == Some(id) || self.found.contains_key(&id)
    }

    /// Records the target. The target is always kept, whatever the limit.
    pub(super) fn set_target(&mut self, id: EventId) {
        self.found.remove(&id);
        self.target = Some(id);
        self.frontier.push(id);
    }

    /// Adds `id` as evidence reached by `reach` and queues it for
    /// expansion. Returns false if it was already known or the limit is
    /// reached.
    pub(super) fn discover(&mut self, id: EventId, reach: Reach) -> bool {
        if self.contains(id) {
            return false;
        }
        if let Some(limit) = self.limit {
            if self.len() >= limit {
                self.gaps.insert(Gap::Truncated { limit });
                return false;
            }
        }
        self.found.insert(id, reach);
        self.frontier.push(id);
        true
    }

    /// Adds `id` as evidence without expanding its dependencies.
    pub(super) fn note(&mut self, id: EventId, reach: Reach, follow: Follow) {
        if self.discover(id, reach) {
            self.inspect(id, follow);
        }
    }

    pub(super) fn gap(&mut self, gap: Gap) {
        self.gaps.insert(gap);
    }

    /// Expands the frontier until it is empty.
    pub(super) fn traverse(&mut self, follow: Follow) {
        let engine = self.engine;
        while let Some(id) = self.frontier.pop() {
            if !self.inspect(id, follow) {
                continue;
            }
            let Some(record) = engine.record(id) else {
                continue;
            };
            if let TraceEvent::Call { .. } = record.event {
                if engine.calls().is_opaque(id) {
                    continue;
                }
            }
            for edge in engine.graph().edges_from(id) {
                if follow.admits(edge.kind) {
                    self.discover(edge.to, Reach::Edge(edge.kind));
                }
            }
            if let TraceEvent::FunctionEntry { .. } = record.event {
                if let Some(call) = engine.frame(record.frame).and_then(|f| f.call_site) {
                    self.discover(call, Reach::CallSite);
                }
            }
        }
    }

    /// Records the gaps attached to one evidence event. Returns false if the
    /// event was already inspected.
    fn inspect(&mut self, id: EventId, follow: Follow) -> bool {
        if !self.inspected.insert(id) {
            return false;
        }
        let engine = self.engine;
        if engine.graph().is_inconsistent(id) {
            self.gaps.insert(Gap::InconsistentEvent { event: id });
        }
        if follow == Follow::All && self.unresolved_is_gap {
            for read in engine.graph().unresolved(id) {
                self.gaps.insert(Gap::UnresolvedVariable {
                    event: Some(id),
                    read: read.to_string(),
                });
            }
        }
        if let Some(record) = engine.record(id) {
            if let Some((frame, since)) = engine.calls().unbalanced_at(record.frame, id) {
                self.gaps.insert(Gap::UnbalancedFrame { frame, since });
            }
        }
        true
    }

    /// Flags the target's frame if it never returned.
    fn check_target_frame(&mut self) {
        let engine = self.engine;
        let frame = self
            .target
            .and_then(|id| engine.record(id))
            .and_then(|record| engine.frame(record.frame));
        if let Some(frame) = frame {
            if frame.is_unterminated() {
                self.gaps.insert(Gap::UnterminatedFrame { frame: frame.id });
            }
        }
    }

    /// Target first, then every cause in ascending sequence order.
    pub(super) fn finish(mut self, question: Question) -> Answer {
        self.check_target_frame();
        let mut evidence = Vec::with_capacity(self.len());
        if let Some(event) = self.target {
            evidence.push(EvidenceLink {
                event,
                reached: Reach::Target,
            });
        }
        evidence.extend(
            self.found
                .into_iter()
                .map(|(event, reached)| EvidenceLink { event, reached }),
        );
        Answer::new(question, evidence, self.gaps.into_iter().collect())
    }
}

// =============================================================================
// Question Resolver
// =============================================================================

/// Answers [`Question`]s against a trace engine.
pub struct QuestionResolver<'a> {
    pub(super) engine: &'a TraceEngine,
    pub(super) config: ResolverConfig,
}

impl<'a> QuestionResolver<'a> {
    /// Creates a resolver with the default configuration.
    #[must_use]
    pub fn new(engine: &'a TraceEngine) -> Self {
        Self::with_config(engine, ResolverConfig::default())
    }

    /// Creates a resolver with a custom configuration.
    #[must_use]
    pub fn with_config(engine: &'a TraceEngine, config: ResolverConfig) -> Self {
        Self { engine, config }
    }

    /// The resolver's configuration.
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Answers a question. Never fails: missing information becomes gaps.
    #[must_use]
    pub fn ask(&self, question: &Question) -> Answer {
        let answer = match (question.kind, &question.target) {
            (QuestionKind::WhyValue, target) => self.answer_value(question, target),
            (QuestionKind::WhyLineExecuted, Target::Event(id)) => {
                self.answer_line_executed(question, *id)
            }
            (QuestionKind::WhyNotBranch, Target::Predicate { text, scope }) => {
                self.answer_why_not(question, text, scope)
            }
            (QuestionKind::WhyNotBranch, Target::Event(id)) => {
                self.answer_why_not_event(question, *id)
            }
            (QuestionKind::WhyReturned, Target::Event(id)) => self.answer_returned(question, *id),
            (QuestionKind::WhyReturned, Target::Function { name, value }) => {
                self.answer_function_returned(question, name, value.as_ref())
            }
            (QuestionKind::WhyCalled, Target::Function { name, .. }) => {
                self.answer_called(question, name)
            }
            (
                QuestionKind::WhyDidntChange,
                Target::Value {
                    location,
                    frame,
                    at,
                },
            ) => self.answer_unchanged(question, location, *frame, *at),
            (QuestionKind::WhyCreated, Target::Object { type_name }) => {
                self.answer_created(question, type_name)
            }
            _ => Answer::unavailable(question.clone(), Unavailable::UnsupportedTarget),
        };
        debug!(
            kind = %question.kind,
            evidence = answer.evidence.len(),
            gaps = answer.gaps.len(),
            complete = answer.is_complete(),
            "question answered"
        );
        answer
    }

    // =========================================================================
    // Convenience
    // =========================================================================

    /// Why does `location` hold its value as seen from `frame` before `at`?
    #[must_use]
    pub fn why_value(&self, location: Location, frame: FrameId, at: Option<EventId>) -> Answer {
        self.ask(&Question::why_value(location, frame, at))
    }

    /// Why does a module-level variable hold its final value?
    #[must_use]
    pub fn why_variable(&self, name: &str) -> Answer {
        self.ask(&Question::why_variable(name))
    }

    /// Why did event `id` execute?
    #[must_use]
    pub fn why_line_executed(&self, id: EventId) -> Answer {
        self.ask(&Question::why_line_executed(id))
    }

    /// Why was the branch guarded by `predicate` not taken?
    #[must_use]
    pub fn why_not(&self, predicate: &str, scope: PredicateScope) -> Answer {
        self.ask(&Question::why_not(predicate, scope))
    }

    /// Why did the RETURN `id` return what it did?
    #[must_use]
    pub fn why_returned(&self, id: EventId) -> Answer {
        self.ask(&Question::why_returned(id))
    }

    /// Why was `function` called?
    #[must_use]
    pub fn why_called(&self, function: &str) -> Answer {
        self.ask(&Question::why_called(function))
    }

    /// Why did `location` keep its value after event `after`?
    #[must_use]
    pub fn why_didnt_change(&self, location: Location, frame: FrameId, after: Option<EventId>) -> Answer {
        self.ask(&Question::why_didnt_change(location, frame, after))
    }

    /// Why was the latest object of `type_name` created?
    #[must_use]
    pub fn why_created(&self, type_name: &str) -> Answer {
        self.ask(&Question::why_created(type_name))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    pub(super) fn collector(&self, question: &Question) -> Collector<'a> {
        Collector::new(self.engine, &self.config, question.max_evidence)
    }

    /// Full backward traversal from `target`.
    pub(super) fn explain(&self, question: &Question, target: EventId) -> Answer {
        let mut collector = self.collector(question);
        collector.set_target(target);
        collector.traverse(Follow::All);
        collector.finish(question.clone())
    }

    fn answer_value(&self, question: &Question, target: &Target) -> Answer {
        match target {
            Target::Event(id) => {
                if self.engine.record(*id).is_none() {
                    return Answer::unavailable(question.clone(), Unavailable::UnknownEvent(*id));
                }
                self.explain(question, *id)
            }
            Target::Value {
                location,
                frame,
                at,
            } => {
                if self.engine.frame(*frame).is_none() {
                    return Answer::unavailable(question.clone(), Unavailable::UnknownFrame(*frame));
                }
                let before = at.unwrap_or_else(|| self.engine.store().next_id());
                match self
                    .engine
                    .history()
                    .resolve(location, *frame, before, self.engine.calls())
                {
                    Some(write) => self.explain(question, write),
                    None => Answer::new(
                        question.clone(),
                        Vec::new(),
                        vec![Gap::UnresolvedVariable {
                            event: None,
                            read: location.to_string(),
                        }],
                    ),
                }
            }
            Target::ValueEquals { location, value } => match self.find_write(location, value) {
                Some(write) => self.explain(question, write),
                None => Answer::unavailable(question.clone(), Unavailable::NoMatchingEvent),
            },
            Target::Function { .. } | Target::Object { .. } | Target::Predicate { .. } => {
                Answer::unavailable(question.clone(), Unavailable::UnsupportedTarget)
            }
        }
    }

    /// The latest event, in any frame, that stored `value` into `location`.
    fn find_write(&self, location: &Location, value: &Value) -> Option<EventId> {
        self.engine
            .history()
            .writes_to(location)
            .iter()
            .rev()
            .copied()
            .find(|id| {
                let Some(record) = self.engine.record(*id) else {
                    return false;
                };
                match &record.event {
                    TraceEvent::FunctionEntry { args, .. } => args.iter().any(|arg| {
                        matches!(location, Location::Variable(name) if *name == arg.name)
                            && arg.value == *value
                    }),
                    event => {
                        event.written_location().as_ref() == Some(location)
                            && event.value() == Some(value)
                    }
                }
            })
    }

    fn answer_line_executed(&self, question: &Question, id: EventId) -> Answer {
        let Some(record) = self.engine.record(id) else {
            return Answer::unavailable(question.clone(), Unavailable::UnknownEvent(id));
        };
        let mut collector = self.collector(question);
        collector.set_target(id);
        let calls = self.engine.calls();
        for frame in calls.lineage(record.frame) {
            let Some(frame) = calls.get(frame) else {
                continue;
            };
            for site in frame.entry.into_iter().chain(frame.call_site) {
                collector.discover(site, Reach::CallSite);
            }
        }
        collector.traverse(Follow::Control);
        collector.finish(question.clone())
    }

    fn answer_returned(&self, question: &Question, id: EventId) -> Answer {
        match self.engine.record(id) {
            None => Answer::unavailable(question.clone(), Unavailable::UnknownEvent(id)),
            Some(record) if !matches!(record.event, TraceEvent::Return { .. }) => {
                Answer::unavailable(question.clone(), Unavailable::NotAReturn(id))
            }
            Some(_) => self.explain(question, id),
        }
    }

    fn answer_function_returned(
        &self,
        question: &Question,
        name: &Arc<str>,
        value: Option<&Value>,
    ) -> Answer {
        let engine = self.engine;
        let latest = engine
            .store()
            .by_type(EventType::Return)
            .filter(|record| {
                let named = record.event.function().is_some_and(|f| f == name);
                let closed = engine.frame(record.frame).is_some_and(|frame| {
                    frame.function == *name && frame.return_event() == Some(record.id)
                });
                named || closed
            })
            .filter(|record| value.is_none_or(|v| record.event.value() == Some(v)))
            .last()
            .map(|record| record.id);
        match latest {
            Some(id) => self.explain(question, id),
            None => Answer::unavailable(question.clone(), Unavailable::NoMatchingEvent),
        }
    }

    fn answer_called(&self, question: &Question, name: &str) -> Answer {
        let calls: Vec<_> = self.engine.store().function_calls(name).collect();
        let entry = calls
            .iter()
            .rev()
            .find(|r| matches!(r.event, TraceEvent::FunctionEntry { .. }))
            .or_else(|| calls.last())
            .map(|r| r.id);
        match entry {
            Some(id) => self.answer_line_executed(question, id),
            None => Answer::unavailable(question.clone(), Unavailable::NoMatchingEvent),
        }
    }

    /// Explains the first appearance of the most recently created object
    /// whose repr names `type_name`.
    fn answer_created(&self, question: &Question, type_name: &str) -> Answer {
        let Some(wanted) = object_type(type_name) else {
            return Answer::unavailable(question.clone(), Unavailable::NoMatchingEvent);
        };
        let mut seen: HashSet<Arc<str>> = HashSet::new();
        let created = self
            .engine
            .store()
            .iter()
            .filter(|record| match record.event.value() {
                Some(Value::Object(repr)) => {
                    object_type(repr) == Some(wanted) && seen.insert(Arc::clone(repr))
                }
                _ => false,
            })
            .last()
            .map(|record| record.id);
        match created {
            Some(id) => self.explain(question, id),
            None => Answer::unavailable(question.clone(), Unavailable::NoMatchingEvent),
        }
    }
}

/// The class name an object repr starts with: `<Point>`,
/// `<geo.Point object at 0x7f>` and `Point(x=1)` all give `Point`.
fn object_type(repr: &str) -> Option<&str> {
    let repr = repr.trim().strip_prefix('<').unwrap_or(repr.trim());
    let end = repr
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
        .unwrap_or(repr.len());
    let name = repr[..end].rsplit('.').next()?;
    (!name.is_empty()).then_some(name)
}
