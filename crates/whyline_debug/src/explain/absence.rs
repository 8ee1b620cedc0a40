//! Why-not questions: explaining a branch that was not taken, or a
//! location that was not written.
//!
//! Only recorded evaluations can answer these. A false evaluation is
//! explained by its own data causes and by the sibling that ran instead:
//! the first evaluation nested directly in the region the false one opened,
//! following a chain of false `elif`s down to the branch that was true.

use std::sync::Arc;

use whyline_foundation::{EventId, FrameId};
use whyline_trace::{EdgeKind, Evaluation, EventType, Location, TraceEngine};

use super::answer::{Answer, Gap, Reach, Unavailable};
use super::question::{PredicateScope, Question};
use super::resolver::{Follow, QuestionResolver};

impl QuestionResolver<'_> {
    pub(super) fn answer_why_not(
        &self,
        question: &Question,
        text: &Arc<str>,
        scope: &PredicateScope,
    ) -> Answer {
        let latest = self
            .engine
            .control()
            .evaluations_of(text)
            .filter(|evaluation| in_scope(self.engine, evaluation, scope))
            .last();
        match latest {
            Some(evaluation) => self.explain_evaluation(question, evaluation),
            None => Answer::unavailable(question.clone(), Unavailable::NoEvaluation),
        }
    }

    pub(super) fn answer_why_not_event(&self, question: &Question, id: EventId) -> Answer {
        match self.engine.control().evaluation(id) {
            Some(evaluation) => self.explain_evaluation(question, evaluation),
            None => Answer::unavailable(question.clone(), Unavailable::NoEvaluation),
        }
    }

    /// If the location was written after `after`, explains that write.
    /// Otherwise explains the value it kept, plus every false evaluation
    /// after `after` in `frame` or the frames it called.
    pub(super) fn answer_unchanged(
        &self,
        question: &Question,
        location: &Location,
        frame: FrameId,
        after: Option<EventId>,
    ) -> Answer {
        let engine = self.engine;
        if engine.frame(frame).is_none() {
            return Answer::unavailable(question.clone(), Unavailable::UnknownFrame(frame));
        }
        if let Some(id) = after {
            if engine.record(id).is_none() {
                return Answer::unavailable(question.clone(), Unavailable::UnknownEvent(id));
            }
        }
        let after = after.unwrap_or(EventId(0));
        let calls = engine.calls();
        let history = engine.history();
        let kept = history.resolve(location, frame, EventId(after.get() + 1), calls);
        let latest = history.resolve(location, frame, engine.store().next_id(), calls);
        if let Some(write) = latest.filter(|w| Some(*w) != kept) {
            return self.explain(question, write);
        }

        let mut collector = self.collector(question);
        match kept {
            Some(write) => {
                collector.set_target(write);
                collector.traverse(Follow::All);
            }
            None => collector.gap(Gap::UnresolvedVariable {
                event: None,
                read: location.to_string(),
            }),
        }
        for evaluation in engine.control().evaluations_after(after) {
            if !evaluation.truth && calls.lineage(evaluation.frame).any(|f| f == frame) {
                collector.note(evaluation.event, Reach::NotTaken, Follow::Control);
            }
        }
        collector.finish(question.clone())
    }

    fn explain_evaluation(&self, question: &Question, evaluation: &Evaluation) -> Answer {
        let mut collector = self.collector(question);
        collector.set_target(evaluation.event);
        if self.config.why_not_includes_causes {
            collector.traverse(Follow::All);
        } else {
            collector.traverse(Follow::Control);
        }
        if !evaluation.truth {
            let mut current = evaluation;
            while let Some(next) = self.next_sibling(current) {
                if next.truth {
                    collector.note(next.event, Reach::TakenInstead, Follow::Control);
                    break;
                }
                collector.note(next.event, Reach::Edge(EdgeKind::Control), Follow::Control);
                current = next;
            }
        }
        collector.finish(question.clone())
    }

    /// The first `if`/`elif`/`else` evaluation nested directly in the region
    /// opened by `evaluation`.
    fn next_sibling(&self, evaluation: &Evaluation) -> Option<&Evaluation> {
        self.engine
            .control()
            .evaluations_in(evaluation.frame)
            .filter(|e| e.event > evaluation.event)
            .filter(|e| e.enclosing == Some(evaluation.event))
            .find(|e| {
                self.engine.record(e.event).is_some_and(|r| {
                    matches!(r.event_type(), EventType::Condition | EventType::Branch)
                })
            })
    }
}

fn in_scope(engine: &TraceEngine, evaluation: &Evaluation, scope: &PredicateScope) -> bool {
    match scope {
        PredicateScope::Anywhere => true,
        PredicateScope::Frame(frame) => evaluation.frame == *frame,
        PredicateScope::Function(name) => engine
            .frame(evaluation.frame)
            .is_some_and(|frame| frame.function == *name),
    }
}
