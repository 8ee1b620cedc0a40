//! Questions a user can ask about a trace.

use std::fmt;
use std::sync::Arc;

use whyline_foundation::{EventId, FrameId, Value};
use whyline_trace::Location;

/// The kind of "why" being asked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QuestionKind {
    /// Why does a location hold its value?
    WhyValue,
    /// Why did this event happen at all?
    WhyLineExecuted,
    /// Why was a branch not taken?
    WhyNotBranch,
    /// Why did a function return what it did?
    WhyReturned,
    /// Why was a function called?
    WhyCalled,
    /// Why did a location keep its value after some point?
    WhyDidntChange,
    /// Why was an object of some type created?
    WhyCreated,
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WhyValue => "why-value",
            Self::WhyLineExecuted => "why-line-executed",
            Self::WhyNotBranch => "why-not-branch",
            Self::WhyReturned => "why-returned",
            Self::WhyCalled => "why-called",
            Self::WhyDidntChange => "why-didnt-change",
            Self::WhyCreated => "why-created",
        };
        write!(f, "{name}")
    }
}

/// Where to look for evaluations of a predicate.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PredicateScope {
    /// One activation.
    Frame(FrameId),
    /// Every activation of a function.
    Function(Arc<str>),
    /// The whole trace.
    Anywhere,
}

/// What a question is about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// A specific event.
    Event(EventId),
    /// A location as seen from `frame` just before `at` (end of trace when
    /// `None`).
    Value {
        /// The location.
        location: Location,
        /// Frame the read is made from.
        frame: FrameId,
        /// Point in the trace.
        at: Option<EventId>,
    },
    /// The latest write of `location`, in any frame, that stored `value`.
    ValueEquals {
        /// The location.
        location: Location,
        /// The observed value.
        value: Value,
    },
    /// The latest activity of a function, optionally with a given result.
    Function {
        /// Function name.
        name: Arc<str>,
        /// Required return value.
        value: Option<Value>,
    },
    /// The most recently created object of a type, matched on the class
    /// name in the object's repr.
    Object {
        /// Class name, optionally module-qualified.
        type_name: Arc<str>,
    },
    /// Evaluations of a predicate.
    Predicate {
        /// Predicate source text.
        text: Arc<str>,
        /// Where to look.
        scope: PredicateScope,
    },
}

/// A question for the resolver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Question {
    /// What is being asked.
    pub kind: QuestionKind,
    /// What it is asked about.
    pub target: Target,
    /// Evidence limit overriding the resolver's default.
    pub max_evidence: Option<usize>,
}

impl Question {
    /// Creates a question.
    #[must_use]
    pub fn new(kind: QuestionKind, target: Target) -> Self {
        Self {
            kind,
            target,
            max_evidence: None,
        }
    }

    /// Why does `location` hold its value, as read from `frame` just before
    /// `at`?
    #[must_use]
    pub fn why_value(location: Location, frame: FrameId, at: Option<EventId>) -> Self {
        Self::new(QuestionKind::WhyValue, Target::Value { location, frame, at })
    }

    /// Why does a variable in the module frame hold its final value?
    #[must_use]
    pub fn why_variable(name: impl Into<Arc<str>>) -> Self {
        Self::why_value(Location::var(name), FrameId::ROOT, None)
    }

    /// Why did `location` ever hold `value`?
    #[must_use]
    pub fn why_value_was(location: Location, value: impl Into<Value>) -> Self {
        Self::new(
            QuestionKind::WhyValue,
            Target::ValueEquals {
                location,
                value: value.into(),
            },
        )
    }

    /// Why did event `id` produce what it did?
    #[must_use]
    pub fn why_event(id: EventId) -> Self {
        Self::new(QuestionKind::WhyValue, Target::Event(id))
    }

    /// Why did event `id` execute?
    #[must_use]
    pub fn why_line_executed(id: EventId) -> Self {
        Self::new(QuestionKind::WhyLineExecuted, Target::Event(id))
    }

    /// Why was the branch guarded by `predicate` not taken?
    #[must_use]
    pub fn why_not(predicate: impl Into<Arc<str>>, scope: PredicateScope) -> Self {
        Self::new(
            QuestionKind::WhyNotBranch,
            Target::Predicate {
                text: predicate.into(),
                scope,
            },
        )
    }

    /// Why did the RETURN event `id` return what it did?
    #[must_use]
    pub fn why_returned(id: EventId) -> Self {
        Self::new(QuestionKind::WhyReturned, Target::Event(id))
    }

    /// Why did `function` return (optionally: return `value`)?
    #[must_use]
    pub fn why_function_returned(function: impl Into<Arc<str>>, value: Option<Value>) -> Self {
        Self::new(
            QuestionKind::WhyReturned,
            Target::Function {
                name: function.into(),
                value,
            },
        )
    }

    /// Why was `function` called?
    #[must_use]
    pub fn why_called(function: impl Into<Arc<str>>) -> Self {
        Self::new(
            QuestionKind::WhyCalled,
            Target::Function {
                name: function.into(),
                value: None,
            },
        )
    }

    /// Why did `location`, as seen from `frame`, keep the value it held
    /// just after event `after`? With `after` of `None`, why was it never
    /// written at all?
    #[must_use]
    pub fn why_didnt_change(location: Location, frame: FrameId, after: Option<EventId>) -> Self {
        Self::new(
            QuestionKind::WhyDidntChange,
            Target::Value {
                location,
                frame,
                at: after,
            },
        )
    }

    /// Why was the latest object of `type_name` created?
    #[must_use]
    pub fn why_created(type_name: impl Into<Arc<str>>) -> Self {
        Self::new(
            QuestionKind::WhyCreated,
            Target::Object {
                type_name: type_name.into(),
            },
        )
    }

    /// Builder method to cap the evidence for this question.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.max_evidence = Some(limit);
        self
    }
}
