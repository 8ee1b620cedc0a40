//! Answers: evidence chains and the gaps in them.

use std::fmt;

use whyline_foundation::{EventId, FrameId};
use whyline_trace::EdgeKind;

use super::question::Question;

// =============================================================================
// Evidence
// =============================================================================

/// How an evidence entry was reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reach {
    /// The event the question is about.
    Target,
    /// Followed a dependency edge of this kind.
    Edge(EdgeKind),
    /// An activation boundary: a FUNCTION_ENTRY or its linked CALL.
    CallSite,
    /// The sibling evaluation that was taken instead of the asked branch.
    TakenInstead,
    /// A false evaluation after which the asked-about location was never
    /// written.
    NotTaken,
}

impl fmt::Display for Reach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Target => write!(f, "target"),
            Self::Edge(kind) => write!(f, "{kind}"),
            Self::CallSite => write!(f, "call site"),
            Self::TakenInstead => write!(f, "taken instead"),
            Self::NotTaken => write!(f, "not taken"),
        }
    }
}

/// One event in an evidence chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EvidenceLink {
    /// The event.
    pub event: EventId,
    /// How the resolver got there.
    pub reached: Reach,
}

// =============================================================================
// Gaps
// =============================================================================

/// Why a question could not be answered at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Unavailable {
    /// The target event id was never assigned.
    UnknownEvent(EventId),
    /// The target frame does not exist.
    UnknownFrame(FrameId),
    /// The target event is not a RETURN.
    NotAReturn(EventId),
    /// No evaluation of the predicate was recorded in scope.
    NoEvaluation,
    /// No event matches the function or value asked about.
    NoMatchingEvent,
    /// The question kind does not accept this kind of target.
    UnsupportedTarget,
}

/// An explicit hole in an answer's evidence.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Gap {
    /// A read had no recorded write (parameter, builtin, external global).
    /// `event` is `None` when the asked-about location itself was never
    /// written.
    UnresolvedVariable {
        /// The reading event.
        event: Option<EventId>,
        /// The read as written.
        read: String,
    },
    /// Evidence lies in a lineage that saw a RETURN with no open frame.
    UnbalancedFrame {
        /// The frame marked inconsistent.
        frame: FrameId,
        /// The unmatched RETURN.
        since: EventId,
    },
    /// The target's frame never returned.
    UnterminatedFrame {
        /// The open or abandoned frame.
        frame: FrameId,
    },
    /// An evidence event had a dependency refused as non-causal.
    InconsistentEvent {
        /// The flagged event.
        event: EventId,
    },
    /// The evidence limit was reached.
    Truncated {
        /// The limit in force.
        limit: usize,
    },
    /// The question has no answer in this trace.
    AnswerUnavailable(Unavailable),
}

impl fmt::Display for Gap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedVariable { event: Some(e), read } => {
                write!(f, "unresolved read of `{read}` at {e}")
            }
            Self::UnresolvedVariable { event: None, read } => {
                write!(f, "`{read}` was never written")
            }
            Self::UnbalancedFrame { frame, since } => {
                write!(f, "{frame} unbalanced since {since}")
            }
            Self::UnterminatedFrame { frame } => write!(f, "{frame} never returned"),
            Self::InconsistentEvent { event } => write!(f, "{event} has non-causal dependencies"),
            Self::Truncated { limit } => write!(f, "evidence truncated at {limit} events"),
            Self::AnswerUnavailable(reason) => write!(f, "answer unavailable: {reason:?}"),
        }
    }
}

// =============================================================================
// Answer
// =============================================================================

/// Whether an answer's evidence is whole.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Completeness {
    /// No gaps.
    Complete,
    /// At least one gap.
    Partial,
}

/// The resolver's reply to a [`Question`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Answer {
    /// The question answered.
    pub question: Question,
    /// Target first, then its causes in ascending sequence order.
    pub evidence: Vec<EvidenceLink>,
    /// Complete iff `gaps` is empty.
    pub completeness: Completeness,
    /// Holes in the evidence, sorted and deduplicated.
    pub gaps: Vec<Gap>,
}

impl Answer {
    /// Builds an answer, deriving completeness from the gaps.
    #[must_use]
    pub fn new(question: Question, evidence: Vec<EvidenceLink>, mut gaps: Vec<Gap>) -> Self {
        gaps.sort();
        gaps.dedup();
        let completeness = if gaps.is_empty() {
            Completeness::Complete
        } else {
            Completeness::Partial
        };
        Self {
            question,
            evidence,
            completeness,
            gaps,
        }
    }

    /// An answer with no evidence.
    #[must_use]
    pub fn unavailable(question: Question, reason: Unavailable) -> Self {
        Self::new(question, Vec::new(), vec![Gap::AnswerUnavailable(reason)])
    }

    /// Returns true if there are no gaps.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completeness == Completeness::Complete
    }

    /// Returns true if the question could not be answered at all.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        self.gaps
            .iter()
            .any(|g| matches!(g, Gap::AnswerUnavailable(_)))
    }

    /// The event the question was about.
    #[must_use]
    pub fn target(&self) -> Option<EventId> {
        self.evidence
            .iter()
            .find(|link| link.reached == Reach::Target)
            .map(|link| link.event)
    }

    /// Evidence event ids in chain order.
    pub fn events(&self) -> impl Iterator<Item = EventId> + '_ {
        self.evidence.iter().map(|link| link.event)
    }

    /// Returns true if `event` is part of the evidence.
    #[must_use]
    pub fn contains(&self, event: EventId) -> bool {
        self.evidence.iter().any(|link| link.event == event)
    }

    /// How `event` was reached, if it is evidence.
    #[must_use]
    pub fn reach_of(&self, event: EventId) -> Option<Reach> {
        self.evidence
            .iter()
            .find(|link| link.event == event)
            .map(|link| link.reached)
    }

    /// The evaluation taken instead, for why-not answers.
    #[must_use]
    pub fn taken_instead(&self) -> Option<EventId> {
        self.evidence
            .iter()
            .find(|link| link.reached == Reach::TakenInstead)
            .map(|link| link.event)
    }

    /// False evaluations listed by a why-didnt-change answer, oldest first.
    pub fn not_taken(&self) -> impl Iterator<Item = EventId> + '_ {
        self.evidence
            .iter()
            .filter(|link| link.reached == Reach::NotTaken)
            .map(|link| link.event)
    }

    /// Returns true if any gap satisfies `pred`.
    pub fn has_gap(&self, pred: impl Fn(&Gap) -> bool) -> bool {
        self.gaps.iter().any(pred)
    }
}
