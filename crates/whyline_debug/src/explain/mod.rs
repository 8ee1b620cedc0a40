//! Explanation system for Whyline.
//!
//! Answers causal questions about a recorded trace:
//! - why-value: why does a location hold its value?
//! - why-line-executed / why-called: what control decisions led here?
//! - why-not-branch: why was a branch not taken?
//! - why-returned: what produced a function's result?
//! - why-didnt-change: what kept a location from being written?
//! - why-created: what produced the latest object of a type?

mod absence;
pub mod answer;
pub mod question;
pub mod resolver;

pub use answer::{Answer, Completeness, EvidenceLink, Gap, Reach, Unavailable};
pub use question::{PredicateScope, Question, QuestionKind, Target};
pub use resolver::QuestionResolver;
