//! Questions and answers over recorded traces.
//!
//! This crate provides:
//! - [`Question`] - What a user can ask about a trace
//! - [`Answer`] - Evidence chains with explicit gaps
//! - [`QuestionResolver`] - Backward traversal over the dependency graph
//! - [`ResolverConfig`] - Evidence limits and gap policy

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod explain;

pub use config::ResolverConfig;
pub use explain::{
    Answer, Completeness, EvidenceLink, Gap, PredicateScope, Question, QuestionKind,
    QuestionResolver, Reach, Target, Unavailable,
};
