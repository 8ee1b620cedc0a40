//! Event ingestion and dependency-graph construction for Whyline.
//!
//! This crate provides:
//! - [`TraceEvent`] / [`RawEvent`] - Typed and untyped producer events
//! - [`EventStore`] - Append-only, sequenced event log
//! - [`VariableHistory`] - Per-location, per-frame write timelines
//! - [`CallStack`] - Call tree reconstruction across producer threads
//! - [`ControlTracker`] - Active-predicate stacks and evaluation records
//! - [`DependencyGraph`] - Data, control, call and return edges
//! - [`TraceEngine`] - Incremental ingestion over all of the above

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod control;
pub mod engine;
pub mod event;
pub mod frames;
pub mod graph;
pub mod history;
pub mod raw;
pub mod store;

pub use control::{ControlEntry, ControlSnapshot, ControlTracker, Evaluation, LoopKey, RegionKind};
pub use engine::{Ingested, TraceEngine, TraceStats};
pub use event::{
    Argument, Decision, EventOrigin, EventType, Location, Read, SourceSite, TraceEvent, TraceRecord,
};
pub use frames::{CallStack, Frame, FrameState};
pub use graph::{DependencyEdge, DependencyGraph, EdgeKind};
pub use history::VariableHistory;
pub use raw::RawEvent;
pub use store::{EventStore, StoreStats};
