//! Whyline - causal "why" questions over recorded execution traces
//!
//! This crate re-exports all layers of the Whyline system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: whyline_runtime    - Concurrent sessions, trace persistence
//! Layer 2: whyline_debug      - Questions, answers, backward traversal
//! Layer 1: whyline_trace      - Event store, indexes, dependency graph
//! Layer 0: whyline_foundation - Core types (Value, EventId, Error)
//! ```

pub use whyline_debug as debug;
pub use whyline_foundation as foundation;
pub use whyline_runtime as runtime;
pub use whyline_trace as trace;
