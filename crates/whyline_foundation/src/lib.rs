//! Core values, identifiers, and error types for Whyline.
//!
//! This crate provides:
//! - [`Value`] - Runtime values as recorded by a trace producer
//! - [`EventId`], [`FrameId`], [`ThreadId`] - Stable arena identifiers
//! - [`Error`] - Rich error types with context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod id;
pub mod value;

pub use error::{Error, ErrorContext, ErrorKind, Result};
pub use id::{EventId, FrameId, ThreadId};
pub use value::Value;
