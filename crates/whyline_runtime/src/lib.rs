//! Sessions and persistence for Whyline.
//!
//! This crate provides:
//! - [`Session`] - A trace shared between producer and query threads
//! - [`SessionConfig`] - Resolver settings and capacity hints
//! - Trace log serialization and deserialization

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod serialize;
pub mod session;

pub use serialize::{from_bytes, load_from_file, save_to_file, to_bytes};
pub use session::{Session, SessionConfig};
