//! Error types for the Whyline system.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.
//! Only ingestion-time defects and persistence failures are errors; missing
//! evidence during a query is reported inside the answer instead.

use std::fmt;

use thiserror::Error;

use crate::id::EventId;

/// Result alias used throughout Whyline.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Whyline operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates an invalid event error.
    #[must_use]
    pub fn invalid_event(event_type: &'static str, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidEvent {
            event_type,
            reason: reason.into(),
        })
    }

    /// Creates a missing field error for an event record.
    #[must_use]
    pub fn missing_field(event_type: &'static str, field: &str) -> Self {
        Self::invalid_event(event_type, format!("missing required field `{field}`"))
    }

    /// Creates a non-causal edge error.
    #[must_use]
    pub fn non_causal_edge(from: EventId, to: EventId, kind: &'static str) -> Self {
        Self::new(ErrorKind::NonCausalEdge { from, to, kind })
    }

    /// Creates an unknown event error.
    #[must_use]
    pub fn unknown_event(id: EventId) -> Self {
        Self::new(ErrorKind::UnknownEvent(id))
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization(message.into()))
    }

    /// Creates an I/O error.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io(message.into()))
    }

    /// Returns true if the offending event was rejected and not stored.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self.kind, ErrorKind::InvalidEvent { .. })
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// An ingested event is malformed. It was rejected and not stored.
    #[error("invalid {event_type} event: {reason}")]
    InvalidEvent {
        /// The event type name as the producer spells it.
        event_type: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// A synthesized dependency points forward in time or at itself.
    ///
    /// The event is stored; only the offending edge is dropped.
    #[error("non-causal {kind} edge from {from} to {to}")]
    NonCausalEdge {
        /// The dependent event.
        from: EventId,
        /// The claimed dependency.
        to: EventId,
        /// Edge kind name.
        kind: &'static str,
    },

    /// No event with this sequence id exists.
    #[error("unknown event {0}")]
    UnknownEvent(EventId),

    /// Encoding or decoding a persisted trace failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Reading or writing a trace file failed.
    #[error("io error: {0}")]
    Io(String),
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Source file reported by the producer.
    pub filename: Option<String>,
    /// Line number reported by the producer.
    pub lineno: Option<u32>,
    /// Position of the record within a replayed trace.
    pub record: Option<usize>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source location.
    #[must_use]
    pub fn with_site(mut self, filename: impl Into<String>, lineno: u32) -> Self {
        self.filename = Some(filename.into());
        self.lineno = Some(lineno);
        self
    }

    /// Sets the record position.
    #[must_use]
    pub fn with_record(mut self, index: usize) -> Self {
        self.record = Some(index);
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(filename) = &self.filename {
            write!(f, "at {filename}")?;
            if let Some(line) = self.lineno {
                write!(f, ":{line}")?;
            }
        }
        if let Some(index) = self.record {
            if self.filename.is_some() {
                write!(f, " ")?;
            }
            write!(f, "(record {index})")?;
        }
        Ok(())
    }
}
