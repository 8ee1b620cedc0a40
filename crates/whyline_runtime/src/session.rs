//! A shared, thread-safe trace session.
//!
//! The session is the single writer / many readers boundary around a
//! [`TraceEngine`]. Ingestion takes the write lock for the whole event
//! (store, indexes, and edges), so every question sees a consistent trace.
//! Questions take the read lock and may run concurrently.

use std::path::Path;

use parking_lot::RwLock;
use tracing::{debug, warn};

use whyline_debug::{Answer, Question, QuestionResolver, ResolverConfig};
use whyline_foundation::{EventId, Result};
use whyline_trace::{
    EventOrigin, Ingested, RawEvent, TraceEngine, TraceEvent, TraceRecord, TraceStats,
};

use crate::serialize;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a [`Session`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// How questions are resolved.
    pub resolver: ResolverConfig,

    /// Expected number of events (0 = no preallocation).
    pub capacity: usize,
}

impl SessionConfig {
    /// Creates a configuration for interactive debugging: bounded answers.
    #[must_use]
    pub fn interactive() -> Self {
        Self {
            resolver: ResolverConfig::interactive(),
            capacity: 0,
        }
    }

    /// Creates a configuration for recording long traces up front.
    #[must_use]
    pub fn recording(capacity: usize) -> Self {
        Self {
            resolver: ResolverConfig::default(),
            capacity,
        }
    }

    /// Builder method to set the resolver configuration.
    #[must_use]
    pub fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    /// Builder method to set the capacity hint.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

// =============================================================================
// Session
// =============================================================================

/// A trace being recorded and questioned, shareable across threads.
pub struct Session {
    engine: RwLock<TraceEngine>,
    config: SessionConfig,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates an empty session with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    /// Creates an empty session.
    #[must_use]
    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            engine: RwLock::new(TraceEngine::with_capacity(config.capacity)),
            config,
        }
    }

    /// Wraps an existing engine.
    #[must_use]
    pub fn from_engine(engine: TraceEngine, config: SessionConfig) -> Self {
        Self {
            engine: RwLock::new(engine),
            config,
        }
    }

    /// The session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Consumes the session and returns its engine.
    #[must_use]
    pub fn into_engine(self) -> TraceEngine {
        self.engine.into_inner()
    }

    // =========================================================================
    // Recording
    // =========================================================================

    /// Appends an event from the main thread with no source site.
    ///
    /// # Errors
    ///
    /// See [`TraceEngine::ingest_from`].
    pub fn ingest(&self, event: TraceEvent) -> Result<Ingested> {
        self.append(event, EventOrigin::default())
    }

    /// Appends one event under the write lock.
    ///
    /// # Errors
    ///
    /// See [`TraceEngine::ingest_from`].
    pub fn append(&self, event: TraceEvent, origin: EventOrigin) -> Result<Ingested> {
        self.engine.write().ingest_from(event, origin)
    }

    /// Converts and appends an untyped producer record.
    ///
    /// # Errors
    ///
    /// See [`TraceEngine::ingest_raw`].
    pub fn append_raw(&self, raw: RawEvent, origin: EventOrigin) -> Result<Ingested> {
        self.engine.write().ingest_raw(raw, origin)
    }

    /// Appends a batch of events under one write lock. Stops at the first
    /// rejected event; non-causal edges do not stop the batch.
    ///
    /// # Errors
    ///
    /// Returns the first `InvalidEvent`, with the receipts so far lost.
    pub fn append_all<I>(&self, events: I) -> Result<Vec<Ingested>>
    where
        I: IntoIterator<Item = (TraceEvent, EventOrigin)>,
    {
        let mut engine = self.engine.write();
        let mut receipts = Vec::new();
        for (event, origin) in events {
            match engine.ingest_from(event, origin) {
                Ok(receipt) => receipts.push(receipt),
                Err(err) if err.is_rejection() => return Err(err),
                Err(err) => warn!(error = %err, "event kept with non-causal dependencies"),
            }
        }
        Ok(receipts)
    }

    // =========================================================================
    // Questions
    // =========================================================================

    /// Answers a question with the session's resolver configuration.
    #[must_use]
    pub fn ask(&self, question: &Question) -> Answer {
        let engine = self.engine.read();
        QuestionResolver::with_config(&engine, self.config.resolver.clone()).ask(question)
    }

    /// Runs `f` with shared access to the engine.
    pub fn with_engine<R>(&self, f: impl FnOnce(&TraceEngine) -> R) -> R {
        f(&*self.engine.read())
    }

    /// A copy of one stored event.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEvent` if `id` was never assigned.
    pub fn event(&self, id: EventId) -> Result<TraceRecord> {
        self.engine.read().store().require(id).cloned()
    }

    /// Summary counts.
    #[must_use]
    pub fn stats(&self) -> TraceStats {
        self.engine.read().stats()
    }

    /// Number of stored events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.engine.read().len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.engine.read().is_empty()
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Serializes the accepted event log.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serialize::to_bytes(&self.engine.read())
    }

    /// Rebuilds a session by replaying a serialized event log.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails or an event is rejected on replay.
    pub fn from_bytes(bytes: &[u8], config: SessionConfig) -> Result<Self> {
        let engine = serialize::from_bytes(bytes)?;
        Ok(Self::from_engine(engine, config))
    }

    /// Saves the accepted event log to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let engine = self.engine.read();
        serialize::save_to_file(&engine, path)?;
        debug!(events = engine.len(), "session saved");
        Ok(())
    }

    /// Loads a session from a saved event log.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, decoding fails, or an
    /// event is rejected on replay.
    pub fn load<P: AsRef<Path>>(path: P, config: SessionConfig) -> Result<Self> {
        let engine = serialize::load_from_file(path)?;
        debug!(events = engine.len(), "session loaded");
        Ok(Self::from_engine(engine, config))
    }
}
