//! Trace persistence using `MessagePack`.
//!
//! Only the accepted event log is written: typed events with their origins,
//! in sequence order. Frames, indexes, and dependency edges are derived
//! state and are rebuilt by replaying the log through ingestion on load.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use whyline_foundation::{Error, Result};
use whyline_trace::{EventOrigin, TraceEngine, TraceEvent};

/// Version tag written into every trace file.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct LoggedEventRef<'a> {
    event: &'a TraceEvent,
    origin: &'a EventOrigin,
}

#[derive(Serialize)]
struct TraceFileRef<'a> {
    format: u32,
    events: Vec<LoggedEventRef<'a>>,
}

#[derive(Deserialize)]
struct LoggedEvent {
    event: TraceEvent,
    origin: EventOrigin,
}

#[derive(Deserialize)]
struct TraceFile {
    format: u32,
    events: Vec<LoggedEvent>,
}

/// Serializes an engine's event log to bytes using `MessagePack` format.
///
/// Uses named serialization to preserve struct field names.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_bytes(engine: &TraceEngine) -> Result<Vec<u8>> {
    let file = TraceFileRef {
        format: FORMAT_VERSION,
        events: engine
            .log()
            .map(|(event, origin)| LoggedEventRef { event, origin })
            .collect(),
    };
    let bytes = rmp_serde::to_vec_named(&file).map_err(|e| Error::serialization(e.to_string()))?;
    debug!(events = file.events.len(), bytes = bytes.len(), "trace encoded");
    Ok(bytes)
}

/// Decodes an event log without replaying it.
///
/// # Errors
///
/// Returns an error if the bytes are not a trace log of a supported format.
pub fn decode(bytes: &[u8]) -> Result<Vec<(TraceEvent, EventOrigin)>> {
    let file: TraceFile =
        rmp_serde::from_slice(bytes).map_err(|e| Error::serialization(e.to_string()))?;
    if file.format != FORMAT_VERSION {
        return Err(Error::serialization(format!(
            "unsupported trace format {} (expected {FORMAT_VERSION})",
            file.format
        )));
    }
    Ok(file
        .events
        .into_iter()
        .map(|logged| (logged.event, logged.origin))
        .collect())
}

/// Deserializes an event log and replays it into a fresh engine.
///
/// # Errors
///
/// Returns an error if decoding fails or an event is rejected on replay.
pub fn from_bytes(bytes: &[u8]) -> Result<TraceEngine> {
    let events = decode(bytes)?;
    let count = events.len();
    let engine = TraceEngine::replay(events)?;
    debug!(events = count, edges = engine.graph().edge_count(), "trace replayed");
    Ok(engine)
}

/// Saves an engine's event log to a file using `MessagePack` format.
///
/// Creates the file if it doesn't exist, or overwrites it if it does.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to,
/// or if serialization fails.
pub fn save_to_file<P: AsRef<Path>>(engine: &TraceEngine, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .map_err(|e| Error::io(format!("failed to create file '{}': {e}", path.display())))?;

    let mut writer = BufWriter::new(file);
    let bytes = to_bytes(engine)?;

    writer
        .write_all(&bytes)
        .map_err(|e| Error::io(format!("failed to write to file '{}': {e}", path.display())))?;
    writer
        .flush()
        .map_err(|e| Error::io(format!("failed to flush file '{}': {e}", path.display())))?;

    debug!(path = %path.display(), "trace saved");
    Ok(())
}

/// Loads a `MessagePack` trace file and replays it.
///
/// # Errors
///
/// Returns an error if the file cannot be read, decoding fails, or an event
/// is rejected on replay.
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<TraceEngine> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| Error::io(format!("failed to open file '{}': {e}", path.display())))?;

    let mut reader = BufReader::new(file);
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| Error::io(format!("failed to read file '{}': {e}", path.display())))?;

    debug!(path = %path.display(), bytes = bytes.len(), "trace loaded");
    from_bytes(&bytes)
}
