//! Call stack reconstruction.
//!
//! Frames are activations of traced functions. They live in an append-only
//! arena and refer to each other by [`FrameId`]; each producer thread has
//! its own stack of open frames.

use std::collections::HashMap;
use std::sync::Arc;

use whyline_foundation::{EventId, FrameId, ThreadId};

/// Name of the module-level frame.
pub const ROOT_FUNCTION: &str = "<module>";

/// Lifecycle of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    /// Still executing.
    Open,
    /// Ended by the given RETURN event.
    Returned(EventId),
    /// Popped because an outer frame returned first (an exception or other
    /// non-local exit). Carries the RETURN that unwound it.
    Abandoned(EventId),
}

/// One call activation.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Arena id.
    pub id: FrameId,
    /// Function name.
    pub function: Arc<str>,
    /// Calling frame; `None` only for the root.
    pub parent: Option<FrameId>,
    /// Thread the activation ran on.
    pub thread: ThreadId,
    /// The FUNCTION_ENTRY event, `None` for the root.
    pub entry: Option<EventId>,
    /// The CALL event linked to this activation, if any.
    pub call_site: Option<EventId>,
    state: FrameState,
    inconsistent_since: Option<EventId>,
}

impl Frame {
    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> FrameState {
        self.state
    }

    /// Returns true if the frame has not ended.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.state, FrameState::Open)
    }

    /// The RETURN event that ended this frame normally.
    #[must_use]
    pub const fn return_event(&self) -> Option<EventId> {
        match self.state {
            FrameState::Returned(id) => Some(id),
            _ => None,
        }
    }

    /// First event after which this frame's reconstruction is unreliable.
    #[must_use]
    pub const fn inconsistent_since(&self) -> Option<EventId> {
        self.inconsistent_since
    }

    /// Returns true if the frame never returned normally. The root frame is
    /// never considered unterminated.
    #[must_use]
    pub fn is_unterminated(&self) -> bool {
        !self.id.is_root() && self.return_event().is_none()
    }
}

/// A CALL that has not yet been matched against the next event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingCall {
    /// The CALL event.
    pub event: EventId,
    /// Frame the call was made from.
    pub frame: FrameId,
    /// Called function.
    pub function: Arc<str>,
}

/// Reconstructs activations from entry, call, and return events.
pub struct CallStack {
    frames: Vec<Frame>,
    open: HashMap<ThreadId, Vec<FrameId>>,
    results: HashMap<FrameId, HashMap<Arc<str>, EventId>>,
    pending: HashMap<ThreadId, PendingCall>,
    linked: HashMap<EventId, FrameId>,
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new()
    }
}

impl CallStack {
    /// Creates a call stack holding only the root frame.
    #[must_use]
    pub fn new() -> Self {
        let root = Frame {
            id: FrameId::ROOT,
            function: Arc::from(ROOT_FUNCTION),
            parent: None,
            thread: ThreadId::MAIN,
            entry: None,
            call_site: None,
            state: FrameState::Open,
            inconsistent_since: None,
        };
        Self {
            frames: vec![root],
            open: HashMap::new(),
            results: HashMap::new(),
            pending: HashMap::new(),
            linked: HashMap::new(),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Looks up a frame.
    #[must_use]
    pub fn get(&self, frame: FrameId) -> Option<&Frame> {
        self.frames.get(frame.index())
    }

    /// Iterates over every frame ever created, root first.
    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    /// Number of frames ever created, including the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false: the root frame exists from the start.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of frames currently open across all threads (excluding root).
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.open.values().map(Vec::len).sum()
    }

    /// The innermost open frame on a thread.
    #[must_use]
    pub fn current(&self, thread: ThreadId) -> FrameId {
        self.open
            .get(&thread)
            .and_then(|stack| stack.last().copied())
            .unwrap_or(FrameId::ROOT)
    }

    /// The frame and its callers, innermost first, ending at the root.
    pub fn lineage(&self, frame: FrameId) -> impl Iterator<Item = FrameId> + '_ {
        std::iter::successors(Some(frame), |f| self.get(*f).and_then(|fr| fr.parent))
    }

    /// Finds the open frame a RETURN on `thread` closes.
    ///
    /// With a function name, the innermost open frame of that function;
    /// without one, the innermost open frame. The root is never returned.
    #[must_use]
    pub fn find_returning(&self, thread: ThreadId, function: Option<&str>) -> Option<FrameId> {
        let stack = self.open.get(&thread)?;
        match function {
            None => stack.last().copied(),
            Some(name) => stack
                .iter()
                .rev()
                .copied()
                .find(|f| self.get(*f).is_some_and(|fr| &*fr.function == name)),
        }
    }

    /// The most recent result of calling `function` from `frame`: a CALL in
    /// `frame` or the RETURN of a child activation, whichever came last.
    #[must_use]
    pub fn latest_result(&self, frame: FrameId, function: &str) -> Option<EventId> {
        self.results.get(&frame)?.get(function).copied()
    }

    /// Returns true if `call` was never linked to a traced activation.
    #[must_use]
    pub fn is_opaque(&self, call: EventId) -> bool {
        !self.linked.contains_key(&call)
    }

    /// The activation a CALL event was linked to.
    #[must_use]
    pub fn linked_frame(&self, call: EventId) -> Option<FrameId> {
        self.linked.get(&call).copied()
    }

    /// Returns the first frame in `frame`'s lineage whose reconstruction was
    /// already unreliable at `at`, with the event it became unreliable at.
    #[must_use]
    pub fn unbalanced_at(&self, frame: FrameId, at: EventId) -> Option<(FrameId, EventId)> {
        self.lineage(frame).find_map(|f| {
            self.get(f)
                .and_then(Frame::inconsistent_since)
                .filter(|since| *since <= at)
                .map(|since| (f, since))
        })
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Opens a frame for a FUNCTION_ENTRY on `thread`.
    pub fn enter(
        &mut self,
        function: Arc<str>,
        thread: ThreadId,
        entry: EventId,
        call_site: Option<EventId>,
    ) -> FrameId {
        let parent = self.current(thread);
        let id = FrameId(u32::try_from(self.frames.len()).unwrap_or(u32::MAX));
        self.frames.push(Frame {
            id,
            function,
            parent: Some(parent),
            thread,
            entry: Some(entry),
            call_site,
            state: FrameState::Open,
            inconsistent_since: None,
        });
        self.open.entry(thread).or_default().push(id);
        if let Some(call) = call_site {
            self.linked.insert(call, id);
        }
        id
    }

    /// Closes `frame` with the RETURN `at`. Frames above it on the same
    /// thread are abandoned; their ids are returned.
    pub fn close(&mut self, thread: ThreadId, frame: FrameId, at: EventId) -> Vec<FrameId> {
        let mut abandoned = Vec::new();
        if let Some(stack) = self.open.get_mut(&thread) {
            while let Some(top) = stack.pop() {
                if top == frame {
                    break;
                }
                abandoned.push(top);
            }
        }
        for f in &abandoned {
            if let Some(fr) = self.frames.get_mut(f.index()) {
                fr.state = FrameState::Abandoned(at);
            }
        }
        if let Some(fr) = self.frames.get_mut(frame.index()) {
            fr.state = FrameState::Returned(at);
            if let Some(parent) = fr.parent {
                self.results
                    .entry(parent)
                    .or_default()
                    .insert(Arc::clone(&fr.function), at);
            }
        }
        abandoned
    }

    /// Flags `frame` as unreliable from `at` onward. Only the first mark
    /// sticks.
    pub fn mark_unbalanced(&mut self, frame: FrameId, at: EventId) {
        if let Some(fr) = self.frames.get_mut(frame.index()) {
            fr.inconsistent_since.get_or_insert(at);
        }
    }

    /// Records a CALL made from `frame` and holds it pending until the next
    /// event on `thread`.
    pub fn record_call(&mut self, thread: ThreadId, frame: FrameId, function: Arc<str>, at: EventId) {
        self.results
            .entry(frame)
            .or_default()
            .insert(Arc::clone(&function), at);
        self.pending.insert(
            thread,
            PendingCall {
                event: at,
                frame,
                function,
            },
        );
    }

    /// Takes the pending CALL for a thread. The pending slot is consumed by
    /// whatever event comes next on that thread.
    pub fn take_pending(&mut self, thread: ThreadId) -> Option<PendingCall> {
        self.pending.remove(&thread)
    }
}
