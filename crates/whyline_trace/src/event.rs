//! Trace event and record types.
//!
//! [`TraceEvent`] is what a producer emits; [`TraceRecord`] is what the
//! store keeps once the event has been sequenced, placed in a frame, and
//! given its control-stack snapshot.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use whyline_foundation::{Error, EventId, FrameId, Result, ThreadId, Value};

use crate::control::ControlSnapshot;

// =============================================================================
// Locations and Reads
// =============================================================================

/// A storage location a write can target or a read can name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Location {
    /// A plain variable binding.
    Variable(Arc<str>),
    /// An attribute of the object bound to `object`.
    Attribute {
        /// Name of the variable holding the object.
        object: Arc<str>,
        /// Attribute name.
        attr: Arc<str>,
    },
    /// An element of the container bound to `container`.
    Element {
        /// Name of the variable holding the container.
        container: Arc<str>,
        /// The subscript.
        index: Value,
    },
}

impl Location {
    /// A variable location.
    #[must_use]
    pub fn var(name: impl Into<Arc<str>>) -> Self {
        Self::Variable(name.into())
    }

    /// An attribute location.
    #[must_use]
    pub fn attr(object: impl Into<Arc<str>>, attr: impl Into<Arc<str>>) -> Self {
        Self::Attribute {
            object: object.into(),
            attr: attr.into(),
        }
    }

    /// An element location.
    #[must_use]
    pub fn element(container: impl Into<Arc<str>>, index: impl Into<Value>) -> Self {
        Self::Element {
            container: container.into(),
            index: index.into(),
        }
    }

    /// Returns the name of the variable this location hangs off.
    #[must_use]
    pub fn root(&self) -> &Arc<str> {
        match self {
            Self::Variable(name) => name,
            Self::Attribute { object, .. } => object,
            Self::Element { container, .. } => container,
        }
    }

    /// Returns the root variable for attribute and element locations.
    ///
    /// A plain variable has no separate root and yields `None`.
    #[must_use]
    pub fn root_variable(&self) -> Option<Location> {
        match self {
            Self::Variable(_) => None,
            Self::Attribute { object: root, .. } | Self::Element { container: root, .. } => {
                Some(Self::Variable(Arc::clone(root)))
            }
        }
    }

    /// Returns true for plain variables.
    #[must_use]
    pub const fn is_variable(&self) -> bool {
        matches!(self, Self::Variable(_))
    }

    /// Parses the textual forms `name`, `obj.attr`, and `seq[index]`.
    ///
    /// Integer subscripts become [`Value::Int`]; quoted or bare subscripts
    /// become strings. Returns `None` for empty or malformed text.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(open) = text.find('[') {
            let inner = text[open + 1..].strip_suffix(']')?;
            let container = &text[..open];
            if container.is_empty() || inner.is_empty() {
                return None;
            }
            let index = inner.parse::<i64>().map_or_else(
                |_| Value::from(inner.trim_matches(|c| c == '"' || c == '\'')),
                Value::Int,
            );
            return Some(Self::element(container, index));
        }
        if let Some((object, attr)) = text.rsplit_once('.') {
            if object.is_empty() || attr.is_empty() {
                return None;
            }
            return Some(Self::attr(object, attr));
        }
        (!text.is_empty()).then(|| Self::var(text))
    }

    pub(crate) fn has_empty_name(&self) -> bool {
        match self {
            Self::Variable(name) => name.is_empty(),
            Self::Attribute { object, attr } => object.is_empty() || attr.is_empty(),
            Self::Element { container, .. } => container.is_empty(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable(name) => write!(f, "{name}"),
            Self::Attribute { object, attr } => write!(f, "{object}.{attr}"),
            Self::Element { container, index } => write!(f, "{container}[{index:?}]"),
        }
    }
}

/// Something an event's value was computed from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Read {
    /// The current value of a location.
    At(Location),
    /// The result of the most recent call to the named function.
    CallResult(Arc<str>),
    /// A specific earlier event the producer attributes the value to.
    Event(EventId),
}

impl Read {
    /// Reads a variable.
    #[must_use]
    pub fn var(name: impl Into<Arc<str>>) -> Self {
        Self::At(Location::var(name))
    }

    /// Reads an attribute.
    #[must_use]
    pub fn attr(object: impl Into<Arc<str>>, attr: impl Into<Arc<str>>) -> Self {
        Self::At(Location::attr(object, attr))
    }

    /// Reads a container element.
    #[must_use]
    pub fn element(container: impl Into<Arc<str>>, index: impl Into<Value>) -> Self {
        Self::At(Location::element(container, index))
    }

    /// Reads the result of a call.
    #[must_use]
    pub fn result_of(function: impl Into<Arc<str>>) -> Self {
        Self::CallResult(function.into())
    }
}

impl fmt::Display for Read {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(location) => write!(f, "{location}"),
            Self::CallResult(function) => write!(f, "{function}()"),
            Self::Event(id) => write!(f, "{id}"),
        }
    }
}

impl From<Location> for Read {
    fn from(location: Location) -> Self {
        Self::At(location)
    }
}

/// One argument of a call or function entry.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Argument {
    /// Parameter name the value is bound to in the callee.
    pub name: Arc<str>,
    /// The argument value.
    pub value: Value,
    /// Caller-side expression the value came from; `None` for literals.
    pub source: Option<Read>,
}

impl Argument {
    /// A literal argument.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            source: None,
        }
    }

    /// Sets the caller-side source of the argument.
    #[must_use]
    pub fn from_read(mut self, source: Read) -> Self {
        self.source = Some(source);
        self
    }
}

// =============================================================================
// Branch Decision
// =============================================================================

/// Which block a BRANCH event entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Decision {
    /// The `if` body.
    If,
    /// An `elif` body.
    Elif,
    /// The `else` body.
    Else,
    /// No body; the statement was skipped.
    Skip,
}

impl Decision {
    /// The producer's spelling of the decision.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::If => "if_block",
            Self::Elif => "elif_block",
            Self::Else => "else_block",
            Self::Skip => "skip_block",
        }
    }

    /// Parses a producer decision, accepting the short forms `if`, `else`, ...
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim_end_matches("_block") {
            "if" => Some(Self::If),
            "elif" => Some(Self::Elif),
            "else" => Some(Self::Else),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }

    /// Returns true if the decision enters a region.
    #[must_use]
    pub const fn opens_region(self) -> bool {
        !matches!(self, Self::Skip)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Event Type
// =============================================================================

/// The type tag of a trace event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EventType {
    /// Plain variable assignment.
    Assign,
    /// Attribute assignment.
    AttrAssign,
    /// Subscript assignment.
    SubscriptAssign,
    /// Slice assignment.
    SliceAssign,
    /// Augmented assignment.
    AugAssign,
    /// Entry into a traced function.
    FunctionEntry,
    /// Return from a traced function.
    Return,
    /// A call, possibly into untraced code.
    Call,
    /// Evaluation of a conditional test.
    Condition,
    /// A branch decision with its integrated condition.
    Branch,
    /// One iteration of a `for` loop.
    LoopIteration,
    /// Evaluation of a `while` loop test.
    WhileCondition,
    /// End of the innermost conditional or loop region.
    RegionExit,
}

impl EventType {
    /// Every event type, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::Assign,
        Self::AttrAssign,
        Self::SubscriptAssign,
        Self::SliceAssign,
        Self::AugAssign,
        Self::FunctionEntry,
        Self::Return,
        Self::Call,
        Self::Condition,
        Self::Branch,
        Self::LoopIteration,
        Self::WhileCondition,
        Self::RegionExit,
    ];

    /// The producer's spelling of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Assign => "assign",
            Self::AttrAssign => "attr_assign",
            Self::SubscriptAssign => "subscript_assign",
            Self::SliceAssign => "slice_assign",
            Self::AugAssign => "aug_assign",
            Self::FunctionEntry => "function_entry",
            Self::Return => "return",
            Self::Call => "call",
            Self::Condition => "condition",
            Self::Branch => "branch",
            Self::LoopIteration => "loop_iteration",
            Self::WhileCondition => "while_condition",
            Self::RegionExit => "region_exit",
        }
    }

    /// Parses a producer type name (case-insensitive).
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(text))
    }

    /// Returns true for the assignment family.
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(
            self,
            Self::Assign
                | Self::AttrAssign
                | Self::SubscriptAssign
                | Self::SliceAssign
                | Self::AugAssign
        )
    }

    /// Returns true for events that evaluate a predicate.
    #[must_use]
    pub const fn is_evaluation(self) -> bool {
        matches!(self, Self::Condition | Self::Branch | Self::WhileCondition)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Trace Event
// =============================================================================

/// Events a producer can emit.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TraceEvent {
    /// `target = <expr>`.
    Assign {
        /// Variable being bound.
        target: Arc<str>,
        /// The assigned value.
        value: Value,
        /// Locations the right-hand side read.
        reads: Vec<Read>,
    },

    /// `object.attr = <expr>`.
    AttrAssign {
        /// Variable holding the object.
        object: Arc<str>,
        /// Attribute name.
        attr: Arc<str>,
        /// The assigned value.
        value: Value,
        /// Locations the right-hand side read.
        reads: Vec<Read>,
    },

    /// `container[index] = <expr>`.
    SubscriptAssign {
        /// Variable holding the container.
        container: Arc<str>,
        /// The subscript.
        index: Value,
        /// The assigned value.
        value: Value,
        /// Locations the right-hand side and subscript read.
        reads: Vec<Read>,
    },

    /// `container[lower:upper:step] = <expr>`.
    SliceAssign {
        /// Variable holding the container.
        container: Arc<str>,
        /// Slice start.
        lower: Option<i64>,
        /// Slice end.
        upper: Option<i64>,
        /// Slice step.
        step: Option<i64>,
        /// The assigned value.
        value: Value,
        /// Locations the right-hand side read.
        reads: Vec<Read>,
    },

    /// `target op= <expr>`. The target's previous value is an implicit read.
    AugAssign {
        /// The updated location.
        target: Location,
        /// Operator text such as `+=`.
        op: Arc<str>,
        /// The value after the update.
        value: Value,
        /// Locations the right-hand side read.
        reads: Vec<Read>,
    },

    /// A traced function began executing.
    FunctionEntry {
        /// Function name.
        function: Arc<str>,
        /// Parameter bindings.
        args: Vec<Argument>,
    },

    /// A traced function returned.
    Return {
        /// Function returning, if the producer knows it.
        function: Option<Arc<str>>,
        /// The returned value.
        value: Value,
        /// Locations the returned expression read.
        reads: Vec<Read>,
    },

    /// A call site. Untraced unless the callee's entry follows immediately.
    Call {
        /// Called function name.
        function: Arc<str>,
        /// Positional arguments.
        args: Vec<Argument>,
    },

    /// A conditional test was evaluated and its region entered.
    Condition {
        /// The predicate source text.
        predicate: Arc<str>,
        /// What it evaluated to.
        truth: bool,
        /// Locations the predicate read.
        reads: Vec<Read>,
    },

    /// A branch decision with its integrated condition.
    Branch {
        /// The predicate source text.
        predicate: Arc<str>,
        /// What it evaluated to.
        truth: bool,
        /// Which block was entered.
        decision: Decision,
        /// Locations the predicate read.
        reads: Vec<Read>,
    },

    /// A `for` loop bound its target for one iteration.
    LoopIteration {
        /// Loop variable.
        target: Arc<str>,
        /// Value bound for this iteration.
        value: Value,
        /// Locations the iterable read.
        reads: Vec<Read>,
    },

    /// A `while` test was evaluated.
    WhileCondition {
        /// The predicate source text.
        predicate: Arc<str>,
        /// What it evaluated to.
        truth: bool,
        /// Locations the predicate read.
        reads: Vec<Read>,
    },

    /// The innermost open conditional or loop region ended.
    RegionExit,
}

impl TraceEvent {
    /// Creates an ASSIGN event.
    #[must_use]
    pub fn assign(
        target: impl Into<Arc<str>>,
        value: impl Into<Value>,
        reads: impl IntoIterator<Item = Read>,
    ) -> Self {
        Self::Assign {
            target: target.into(),
            value: value.into(),
            reads: reads.into_iter().collect(),
        }
    }

    /// Creates an ATTR_ASSIGN event.
    #[must_use]
    pub fn attr_assign(
        object: impl Into<Arc<str>>,
        attr: impl Into<Arc<str>>,
        value: impl Into<Value>,
        reads: impl IntoIterator<Item = Read>,
    ) -> Self {
        Self::AttrAssign {
            object: object.into(),
            attr: attr.into(),
            value: value.into(),
            reads: reads.into_iter().collect(),
        }
    }

    /// Creates a SUBSCRIPT_ASSIGN event.
    #[must_use]
    pub fn subscript_assign(
        container: impl Into<Arc<str>>,
        index: impl Into<Value>,
        value: impl Into<Value>,
        reads: impl IntoIterator<Item = Read>,
    ) -> Self {
        Self::SubscriptAssign {
            container: container.into(),
            index: index.into(),
            value: value.into(),
            reads: reads.into_iter().collect(),
        }
    }

    /// Creates an AUG_ASSIGN event.
    #[must_use]
    pub fn aug_assign(
        target: Location,
        op: impl Into<Arc<str>>,
        value: impl Into<Value>,
        reads: impl IntoIterator<Item = Read>,
    ) -> Self {
        Self::AugAssign {
            target,
            op: op.into(),
            value: value.into(),
            reads: reads.into_iter().collect(),
        }
    }

    /// Creates a FUNCTION_ENTRY event.
    #[must_use]
    pub fn function_entry(
        function: impl Into<Arc<str>>,
        args: impl IntoIterator<Item = Argument>,
    ) -> Self {
        Self::FunctionEntry {
            function: function.into(),
            args: args.into_iter().collect(),
        }
    }

    /// Creates a RETURN event naming the returning function.
    #[must_use]
    pub fn return_from(
        function: impl Into<Arc<str>>,
        value: impl Into<Value>,
        reads: impl IntoIterator<Item = Read>,
    ) -> Self {
        Self::Return {
            function: Some(function.into()),
            value: value.into(),
            reads: reads.into_iter().collect(),
        }
    }

    /// Creates a CALL event.
    #[must_use]
    pub fn call(function: impl Into<Arc<str>>, args: impl IntoIterator<Item = Argument>) -> Self {
        Self::Call {
            function: function.into(),
            args: args.into_iter().collect(),
        }
    }

    /// Creates a CONDITION event.
    #[must_use]
    pub fn condition(
        predicate: impl Into<Arc<str>>,
        truth: bool,
        reads: impl IntoIterator<Item = Read>,
    ) -> Self {
        Self::Condition {
            predicate: predicate.into(),
            truth,
            reads: reads.into_iter().collect(),
        }
    }

    /// Creates a BRANCH event.
    #[must_use]
    pub fn branch(
        predicate: impl Into<Arc<str>>,
        truth: bool,
        decision: Decision,
        reads: impl IntoIterator<Item = Read>,
    ) -> Self {
        Self::Branch {
            predicate: predicate.into(),
            truth,
            decision,
            reads: reads.into_iter().collect(),
        }
    }

    /// Creates a LOOP_ITERATION event.
    #[must_use]
    pub fn loop_iteration(
        target: impl Into<Arc<str>>,
        value: impl Into<Value>,
        reads: impl IntoIterator<Item = Read>,
    ) -> Self {
        Self::LoopIteration {
            target: target.into(),
            value: value.into(),
            reads: reads.into_iter().collect(),
        }
    }

    /// Creates a WHILE_CONDITION event.
    #[must_use]
    pub fn while_condition(
        predicate: impl Into<Arc<str>>,
        truth: bool,
        reads: impl IntoIterator<Item = Read>,
    ) -> Self {
        Self::WhileCondition {
            predicate: predicate.into(),
            truth,
            reads: reads.into_iter().collect(),
        }
    }

    /// Returns the type tag.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        match self {
            Self::Assign { .. } => EventType::Assign,
            Self::AttrAssign { .. } => EventType::AttrAssign,
            Self::SubscriptAssign { .. } => EventType::SubscriptAssign,
            Self::SliceAssign { .. } => EventType::SliceAssign,
            Self::AugAssign { .. } => EventType::AugAssign,
            Self::FunctionEntry { .. } => EventType::FunctionEntry,
            Self::Return { .. } => EventType::Return,
            Self::Call { .. } => EventType::Call,
            Self::Condition { .. } => EventType::Condition,
            Self::Branch { .. } => EventType::Branch,
            Self::LoopIteration { .. } => EventType::LoopIteration,
            Self::WhileCondition { .. } => EventType::WhileCondition,
            Self::RegionExit => EventType::RegionExit,
        }
    }

    /// Returns the explicit reads carried by the event.
    #[must_use]
    pub fn reads(&self) -> &[Read] {
        match self {
            Self::Assign { reads, .. }
            | Self::AttrAssign { reads, .. }
            | Self::SubscriptAssign { reads, .. }
            | Self::SliceAssign { reads, .. }
            | Self::AugAssign { reads, .. }
            | Self::Return { reads, .. }
            | Self::Condition { reads, .. }
            | Self::Branch { reads, .. }
            | Self::LoopIteration { reads, .. }
            | Self::WhileCondition { reads, .. } => reads,
            Self::FunctionEntry { .. } | Self::Call { .. } | Self::RegionExit => &[],
        }
    }

    /// Returns the location this event writes, for the assignment family
    /// and loop targets.
    #[must_use]
    pub fn written_location(&self) -> Option<Location> {
        match self {
            Self::Assign { target, .. } | Self::LoopIteration { target, .. } => {
                Some(Location::Variable(Arc::clone(target)))
            }
            Self::AttrAssign { object, attr, .. } => {
                Some(Location::attr(Arc::clone(object), Arc::clone(attr)))
            }
            Self::SubscriptAssign {
                container, index, ..
            } => Some(Location::element(Arc::clone(container), index.clone())),
            Self::SliceAssign { container, .. } => Some(Location::Variable(Arc::clone(container))),
            Self::AugAssign { target, .. } => Some(target.clone()),
            _ => None,
        }
    }

    /// Returns the value carried by the event, if any.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Assign { value, .. }
            | Self::AttrAssign { value, .. }
            | Self::SubscriptAssign { value, .. }
            | Self::SliceAssign { value, .. }
            | Self::AugAssign { value, .. }
            | Self::Return { value, .. }
            | Self::LoopIteration { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Returns the function named by entry, call, and return events.
    #[must_use]
    pub fn function(&self) -> Option<&Arc<str>> {
        match self {
            Self::FunctionEntry { function, .. } | Self::Call { function, .. } => Some(function),
            Self::Return { function, .. } => function.as_ref(),
            _ => None,
        }
    }

    /// Returns the arguments of entry and call events.
    #[must_use]
    pub fn arguments(&self) -> &[Argument] {
        match self {
            Self::FunctionEntry { args, .. } | Self::Call { args, .. } => args,
            _ => &[],
        }
    }

    /// Checks that every required name is present and non-empty.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEvent` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let kind = self.event_type().as_str();
        let require = |field: &str, text: &str| {
            if text.trim().is_empty() {
                Err(Error::invalid_event(kind, format!("`{field}` is empty")))
            } else {
                Ok(())
            }
        };
        match self {
            Self::Assign { target, .. } => require("target", target)?,
            Self::AttrAssign { object, attr, .. } => {
                require("object", object)?;
                require("attr", attr)?;
            }
            Self::SubscriptAssign { container, .. } | Self::SliceAssign { container, .. } => {
                require("container", container)?;
            }
            Self::AugAssign { target, op, .. } => {
                if target.has_empty_name() {
                    return Err(Error::invalid_event(kind, format!("target `{target}` has an empty name")));
                }
                require("op", op)?;
            }
            Self::FunctionEntry { function, args } => {
                require("function", function)?;
                for (position, arg) in args.iter().enumerate() {
                    require("argument name", &arg.name)?;
                    if args[..position].iter().any(|earlier| earlier.name == arg.name) {
                        return Err(Error::invalid_event(
                            kind,
                            format!("parameter `{}` is bound twice", arg.name),
                        ));
                    }
                }
            }
            Self::Call { function, args } => {
                require("function", function)?;
                for arg in args {
                    require("argument name", &arg.name)?;
                }
            }
            Self::Return { function, .. } => {
                if let Some(function) = function {
                    require("function", function)?;
                }
            }
            Self::Condition { predicate, .. }
            | Self::Branch { predicate, .. }
            | Self::WhileCondition { predicate, .. } => require("predicate", predicate)?,
            Self::LoopIteration { target, .. } => require("target", target)?,
            Self::RegionExit => {}
        }
        let sources = self
            .reads()
            .iter()
            .chain(self.arguments().iter().filter_map(|a| a.source.as_ref()));
        for read in sources {
            let empty = match read {
                Read::At(location) => location.has_empty_name(),
                Read::CallResult(function) => function.trim().is_empty(),
                Read::Event(id) => id.get() == 0,
            };
            if empty {
                return Err(Error::invalid_event(kind, format!("read `{read}` is malformed")));
            }
        }
        Ok(())
    }

    /// Returns `(predicate, truth)` for predicate evaluations.
    #[must_use]
    pub fn predicate(&self) -> Option<(&Arc<str>, bool)> {
        match self {
            Self::Condition { predicate, truth, .. }
            | Self::Branch { predicate, truth, .. }
            | Self::WhileCondition { predicate, truth, .. } => Some((predicate, *truth)),
            _ => None,
        }
    }
}

// =============================================================================
// Event Origin
// =============================================================================

/// A position in the traced program's source.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SourceSite {
    /// Source file.
    pub filename: Arc<str>,
    /// Line number (1-indexed).
    pub lineno: u32,
}

impl SourceSite {
    /// Creates a source site.
    #[must_use]
    pub fn new(filename: impl Into<Arc<str>>, lineno: u32) -> Self {
        Self {
            filename: filename.into(),
            lineno,
        }
    }
}

impl fmt::Display for SourceSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.filename, self.lineno)
    }
}

/// Where an event came from: the producing thread and source position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventOrigin {
    /// Producer thread.
    pub thread: ThreadId,
    /// Source position, if the producer knows it.
    pub site: Option<SourceSite>,
}

impl EventOrigin {
    /// An origin on the main thread at the given line.
    #[must_use]
    pub fn at(filename: impl Into<Arc<str>>, lineno: u32) -> Self {
        Self {
            thread: ThreadId::MAIN,
            site: Some(SourceSite::new(filename, lineno)),
        }
    }

    /// Builder method to set the producing thread.
    #[must_use]
    pub fn on_thread(mut self, thread: ThreadId) -> Self {
        self.thread = thread;
        self
    }
}

// =============================================================================
// Trace Record
// =============================================================================

/// An event as stored: sequenced, framed, and snapshotted.
#[derive(Clone, Debug)]
pub struct TraceRecord {
    /// Sequence id assigned by the store.
    pub id: EventId,
    /// The frame the event belongs to.
    pub frame: FrameId,
    /// Producer thread and source position.
    pub origin: EventOrigin,
    /// The event itself.
    pub event: TraceEvent,
    /// Active predicates when the event was ingested.
    ///
    /// A prefix of `frame`'s control stack, except for `FUNCTION_ENTRY`:
    /// the entry belongs to the new callee frame but carries the caller's
    /// stack, since the call happened under the caller's predicates.
    pub control: ControlSnapshot,
}

impl TraceRecord {
    /// Returns the event type tag.
    #[must_use]
    pub fn event_type(&self) -> EventType {
        self.event.event_type()
    }

    /// Returns the source site, if known.
    #[must_use]
    pub fn site(&self) -> Option<&SourceSite> {
        self.origin.site.as_ref()
    }
}

// =============================================================================
// Tests
// =============================================================================
