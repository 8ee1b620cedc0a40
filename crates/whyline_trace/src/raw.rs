//! Untyped producer records.
//!
//! Some producers emit `{event_type, data}` maps keyed by the tracer's field
//! names (`var_name`, `func_name`, `obj_attr`, ...). [`RawEvent`] carries
//! such a record and converts it into a typed [`TraceEvent`].

use std::collections::BTreeMap;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use whyline_foundation::{Error, EventId, Result, Value};

use crate::event::{Argument, Decision, EventType, Location, Read, TraceEvent};

/// An event as a producer's untyped record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawEvent {
    /// The producer's type name, such as `assign` or `function_entry`.
    pub event_type: String,
    /// Event fields.
    pub data: BTreeMap<String, Value>,
}

impl RawEvent {
    /// Creates a record with no fields.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: BTreeMap::new(),
        }
    }

    /// Builder method to set a field.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Converts into a typed event.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEvent` for unknown types, missing required fields,
    /// and fields of the wrong kind.
    pub fn into_event(self) -> Result<TraceEvent> {
        TraceEvent::try_from(self)
    }
}

impl TryFrom<RawEvent> for TraceEvent {
    type Error = Error;

    fn try_from(raw: RawEvent) -> Result<Self> {
        let Some(event_type) = EventType::parse(&raw.event_type) else {
            return Err(Error::invalid_event(
                "unknown",
                format!("unrecognized event type `{}`", raw.event_type),
            ));
        };
        let f = Fields {
            kind: event_type.as_str(),
            data: &raw.data,
        };

        let event = match event_type {
            EventType::Assign => Self::Assign {
                target: f.text("var_name")?,
                value: f.required("value")?.clone(),
                reads: f.reads()?,
            },
            EventType::AttrAssign => {
                let object = f.text("obj")?;
                let attr = f.text_any(&["attr", "obj_attr"])?;
                // `obj_attr` may arrive qualified as `obj.attr`.
                let attr = match attr.rsplit_once('.') {
                    Some((_, name)) => Arc::from(name),
                    None => attr,
                };
                Self::AttrAssign {
                    object,
                    attr,
                    value: f.required("value")?.clone(),
                    reads: f.reads()?,
                }
            }
            EventType::SubscriptAssign => Self::SubscriptAssign {
                container: f.text("container")?,
                index: f.required("index")?.clone(),
                value: f.required("value")?.clone(),
                reads: f.reads()?,
            },
            EventType::SliceAssign => Self::SliceAssign {
                container: f.text("container")?,
                lower: f.int("lower")?,
                upper: f.int("upper")?,
                step: f.int("step")?,
                value: f.required("value")?.clone(),
                reads: f.reads()?,
            },
            EventType::AugAssign => {
                let text = f.text("target")?;
                let target = Location::parse(&text).ok_or_else(|| {
                    Error::invalid_event(f.kind, format!("cannot parse target `{text}`"))
                })?;
                Self::AugAssign {
                    target,
                    op: f.text("op")?,
                    value: f.required("value")?.clone(),
                    reads: f.reads()?,
                }
            }
            EventType::FunctionEntry => Self::FunctionEntry {
                function: f.text("func_name")?,
                args: f.arguments(true)?,
            },
            EventType::Return => Self::Return {
                function: f.optional_text(&["function", "func_name"])?,
                value: f.required("value")?.clone(),
                reads: f.reads()?,
            },
            EventType::Call => Self::Call {
                function: f.text("func_name")?,
                args: f.arguments(false)?,
            },
            EventType::Condition => Self::Condition {
                predicate: f.text_any(&["condition", "test"])?,
                truth: f.truth()?,
                reads: f.reads()?,
            },
            EventType::Branch => {
                let text = f.text("decision")?;
                let decision = Decision::parse(&text).ok_or_else(|| {
                    Error::invalid_event(f.kind, format!("unknown decision `{text}`"))
                })?;
                Self::Branch {
                    predicate: f.text_any(&["condition", "test"])?,
                    truth: f.truth()?,
                    decision,
                    reads: f.reads()?,
                }
            }
            EventType::LoopIteration => Self::LoopIteration {
                target: f.text("target")?,
                value: f.required_any(&["iter_value", "value"])?.clone(),
                reads: f.reads()?,
            },
            EventType::WhileCondition => Self::WhileCondition {
                predicate: f.text_any(&["condition", "test"])?,
                truth: f.truth()?,
                reads: f.reads()?,
            },
            EventType::RegionExit => Self::RegionExit,
        };
        event.validate()?;
        Ok(event)
    }
}

/// Parses a read written the way producers spell them: `x`, `obj.attr`,
/// `seq[0]`, `f()` for a call result, or `#12` for an explicit event.
#[must_use]
pub fn parse_read(text: &str) -> Option<Read> {
    let text = text.trim();
    if let Some(function) = text.strip_suffix("()") {
        return (!function.is_empty()).then(|| Read::result_of(function));
    }
    if let Some(id) = text.strip_prefix('#') {
        return id.parse().ok().map(|n| Read::Event(EventId(n)));
    }
    Location::parse(text).map(Read::At)
}

struct Fields<'a> {
    kind: &'static str,
    data: &'a BTreeMap<String, Value>,
}

impl Fields<'_> {
    fn required(&self, key: &str) -> Result<&Value> {
        self.data
            .get(key)
            .ok_or_else(|| Error::missing_field(self.kind, key))
    }

    fn required_any(&self, keys: &[&str]) -> Result<&Value> {
        keys.iter()
            .find_map(|k| self.data.get(*k))
            .ok_or_else(|| Error::missing_field(self.kind, keys.join("` or `").as_str()))
    }

    fn as_text(&self, key: &str, value: &Value) -> Result<Arc<str>> {
        match value {
            Value::Str(s) => Ok(Arc::clone(s)),
            other => Err(Error::invalid_event(
                self.kind,
                format!("field `{key}` must be a string, found {}", other.kind_name()),
            )),
        }
    }

    fn text(&self, key: &str) -> Result<Arc<str>> {
        self.as_text(key, self.required(key)?)
    }

    fn text_any(&self, keys: &[&str]) -> Result<Arc<str>> {
        match keys.iter().find(|k| self.data.contains_key(**k)) {
            Some(key) => self.text(key),
            None => Err(Error::missing_field(self.kind, keys.join("` or `").as_str())),
        }
    }

    fn optional_text(&self, keys: &[&str]) -> Result<Option<Arc<str>>> {
        match keys.iter().find_map(|k| self.data.get(*k).map(|v| (*k, v))) {
            None | Some((_, Value::None)) => Ok(None),
            Some((key, value)) => self.as_text(key, value).map(Some),
        }
    }

    fn int(&self, key: &str) -> Result<Option<i64>> {
        match self.data.get(key) {
            None | Some(Value::None) => Ok(None),
            Some(Value::Int(n)) => Ok(Some(*n)),
            Some(other) => Err(Error::invalid_event(
                self.kind,
                format!("field `{key}` must be an int, found {}", other.kind_name()),
            )),
        }
    }

    fn truth(&self) -> Result<bool> {
        let key = if self.data.contains_key("result") {
            "result"
        } else {
            "taken"
        };
        match self.required(key)? {
            Value::Bool(b) => Ok(*b),
            other => Err(Error::invalid_event(
                self.kind,
                format!("field `{key}` must be a bool, found {}", other.kind_name()),
            )),
        }
    }

    fn reads(&self) -> Result<Vec<Read>> {
        let Some(value) = self.data.get("reads") else {
            return Ok(Vec::new());
        };
        let items = value.as_list().ok_or_else(|| {
            Error::invalid_event(self.kind, "field `reads` must be a list")
        })?;
        items
            .iter()
            .map(|item| {
                item.as_str().and_then(parse_read).ok_or_else(|| {
                    Error::invalid_event(self.kind, format!("cannot parse read {item:?}"))
                })
            })
            .collect()
    }

    /// Zips `args` values with `params` names; unnamed positions become
    /// `arg0`, `arg1`, ... skipping any name a parameter already uses.
    /// Entry arguments may carry `sources`.
    fn arguments(&self, with_sources: bool) -> Result<Vec<Argument>> {
        let values = match self.data.get("args") {
            None | Some(Value::None) => &[][..],
            Some(v) => v.as_list().ok_or_else(|| {
                Error::invalid_event(self.kind, "field `args` must be a list")
            })?,
        };
        let names = self.data.get("params").and_then(Value::as_list).unwrap_or(&[]);
        let sources: &[Value] = if with_sources {
            self.data.get("sources").and_then(Value::as_list).unwrap_or(&[])
        } else {
            &[]
        };

        let mut taken: Vec<Arc<str>> = names
            .iter()
            .take(values.len())
            .filter_map(Value::as_str)
            .map(Arc::from)
            .collect();
        values
            .iter()
            .enumerate()
            .map(|(i, value)| -> Result<Argument> {
                let name = match names.get(i).and_then(Value::as_str) {
                    Some(name) => Arc::from(name),
                    None => {
                        let mut n = i;
                        let name: Arc<str> = loop {
                            let candidate = format!("arg{n}");
                            if !taken.iter().any(|t| **t == *candidate) {
                                break Arc::from(candidate);
                            }
                            n += 1;
                        };
                        taken.push(Arc::clone(&name));
                        name
                    }
                };
                let source = match sources.get(i) {
                    None | Some(Value::None) => None,
                    Some(item) => Some(item.as_str().and_then(parse_read).ok_or_else(|| {
                        Error::invalid_event(self.kind, format!("cannot parse source {item:?}"))
                    })?),
                };
                Ok(Argument {
                    name,
                    value: value.clone(),
                    source,
                })
            })
            .collect()
    }
}
