//! Value, interval and statistics types shared by the store and its readers.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Nanosecond-resolution timestamp.
pub type Timestamp = i64;

/// Stable handle of one node in the attribute tree.
///
/// Quarks are arena indices: they are never reused for a different path and
/// stay valid for the lifetime of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quark(u32);

impl Quark {
    /// The root of the attribute tree. It has an empty path and never holds
    /// intervals.
    pub const ROOT: Quark = Quark(0);

    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Quark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value held by an attribute during an interval.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StateValue {
    /// Explicitly absent. Distinct from an attribute that was never set,
    /// which has no interval at all.
    #[default]
    Null,
    Int(i32),
    Long(i64),
    Str(String),
    Double(f64),
}

impl StateValue {
    pub fn is_null(&self) -> bool {
        matches!(self, StateValue::Null)
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            StateValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view of `Int` and `Long` values.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            StateValue::Int(v) => Some(i64::from(*v)),
            StateValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            StateValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StateValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Null => write!(f, "null"),
            StateValue::Int(v) => write!(f, "{}", v),
            StateValue::Long(v) => write!(f, "{}", v),
            StateValue::Str(s) => write!(f, "{}", s),
            StateValue::Double(v) => write!(f, "{}", v),
        }
    }
}

impl From<i32> for StateValue {
    fn from(v: i32) -> Self {
        StateValue::Int(v)
    }
}

impl From<i64> for StateValue {
    fn from(v: i64) -> Self {
        StateValue::Long(v)
    }
}

impl From<f64> for StateValue {
    fn from(v: f64) -> Self {
        StateValue::Double(v)
    }
}

impl From<&str> for StateValue {
    fn from(v: &str) -> Self {
        StateValue::Str(v.to_string())
    }
}

impl From<String> for StateValue {
    fn from(v: String) -> Self {
        StateValue::Str(v)
    }
}

/// A closed time range `[start, end]` (both inclusive) during which one
/// attribute held one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateInterval {
    pub start: Timestamp,
    pub end: Timestamp,
    pub quark: Quark,
    pub value: StateValue,
}

impl StateInterval {
    pub fn new(start: Timestamp, end: Timestamp, quark: Quark, value: StateValue) -> Self {
        debug_assert!(start <= end, "interval start {} after end {}", start, end);
        Self {
            start,
            end,
            quark,
            value,
        }
    }

    #[inline]
    pub fn contains(&self, time: Timestamp) -> bool {
        self.start <= time && time <= self.end
    }

    #[inline]
    pub fn intersects(&self, start: Timestamp, end: Timestamp) -> bool {
        self.start <= end && self.end >= start
    }

    /// Length of the span. Unsigned, as `end - start` can exceed `i64::MAX`.
    pub fn duration(&self) -> u64 {
        self.end.abs_diff(self.start)
    }
}

impl fmt::Display for StateInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}], attribute = {}, value = {}",
            self.start, self.end, self.quark, self.value
        )
    }
}

/// Store statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of attributes, root excluded
    pub attribute_count: usize,
    /// Number of committed (closed) intervals
    pub interval_count: usize,
    /// Number of accepted `modify_attribute` calls
    pub modifications_count: u64,
    /// Modifications that repeated the current value and created nothing
    pub coalesced_count: u64,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub built: bool,
}
