//! Error types for the state history store.

use crate::types::{Quark, Timestamp};
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StateError>;

/// Errors reported by the attribute tree, the builder and the query engine.
///
/// Events that lack the fields a provider needs are not errors: providers
/// skip them silently.
#[derive(Debug, Error)]
pub enum StateError {
    /// Unknown attribute path or quark.
    #[error("attribute not found: {0}")]
    NotFound(String),

    /// A write for `quark` arrived earlier than its previous write.
    #[error("out of order insertion on quark {quark}: time {time} is before {last}")]
    OutOfOrderInsertion {
        quark: Quark,
        time: Timestamp,
        last: Timestamp,
    },

    /// The store was closed with `close_store` and is read-only.
    #[error("state store is closed")]
    StoreClosed,

    /// A range query with `start > end`.
    #[error("invalid range: start {start} is after end {end}")]
    InvalidRange { start: Timestamp, end: Timestamp },

    /// The requested time is outside the known history, or the store is not
    /// built yet.
    #[error("time {time} is out of range")]
    TimeOutOfRange { time: Timestamp },

    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StateError {
    fn from(e: serde_json::Error) -> Self {
        StateError::Serialization(e.to_string())
    }
}

#[cfg(feature = "toml")]
impl From<toml::de::Error> for StateError {
    fn from(e: toml::de::Error) -> Self {
        StateError::Serialization(e.to_string())
    }
}
