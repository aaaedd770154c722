//! Time-indexed attribute state store with hierarchical attributes, interval
//! histories and derived processing segments.
//!
//! ```rust
//! use statehistory::prelude::*;
//!
//! let ss = StateSystem::new();
//! let events = vec![
//!     Event::new("create", 0).with_field("requester", "A"),
//!     Event::new("start", 5).with_field("requester", "A"),
//!     Event::new("end", 10).with_field("requester", "A"),
//! ];
//! build_state_system(&ss, &mut ProcessingStateProvider::new(), events)?;
//!
//! let quark = ss.get_quark(&["Requester", "A"])?;
//! let interval = ss.query_single_state(7, quark)?;
//! assert_eq!(ProcessingState::from_value(&interval.value), Some(ProcessingState::Processing));
//! # Ok::<(), statehistory::StateError>(())
//! ```

pub mod attribute;
pub mod builder;
pub mod config;
pub mod error;
pub mod event;
pub(crate) mod history;
pub mod provider;
pub mod segment;
pub mod system;
pub mod types;

pub use attribute::{AttributeName, AttributeTree};
pub use builder::StateSystemBuilder;
pub use config::{Config, ProviderConfig, SegmentConfig};
pub use error::{Result, StateError};
pub use event::{Event, FieldValue};
pub use provider::{
    BuildSummary, EventKind, ProcessingState, ProcessingStateProvider, StateProvider,
    build_state_system, spawn_build,
};
pub use segment::{ProcessingKey, ProcessingLatencyAnalysis, Segment, SegmentAspect, SegmentStore};
pub use system::StateSystem;
pub use types::{Quark, StateInterval, StateValue, StoreStats, Timestamp};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{Result, StateError, StateSystem, StateSystemBuilder};

    pub use crate::{Quark, StateInterval, StateValue, Timestamp};

    pub use crate::{Event, FieldValue};

    pub use crate::{
        ProcessingState, ProcessingStateProvider, StateProvider, build_state_system, spawn_build,
    };

    pub use crate::{ProcessingLatencyAnalysis, Segment, SegmentAspect, SegmentStore};

    pub use crate::Config;
}
