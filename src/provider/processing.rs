//! Requester and process lifecycle states.
//!
//! Attribute tree built by [`ProcessingStateProvider`]:
//!
//! ```text
//! Requester
//!   <requester>          -> ProcessingState
//!     <id>               -> ProcessingState
//!       number           -> Long | Double
//! ```

use super::StateProvider;
use crate::attribute::AttributeName;
use crate::config::ProviderConfig;
use crate::error::Result;
use crate::event::{Event, FieldValue};
use crate::system::StateSystem;
use crate::types::{StateValue, Timestamp};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::fmt;

/// Event names understood by the processing analyses.
pub mod event_names {
    pub const CREATE: &str = "create";
    pub const START: &str = "start";
    pub const STOP: &str = "stop";
    pub const END: &str = "end";
    pub const PROCESS_INIT: &str = "processInit";
    pub const PROCESS_START: &str = "processStart";
    pub const PROCESS_END: &str = "processEnd";

    pub const REQUESTER_FIELD: &str = "requester";
    pub const ID_FIELD: &str = "id";
    pub const VALUE_FIELD: &str = "value";
}

/// Lifecycle state of a requester or process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ProcessingState {
    Initializing = 1,
    Processing = 2,
    Waiting = 3,
}

impl ProcessingState {
    pub fn value(self) -> StateValue {
        StateValue::Int(self as i32)
    }

    /// Decode a stored value; `None` for `Null` or anything unknown.
    pub fn from_value(value: &StateValue) -> Option<Self> {
        match value.as_int()? {
            1 => Some(ProcessingState::Initializing),
            2 => Some(ProcessingState::Processing),
            3 => Some(ProcessingState::Waiting),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessingState::Initializing => "INITIALIZING",
            ProcessingState::Processing => "PROCESSING",
            ProcessingState::Waiting => "WAITING",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Create,
    Start,
    Stop,
    End,
    ProcessInit,
    ProcessStart,
    ProcessEnd,
}

static EVENT_KINDS: Lazy<FxHashMap<&'static str, EventKind>> = Lazy::new(|| {
    use event_names::*;
    let mut kinds = FxHashMap::default();
    kinds.insert(CREATE, EventKind::Create);
    kinds.insert(START, EventKind::Start);
    kinds.insert(STOP, EventKind::Stop);
    kinds.insert(END, EventKind::End);
    kinds.insert(PROCESS_INIT, EventKind::ProcessInit);
    kinds.insert(PROCESS_START, EventKind::ProcessStart);
    kinds.insert(PROCESS_END, EventKind::ProcessEnd);
    kinds
});

impl EventKind {
    pub fn from_name(name: &str) -> Option<Self> {
        EVENT_KINDS.get(name).copied()
    }

    /// Whether the event targets a process below its requester.
    pub fn is_process(self) -> bool {
        matches!(
            self,
            EventKind::ProcessInit | EventKind::ProcessStart | EventKind::ProcessEnd
        )
    }

    /// State written by this event; `Null` ends the lifecycle.
    pub fn state(self) -> StateValue {
        match self {
            EventKind::Create | EventKind::ProcessInit => ProcessingState::Initializing.value(),
            EventKind::Start | EventKind::ProcessStart => ProcessingState::Processing.value(),
            EventKind::Stop => ProcessingState::Waiting.value(),
            EventKind::End | EventKind::ProcessEnd => StateValue::Null,
        }
    }
}

/// Tracks requester and process states from lifecycle events.
#[derive(Debug, Default)]
pub struct ProcessingStateProvider {
    config: ProviderConfig,
    handled: u64,
    skipped: u64,
}

impl ProcessingStateProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ProviderConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Provider using the attribute names configured on `system`.
    pub fn for_system(system: &StateSystem) -> Self {
        Self::with_config(system.config().provider.clone())
    }

    /// Events that changed the store.
    pub fn handled(&self) -> u64 {
        self.handled
    }

    /// Known events dropped for missing or malformed fields.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn skip(&mut self, event: &Event, reason: &str) {
        log::trace!(
            "skipping {} event at {}: {}",
            event.name,
            event.timestamp,
            reason
        );
        self.skipped += 1;
    }

    fn write_value(
        &self,
        system: &StateSystem,
        path: &[&str],
        time: Timestamp,
        value: &FieldValue,
    ) -> Result<()> {
        let value = match value {
            FieldValue::Int(v) => StateValue::Long(*v),
            FieldValue::Float(v) => StateValue::Double(*v),
            FieldValue::Str(_) => return Ok(()),
        };
        let quark = system.get_or_create_quark(path)?;
        system.modify_attribute(time, value, quark)
    }
}

impl StateProvider for ProcessingStateProvider {
    fn name(&self) -> &str {
        "processing.state.provider"
    }

    fn event_handle(&mut self, system: &StateSystem, event: &Event) -> Result<()> {
        let Some(kind) = EventKind::from_name(&event.name) else {
            return Ok(());
        };

        let Some(requester) = event.field_str(event_names::REQUESTER_FIELD) else {
            self.skip(event, "missing requester");
            return Ok(());
        };
        if AttributeName::parse(requester).is_err() {
            self.skip(event, "invalid requester name");
            return Ok(());
        }

        let root = self.config.root_attribute.as_str();
        if !kind.is_process() {
            let quark = system.get_or_create_quark(&[root, requester])?;
            system.modify_attribute(event.timestamp, kind.state(), quark)?;
            self.handled += 1;
            return Ok(());
        }

        let Some(id) = event.field_int(event_names::ID_FIELD) else {
            self.skip(event, "missing process id");
            return Ok(());
        };
        let id = id.to_string();

        let quark = system.get_or_create_quark(&[root, requester, id.as_str()])?;
        system.modify_attribute(event.timestamp, kind.state(), quark)?;

        if let Some(value) = event.field_number(event_names::VALUE_FIELD) {
            let path = [root, requester, id.as_str(), self.config.value_attribute.as_str()];
            self.write_value(system, &path, event.timestamp, value)?;
        }
        self.handled += 1;
        Ok(())
    }
}
