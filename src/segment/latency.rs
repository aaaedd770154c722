//! Processing latency: pairs `processStart`/`processEnd` events of the same
//! requester and id into segments.

use super::{Segment, SegmentAspect, SegmentStore};
use crate::config::SegmentConfig;
use crate::error::Result;
use crate::event::Event;
use crate::provider::event_names;
use crate::system::StateSystem;
use crate::types::Timestamp;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Correlation key of a pending processing span.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessingKey {
    pub requester: String,
    pub id: String,
}

impl ProcessingKey {
    /// Key from the event's `requester` and `id` fields, rendered as text.
    pub fn from_event(event: &Event) -> Option<Self> {
        Some(Self {
            requester: event.field_formatted(event_names::REQUESTER_FIELD)?,
            id: event.field_formatted(event_names::ID_FIELD)?,
        })
    }
}

pub struct ProcessingLatencyAnalysis {
    config: SegmentConfig,
    ongoing: FxHashMap<ProcessingKey, Timestamp>,
    store: Arc<SegmentStore>,
}

impl ProcessingLatencyAnalysis {
    pub fn new(config: SegmentConfig) -> Self {
        Self::with_store(config, Arc::new(SegmentStore::new()))
    }

    /// Analysis using the segment settings configured on `system`.
    pub fn for_system(system: &StateSystem) -> Self {
        Self::new(system.config().segments.clone())
    }

    /// Emit into an existing, possibly shared, store.
    pub fn with_store(config: SegmentConfig, store: Arc<SegmentStore>) -> Self {
        Self {
            config,
            ongoing: FxHashMap::default(),
            store,
        }
    }

    pub fn store(&self) -> Arc<SegmentStore> {
        Arc::clone(&self.store)
    }

    pub fn aspects(&self) -> &'static [SegmentAspect] {
        &SegmentAspect::ALL
    }

    /// Number of starts still waiting for their end.
    pub fn pending(&self) -> usize {
        self.ongoing.len()
    }

    pub fn handle_event(&mut self, event: &Event) -> Result<()> {
        let is_start = event.name == event_names::PROCESS_START;
        if !is_start && event.name != event_names::PROCESS_END {
            return Ok(());
        }
        let Some(key) = ProcessingKey::from_event(event) else {
            log::trace!(
                "skipping {} event at {}: missing requester or id",
                event.name,
                event.timestamp
            );
            return Ok(());
        };

        if is_start {
            // A restart of a pending key replaces its start
            self.ongoing.insert(key, event.timestamp);
            return Ok(());
        }

        if let Some(start) = self.ongoing.remove(&key) {
            self.store.add(Segment::new(
                start,
                event.timestamp,
                self.config.segment_name.as_str(),
                key.requester,
                key.id,
            ))?;
        }
        Ok(())
    }

    /// Drop starts that never ended. Returns the store.
    pub fn finish(&mut self) -> Arc<SegmentStore> {
        if !self.ongoing.is_empty() {
            log::debug!(
                "discarding {} unmatched processing starts",
                self.ongoing.len()
            );
            self.ongoing.clear();
        }
        self.store()
    }

    /// Process a whole event stream.
    pub fn run<I>(&mut self, events: I) -> Result<Arc<SegmentStore>>
    where
        I: IntoIterator<Item = Event>,
    {
        for event in events {
            self.handle_event(&event)?;
        }
        Ok(self.finish())
    }
}

impl Default for ProcessingLatencyAnalysis {
    fn default() -> Self {
        Self::new(SegmentConfig::default())
    }
}
