//! State providers turn a stream of events into attribute modifications.
//!
//! A provider only sees one event at a time. [`build_state_system`] is the
//! single-writer driver: it feeds events in timestamp order and closes the
//! store when the stream ends, releasing every reader blocked in
//! [`StateSystem::wait_until_built`].

use crate::error::{Result, StateError};
use crate::event::Event;
use crate::system::StateSystem;
use crate::types::{Quark, Timestamp};
use std::thread::{self, JoinHandle};

mod processing;

pub use processing::{EventKind, ProcessingState, ProcessingStateProvider, event_names};

/// Maps events to attribute updates.
pub trait StateProvider {
    /// Identifier of the provider, used in logs.
    fn name(&self) -> &str;

    fn version(&self) -> u32 {
        0
    }

    /// Apply one event. Events the provider does not understand, or that
    /// lack required fields, must be ignored rather than reported.
    fn event_handle(&mut self, system: &StateSystem, event: &Event) -> Result<()>;
}

/// Outcome of a completed build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    pub events_processed: u64,
    pub end_time: Timestamp,
}

/// Feed `events` through `provider` and close the store.
///
/// The store is closed at the last event timestamp, or at the configured
/// start time (else 0) for an empty stream. Events must arrive in
/// non-decreasing timestamp order. On error the store is still closed at the
/// last accepted timestamp so waiting readers are released, and the error is
/// returned.
pub fn build_state_system<P, I>(
    system: &StateSystem,
    provider: &mut P,
    events: I,
) -> Result<BuildSummary>
where
    P: StateProvider + ?Sized,
    I: IntoIterator<Item = Event>,
{
    log::debug!(
        "building state system with provider {} v{}",
        provider.name(),
        provider.version()
    );

    let mut last: Option<Timestamp> = None;
    let mut processed = 0u64;

    for event in events {
        if let Some(previous) = last
            && event.timestamp < previous
        {
            let err = StateError::OutOfOrderInsertion {
                quark: Quark::ROOT,
                time: event.timestamp,
                last: previous,
            };
            return Err(abort_build(system, previous, err));
        }

        if let Err(err) = provider.event_handle(system, &event) {
            let end = last.unwrap_or(event.timestamp);
            return Err(abort_build(system, end, err));
        }

        last = Some(event.timestamp);
        processed += 1;
    }

    let end_time = last.or(system.start_time()).unwrap_or(0);
    system.close_store(end_time)?;

    log::debug!(
        "provider {} processed {} events, store closed at {}",
        provider.name(),
        processed,
        end_time
    );

    Ok(BuildSummary {
        events_processed: processed,
        end_time,
    })
}

fn abort_build(system: &StateSystem, end: Timestamp, err: StateError) -> StateError {
    log::warn!("state system build aborted: {}", err);
    let end = system.current_end_time().map_or(end, |current| current.max(end));
    if let Err(close_err) = system.close_store(end) {
        log::warn!("failed to close state system after error: {}", close_err);
    }
    err
}

/// Run [`build_state_system`] on a dedicated writer thread.
pub fn spawn_build<P, I>(
    system: StateSystem,
    mut provider: P,
    events: I,
) -> Result<JoinHandle<Result<BuildSummary>>>
where
    P: StateProvider + Send + 'static,
    I: IntoIterator<Item = Event> + Send + 'static,
{
    let handle = thread::Builder::new()
        .name("state-builder".into())
        .spawn(move || build_state_system(&system, &mut provider, events))?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StateValue;

    /// Writes every event's `value` field to an attribute named after the event.
    struct Echo;

    impl StateProvider for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn event_handle(&mut self, system: &StateSystem, event: &Event) -> Result<()> {
            let Some(value) = event.field_int("value") else {
                return Ok(());
            };
            let quark = system.get_or_create_quark(&[event.name.as_str()])?;
            system.modify_attribute(event.timestamp, StateValue::Long(value), quark)
        }
    }

    #[test]
    fn test_build_closes_at_last_event() {
        let ss = StateSystem::new();
        let events = vec![
            Event::new("cpu", 0).with_field("value", 1),
            Event::new("cpu", 10).with_field("value", 2),
            Event::new("noise", 12),
        ];

        let summary = build_state_system(&ss, &mut Echo, events).unwrap();
        assert_eq!(summary.events_processed, 3);
        assert_eq!(summary.end_time, 12);
        assert!(ss.is_built());

        let quark = ss.get_quark(&["cpu"]).unwrap();
        let last = ss.query_single_state(12, quark).unwrap();
        assert_eq!((last.start, last.end), (10, 12));
    }

    #[test]
    fn test_empty_stream_closes_at_start() {
        let ss = StateSystem::with_config(crate::Config::default().with_start_time(7)).unwrap();
        let summary = build_state_system(&ss, &mut Echo, Vec::new()).unwrap();
        assert_eq!(summary.end_time, 7);
        assert!(ss.is_built());
    }

    #[test]
    fn test_out_of_order_stream_aborts_and_releases_readers() {
        let ss = StateSystem::new();
        let events = vec![
            Event::new("cpu", 10).with_field("value", 1),
            Event::new("cpu", 5).with_field("value", 2),
        ];

        let err = build_state_system(&ss, &mut Echo, events).unwrap_err();
        assert!(matches!(
            err,
            StateError::OutOfOrderInsertion { time: 5, last: 10, .. }
        ));
        assert!(ss.is_built());
        assert_eq!(ss.current_end_time(), Some(10));
    }

    #[test]
    fn test_spawn_build_with_concurrent_reader() {
        let ss = StateSystem::new();
        let events: Vec<_> = (0..1_000)
            .map(|t| Event::new("cpu", t).with_field("value", t / 100))
            .collect();

        let reader = {
            let ss = ss.clone();
            thread::spawn(move || {
                ss.wait_until_built();
                let quark = ss.get_quark(&["cpu"]).unwrap();
                ss.query_history_range(quark, 0, 999).unwrap().len()
            })
        };

        let summary = spawn_build(ss.clone(), Echo, events)
            .unwrap()
            .join()
            .unwrap()
            .unwrap();
        assert_eq!(summary.end_time, 999);
        assert_eq!(reader.join().unwrap(), 10);
    }
}
