//! Point-in-time, range and full-state queries.
//!
//! The strict queries assume a complete store and fail with
//! `TimeOutOfRange` until [`StateSystem::close_store`] has run; they never
//! block. The `*_live` variants answer against the partial state while the
//! store is still being built, reporting open intervals as ending at the
//! current end time.

use super::StateSystem;
use crate::error::{Result, StateError};
use crate::history::AttributeHistory;
use crate::types::{Quark, StateInterval, Timestamp};

impl StateSystem {
    /// Start of the store's time range.
    pub fn start_time(&self) -> Option<Timestamp> {
        self.bounds.read().start
    }

    /// Latest time observed so far, or the close time once built.
    pub fn current_end_time(&self) -> Option<Timestamp> {
        self.bounds.read().end
    }

    fn require_built(&self, time: Timestamp) -> Result<()> {
        if !self.is_built() {
            return Err(StateError::TimeOutOfRange { time });
        }
        Ok(())
    }

    fn read_history<T>(&self, quark: Quark, f: impl FnOnce(&AttributeHistory) -> T) -> Result<T> {
        let histories = self.histories.read();
        let history = histories
            .get(quark.index())
            .ok_or_else(|| StateError::NotFound(format!("quark {}", quark)))?;
        let history = history.read();
        Ok(f(&history))
    }

    /// Interval of `quark` containing `time`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if `quark` is unknown
    /// - `TimeOutOfRange` if the store is not built or `time` is outside the
    ///   attribute's history
    pub fn query_single_state(&self, time: Timestamp, quark: Quark) -> Result<StateInterval> {
        self.require_built(time)?;
        self.single_state(time, quark, None)
    }

    /// Like [`query_single_state`](Self::query_single_state), against the
    /// partial store.
    pub fn query_single_state_live(&self, time: Timestamp, quark: Quark) -> Result<StateInterval> {
        let live_end = self.current_end_time();
        self.single_state(time, quark, live_end)
    }

    fn single_state(
        &self,
        time: Timestamp,
        quark: Quark,
        live_end: Option<Timestamp>,
    ) -> Result<StateInterval> {
        self.read_history(quark, |history| history.find(time, live_end))?
            .ok_or(StateError::TimeOutOfRange { time })
    }

    /// Every interval of `quark` intersecting `[start, end]`, ordered by
    /// start time.
    ///
    /// # Errors
    ///
    /// - `InvalidRange` if `start > end`
    /// - `TimeOutOfRange` if the store is not built
    /// - `NotFound` if `quark` is unknown
    pub fn query_history_range(
        &self,
        quark: Quark,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<StateInterval>> {
        if start > end {
            return Err(StateError::InvalidRange { start, end });
        }
        self.require_built(start)?;
        self.read_history(quark, |history| history.range(start, end, None))
    }

    pub fn query_history_range_live(
        &self,
        quark: Quark,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<StateInterval>> {
        if start > end {
            return Err(StateError::InvalidRange { start, end });
        }
        let live_end = self.current_end_time();
        self.read_history(quark, |history| history.range(start, end, live_end))
    }

    /// One interval per attribute at `time`, in quark order.
    ///
    /// Attributes without a value at `time` are reported with a `Null`
    /// interval covering the gap in their history.
    pub fn query_full_state(&self, time: Timestamp) -> Result<Vec<StateInterval>> {
        self.require_built(time)?;
        self.full_state(time, None)
    }

    pub fn query_full_state_live(&self, time: Timestamp) -> Result<Vec<StateInterval>> {
        let live_end = self.current_end_time();
        self.full_state(time, live_end)
    }

    fn full_state(&self, time: Timestamp, live_end: Option<Timestamp>) -> Result<Vec<StateInterval>> {
        let bounds = *self.bounds.read();
        let (Some(store_start), Some(store_end)) = (bounds.start, bounds.end) else {
            return Err(StateError::TimeOutOfRange { time });
        };
        if time < store_start || time > store_end {
            return Err(StateError::TimeOutOfRange { time });
        }

        let histories = self.histories.read();
        Ok(histories
            .iter()
            .skip(1)
            .map(|history| history.read())
            .map(|history| {
                history
                    .find(time, live_end)
                    .unwrap_or_else(|| history.gap_around(time, store_start, store_end, live_end))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StateValue;

    fn sample() -> (StateSystem, Quark, Quark) {
        let ss = StateSystem::new();
        let a = ss.get_or_create_quark(&["Requester", "a"]).unwrap();
        let b = ss.get_or_create_quark(&["Requester", "b"]).unwrap();

        ss.modify_attribute(0, StateValue::Int(1), a).unwrap();
        ss.modify_attribute(5, StateValue::Int(2), a).unwrap();
        ss.modify_attribute(8, StateValue::Str("x".into()), b).unwrap();
        ss.modify_attribute(10, StateValue::Int(3), a).unwrap();
        (ss, a, b)
    }

    #[test]
    fn test_strict_queries_fail_before_built() {
        let (ss, a, _) = sample();
        assert!(matches!(
            ss.query_single_state(3, a),
            Err(StateError::TimeOutOfRange { time: 3 })
        ));
        assert!(ss.query_history_range(a, 0, 10).is_err());
        assert!(ss.query_full_state(3).is_err());
    }

    #[test]
    fn test_single_state() {
        let (ss, a, b) = sample();
        ss.close_store(20).unwrap();

        let interval = ss.query_single_state(7, a).unwrap();
        assert_eq!((interval.start, interval.end), (5, 9));
        assert_eq!(interval.value, StateValue::Int(2));
        assert_eq!(ss.query_single_state(20, a).unwrap().start, 10);

        assert!(matches!(
            ss.query_single_state(3, b),
            Err(StateError::TimeOutOfRange { .. })
        ));
        assert!(matches!(
            ss.query_single_state(21, a),
            Err(StateError::TimeOutOfRange { .. })
        ));
        assert!(matches!(
            ss.query_single_state(3, Quark::new(77)),
            Err(StateError::NotFound(_))
        ));
    }

    #[test]
    fn test_history_range() {
        let (ss, a, _) = sample();
        ss.close_store(20).unwrap();

        let intervals = ss.query_history_range(a, 4, 12).unwrap();
        let spans: Vec<_> = intervals.iter().map(|iv| (iv.start, iv.end)).collect();
        assert_eq!(spans, vec![(0, 4), (5, 9), (10, 20)]);

        assert!(matches!(
            ss.query_history_range(a, 12, 4),
            Err(StateError::InvalidRange { start: 12, end: 4 })
        ));
        assert!(ss.query_history_range(a, 30, 40).unwrap().is_empty());
    }

    #[test]
    fn test_full_state_synthesizes_null_gaps() {
        let (ss, a, b) = sample();
        let never_set = ss.get_or_create_quark(&["Requester", "c"]).unwrap();
        ss.close_store(20).unwrap();

        let state = ss.query_full_state(3).unwrap();
        // Requester, a, b, c
        assert_eq!(state.len(), 4);

        let requester = &state[0];
        assert!(requester.value.is_null());
        assert_eq!((requester.start, requester.end), (0, 20));

        assert_eq!(state[a.index() - 1].value, StateValue::Int(1));

        let b_state = &state[b.index() - 1];
        assert!(b_state.value.is_null());
        assert_eq!((b_state.start, b_state.end), (0, 7));

        assert_eq!(state[never_set.index() - 1].quark, never_set);
        assert!(ss.query_full_state(21).is_err());
    }

    #[test]
    fn test_live_queries_on_partial_store() {
        let (ss, a, b) = sample();

        let open = ss.query_single_state_live(10, a).unwrap();
        assert_eq!((open.start, open.end), (10, 10));
        assert_eq!(ss.query_single_state_live(9, b).unwrap().value, StateValue::Str("x".into()));

        assert_eq!(ss.query_history_range_live(a, 0, 100).unwrap().len(), 3);

        let state = ss.query_full_state_live(9).unwrap();
        assert_eq!(state.len(), 3);
        assert!(ss.query_full_state_live(50).is_err());
    }
}
