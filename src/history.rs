//! Per-attribute interval history
//!
//! Each attribute keeps its committed intervals in a growable array sorted by
//! start time, plus at most one open interval whose end is not known yet.
//! The open interval is committed when the next differing value arrives
//! (ending at `time - 1`) or when the store is closed.
//!
//! Lookups binary-search the committed array, so single-state and range
//! queries are logarithmic in the number of intervals of the attribute.

use crate::error::{Result, StateError};
use crate::types::{Quark, StateInterval, StateValue, Timestamp};

/// Interval whose end time is still pending.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenInterval {
    pub start: Timestamp,
    pub value: StateValue,
}

/// What a modification did to the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modification {
    /// First value of the attribute.
    Opened,
    /// Same value as the open interval; nothing changed.
    Coalesced,
    /// Different value at the open interval's own start time; the open value
    /// was replaced and no zero-width interval was committed.
    Replaced,
    /// The open interval was committed and a new one opened.
    Committed,
}

#[derive(Debug)]
pub struct AttributeHistory {
    quark: Quark,
    closed: Vec<StateInterval>,
    open: Option<OpenInterval>,
    last_modified: Option<Timestamp>,
}

impl AttributeHistory {
    pub fn new(quark: Quark, capacity: usize) -> Self {
        Self {
            quark,
            closed: Vec::with_capacity(capacity),
            open: None,
            last_modified: None,
        }
    }

    /// Committed intervals, ordered by start time.
    pub fn closed(&self) -> &[StateInterval] {
        &self.closed
    }

    pub fn open(&self) -> Option<&OpenInterval> {
        self.open.as_ref()
    }

    /// Apply a value change at `time`.
    ///
    /// `time` must not precede the previous modification of this attribute.
    pub fn modify(&mut self, time: Timestamp, value: StateValue) -> Result<Modification> {
        if let Some(last) = self.last_modified
            && time < last
        {
            return Err(StateError::OutOfOrderInsertion {
                quark: self.quark,
                time,
                last,
            });
        }
        self.last_modified = Some(time);

        let outcome = match self.open.take() {
            None => {
                self.open = Some(OpenInterval { start: time, value });
                Modification::Opened
            }
            Some(open) if open.value == value => {
                self.open = Some(open);
                Modification::Coalesced
            }
            Some(open) if open.start == time => {
                self.open = Some(self.reopen_or_replace(time, value));
                Modification::Replaced
            }
            Some(open) => {
                self.closed.push(StateInterval::new(
                    open.start,
                    time - 1,
                    self.quark,
                    open.value,
                ));
                self.open = Some(OpenInterval { start: time, value });
                Modification::Committed
            }
        };
        Ok(outcome)
    }

    /// Replacing the open value may make it equal to the interval just
    /// before it; merge the two instead of leaving adjacent duplicates.
    fn reopen_or_replace(&mut self, time: Timestamp, value: StateValue) -> OpenInterval {
        let mergeable = matches!(
            self.closed.last(),
            Some(previous) if previous.end + 1 == time && previous.value == value
        );
        if mergeable && let Some(previous) = self.closed.pop() {
            return OpenInterval {
                start: previous.start,
                value: previous.value,
            };
        }
        OpenInterval { start: time, value }
    }

    /// Replace the open value without closing it.
    pub fn update_ongoing(&mut self, value: StateValue) -> Result<()> {
        match self.open.as_mut() {
            Some(open) => {
                open.value = value;
                Ok(())
            }
            None => Err(StateError::NotFound(format!(
                "no ongoing state for quark {}",
                self.quark
            ))),
        }
    }

    /// Commit the open interval with `end`. `end` must not precede the open
    /// interval's start.
    pub fn close(&mut self, end: Timestamp) {
        if let Some(open) = self.open.take() {
            debug_assert!(end >= open.start);
            self.closed
                .push(StateInterval::new(open.start, end, self.quark, open.value));
        }
    }

    /// Start of the first interval.
    pub fn first_start(&self) -> Option<Timestamp> {
        self.closed
            .first()
            .map(|iv| iv.start)
            .or_else(|| self.open.as_ref().map(|open| open.start))
    }

    /// End of the last interval. The open interval is reported as ending at
    /// `live_end`, or not at all when `live_end` is `None`.
    pub fn last_end(&self, live_end: Option<Timestamp>) -> Option<Timestamp> {
        match (&self.open, live_end) {
            (Some(_), Some(end)) => Some(end),
            _ => self.closed.last().map(|iv| iv.end),
        }
    }

    fn open_as_interval(&self, live_end: Option<Timestamp>) -> Option<StateInterval> {
        let open = self.open.as_ref()?;
        let end = live_end?;
        (end >= open.start).then(|| StateInterval::new(open.start, end, self.quark, open.value.clone()))
    }

    /// Interval containing `time`.
    pub fn find(&self, time: Timestamp, live_end: Option<Timestamp>) -> Option<StateInterval> {
        let idx = self.closed.partition_point(|iv| iv.end < time);
        if let Some(interval) = self.closed.get(idx)
            && interval.start <= time
        {
            return Some(interval.clone());
        }

        self.open_as_interval(live_end)
            .filter(|interval| interval.contains(time))
    }

    /// Every interval intersecting `[start, end]`, ordered by start time.
    pub fn range(
        &self,
        start: Timestamp,
        end: Timestamp,
        live_end: Option<Timestamp>,
    ) -> Vec<StateInterval> {
        let idx = self.closed.partition_point(|iv| iv.end < start);
        let mut intervals: Vec<StateInterval> = self.closed[idx..]
            .iter()
            .take_while(|iv| iv.start <= end)
            .cloned()
            .collect();

        if let Some(open) = self.open_as_interval(live_end)
            && open.intersects(start, end)
        {
            intervals.push(open);
        }
        intervals
    }

    /// Null interval covering the hole in this history around `time`, bounded
    /// by the store's own range.
    pub fn gap_around(
        &self,
        time: Timestamp,
        store_start: Timestamp,
        store_end: Timestamp,
        live_end: Option<Timestamp>,
    ) -> StateInterval {
        let (start, end) = match (self.first_start(), self.last_end(live_end)) {
            (Some(first), _) if time < first => (store_start.min(time), first - 1),
            (_, Some(last)) if time > last => (last + 1, store_end.max(time)),
            _ => (store_start.min(time), store_end.max(time)),
        };
        StateInterval::new(start, end, self.quark, StateValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> AttributeHistory {
        AttributeHistory::new(Quark::new(1), 4)
    }

    #[test]
    fn test_contiguous_intervals() {
        let mut h = history();
        for (i, t) in [0, 5, 10, 15, 20].iter().enumerate() {
            h.modify(*t, StateValue::Int(i as i32)).unwrap();
        }
        h.close(30);

        let closed = h.closed();
        assert_eq!(closed.len(), 5);
        for pair in closed.windows(2) {
            assert_eq!(pair[0].end + 1, pair[1].start);
        }
        assert_eq!(closed[4].end, 30);
    }

    #[test]
    fn test_same_value_coalesces() {
        let mut h = history();
        assert_eq!(h.modify(0, StateValue::Int(1)).unwrap(), Modification::Opened);
        assert_eq!(
            h.modify(5, StateValue::Int(1)).unwrap(),
            Modification::Coalesced
        );
        h.close(10);
        assert_eq!(h.closed(), &[StateInterval::new(0, 10, Quark::new(1), StateValue::Int(1))]);
    }

    #[test]
    fn test_null_closes_value() {
        let mut h = history();
        h.modify(0, StateValue::Int(1)).unwrap();
        assert_eq!(
            h.modify(3, StateValue::Null).unwrap(),
            Modification::Committed
        );
        h.close(3);
        assert_eq!(h.closed()[0].end, 2);
        assert!(h.closed()[1].value.is_null());
        assert_eq!((h.closed()[1].start, h.closed()[1].end), (3, 3));
    }

    #[test]
    fn test_out_of_order_rejected() {
        let mut h = history();
        h.modify(10, StateValue::Int(1)).unwrap();
        let err = h.modify(5, StateValue::Int(2)).unwrap_err();
        assert!(matches!(
            err,
            StateError::OutOfOrderInsertion {
                time: 5,
                last: 10,
                ..
            }
        ));
        // Equal timestamps are accepted
        assert!(h.modify(10, StateValue::Int(2)).is_ok());
    }

    #[test]
    fn test_same_time_replaces_open_value() {
        let mut h = history();
        h.modify(0, StateValue::Int(1)).unwrap();
        assert_eq!(
            h.modify(0, StateValue::Int(2)).unwrap(),
            Modification::Replaced
        );
        h.close(4);
        assert_eq!(h.closed().len(), 1);
        assert_eq!(h.closed()[0].value, StateValue::Int(2));
    }

    #[test]
    fn test_replace_merges_with_previous_equal_value() {
        let mut h = history();
        h.modify(0, StateValue::Int(1)).unwrap();
        h.modify(5, StateValue::Int(2)).unwrap();
        h.modify(5, StateValue::Int(1)).unwrap();
        h.close(9);
        assert_eq!(h.closed(), &[StateInterval::new(0, 9, Quark::new(1), StateValue::Int(1))]);
    }

    #[test]
    fn test_find_and_range() {
        let mut h = history();
        h.modify(0, StateValue::Int(1)).unwrap();
        h.modify(5, StateValue::Int(2)).unwrap();
        h.modify(10, StateValue::Int(3)).unwrap();
        h.close(14);

        assert_eq!(h.find(7, None).unwrap().value, StateValue::Int(2));
        assert_eq!(h.find(10, None).unwrap().start, 10);
        assert!(h.find(15, None).is_none());
        assert!(h.find(-1, None).is_none());

        let range = h.range(4, 10, None);
        let starts: Vec<_> = range.iter().map(|iv| iv.start).collect();
        assert_eq!(starts, vec![0, 5, 10]);
        assert!(h.range(20, 30, None).is_empty());
    }

    #[test]
    fn test_open_interval_visible_only_when_live() {
        let mut h = history();
        h.modify(0, StateValue::Int(1)).unwrap();
        h.modify(5, StateValue::Int(2)).unwrap();

        assert!(h.find(6, None).is_none());
        let live = h.find(6, Some(8)).unwrap();
        assert_eq!((live.start, live.end), (5, 8));
        assert!(h.find(9, Some(8)).is_none());
        assert_eq!(h.range(0, 100, Some(8)).len(), 2);
    }

    #[test]
    fn test_update_ongoing() {
        let mut h = history();
        assert!(h.update_ongoing(StateValue::Int(1)).is_err());
        h.modify(0, StateValue::Int(1)).unwrap();
        h.update_ongoing(StateValue::Int(9)).unwrap();
        assert_eq!(h.open().unwrap().value, StateValue::Int(9));
        assert_eq!(h.open().unwrap().start, 0);
    }

    #[test]
    fn test_gap_around() {
        let mut h = history();
        h.modify(10, StateValue::Int(1)).unwrap();
        h.close(20);

        let before = h.gap_around(3, 0, 30, None);
        assert_eq!((before.start, before.end), (0, 9));
        assert!(before.value.is_null());

        let empty = history().gap_around(3, 0, 30, None);
        assert_eq!((empty.start, empty.end), (0, 30));
    }
}
