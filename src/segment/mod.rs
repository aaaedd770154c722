//! Derived segments and their time index.
//!
//! Segments are `[start, end]` pairs produced by correlating a start event
//! with its matching end event. The store indexes them in an R-tree over
//! one-dimensional envelopes so that range queries do not scan every
//! segment.

use crate::error::{Result, StateError};
use crate::types::Timestamp;
use parking_lot::RwLock;
use rstar::{AABB, RTree, RTreeObject};
use serde::{Deserialize, Serialize};
use std::fmt;

mod latency;

pub use latency::{ProcessingKey, ProcessingLatencyAnalysis};

/// A correlated processing span.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    pub start: Timestamp,
    pub end: Timestamp,
    pub name: String,
    pub requester: String,
    pub id: String,
}

impl Segment {
    pub fn new(
        start: Timestamp,
        end: Timestamp,
        name: impl Into<String>,
        requester: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            start,
            end,
            name: name.into(),
            requester: requester.into(),
            id: id.into(),
        }
    }

    /// Length of the span. Unsigned, as `end - start` can exceed `i64::MAX`.
    pub fn duration(&self) -> u64 {
        self.end.abs_diff(self.start)
    }

    pub fn intersects(&self, start: Timestamp, end: Timestamp) -> bool {
        self.start <= end && self.end >= start
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}, {}] requester={}, id={}",
            self.name, self.start, self.end, self.requester, self.id
        )
    }
}

// Time maps onto the x axis; the y axis is unused. `i64 as f64` rounds
// monotonically, so the envelope never excludes a true match and results are
// filtered again with exact integer bounds.
impl RTreeObject for Segment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.start as f64, 0.0], [self.end as f64, 0.0])
    }
}

fn time_envelope(start: Timestamp, end: Timestamp) -> AABB<[f64; 2]> {
    AABB::from_corners([start as f64, 0.0], [end as f64, 0.0])
}

/// Named display column resolved from a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentAspect {
    Name,
    Content,
}

impl SegmentAspect {
    pub const ALL: [SegmentAspect; 2] = [SegmentAspect::Name, SegmentAspect::Content];

    pub fn name(self) -> &'static str {
        match self {
            SegmentAspect::Name => "Name",
            SegmentAspect::Content => "Content",
        }
    }

    pub fn help_text(self) -> &'static str {
        match self {
            SegmentAspect::Name => "The name of the processing segment",
            SegmentAspect::Content => "The requester and id of the processing segment",
        }
    }

    pub fn resolve(self, segment: &Segment) -> String {
        match self {
            SegmentAspect::Name => segment.name.clone(),
            SegmentAspect::Content => {
                format!("requester={}, id={}", segment.requester, segment.id)
            }
        }
    }
}

/// Append-only segment collection, safe to share between threads.
#[derive(Default)]
pub struct SegmentStore {
    tree: RwLock<RTree<Segment>>,
}

impl fmt::Debug for SegmentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentStore")
            .field("len", &self.len())
            .finish()
    }
}

impl SegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, segment: Segment) -> Result<()> {
        if segment.start > segment.end {
            return Err(StateError::InvalidRange {
                start: segment.start,
                end: segment.end,
            });
        }
        self.tree.write().insert(segment);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tree.read().size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Segments intersecting `[start, end]`, ordered by start then end.
    pub fn segments_intersecting(&self, start: Timestamp, end: Timestamp) -> Result<Vec<Segment>> {
        if start > end {
            return Err(StateError::InvalidRange { start, end });
        }

        let tree = self.tree.read();
        let mut segments: Vec<Segment> = tree
            .locate_in_envelope_intersecting(&time_envelope(start, end))
            .filter(|segment| segment.intersects(start, end))
            .cloned()
            .collect();
        sort_segments(&mut segments);
        Ok(segments)
    }

    /// Segments containing `time`.
    pub fn segments_at(&self, time: Timestamp) -> Vec<Segment> {
        let tree = self.tree.read();
        let mut segments: Vec<Segment> = tree
            .locate_in_envelope_intersecting(&time_envelope(time, time))
            .filter(|segment| segment.intersects(time, time))
            .cloned()
            .collect();
        sort_segments(&mut segments);
        segments
    }

    /// Every segment, ordered by start then end.
    pub fn iter_sorted(&self) -> std::vec::IntoIter<Segment> {
        let mut segments: Vec<Segment> = self.tree.read().iter().cloned().collect();
        sort_segments(&mut segments);
        segments.into_iter()
    }
}

fn sort_segments(segments: &mut [Segment]) {
    segments.sort_by(|a, b| {
        (a.start, a.end, &a.requester, &a.id).cmp(&(b.start, b.end, &b.requester, &b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SegmentStore {
        let store = SegmentStore::new();
        store.add(Segment::new(100, 150, "PROCESSING", "A", "1")).unwrap();
        store.add(Segment::new(20, 40, "PROCESSING", "B", "7")).unwrap();
        store.add(Segment::new(120, 130, "PROCESSING", "A", "2")).unwrap();
        store.add(Segment::new(20, 25, "PROCESSING", "C", "3")).unwrap();
        store
    }

    #[test]
    fn test_add_rejects_inverted_segment() {
        let store = SegmentStore::new();
        assert!(matches!(
            store.add(Segment::new(10, 5, "PROCESSING", "A", "1")),
            Err(StateError::InvalidRange { start: 10, end: 5 })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_segments_intersecting() {
        let store = store();
        assert_eq!(store.len(), 4);

        let hits = store.segments_intersecting(30, 110).unwrap();
        let spans: Vec<_> = hits.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(spans, vec![(20, 40), (100, 150)]);

        // Touching endpoints count
        assert_eq!(store.segments_intersecting(150, 200).unwrap().len(), 1);
        assert!(store.segments_intersecting(41, 99).unwrap().is_empty());
        assert!(matches!(
            store.segments_intersecting(10, 0),
            Err(StateError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_segments_at_and_sorted_iteration() {
        let store = store();

        let at = store.segments_at(125);
        let ids: Vec<_> = at.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);

        let starts: Vec<_> = store.iter_sorted().map(|s| (s.start, s.end)).collect();
        assert_eq!(starts, vec![(20, 25), (20, 40), (100, 150), (120, 130)]);
    }

    #[test]
    fn test_extreme_timestamps() {
        let store = SegmentStore::new();
        store
            .add(Segment::new(i64::MAX - 1, i64::MAX, "PROCESSING", "A", "1"))
            .unwrap();
        store.add(Segment::new(i64::MIN, i64::MIN + 1, "PROCESSING", "A", "2")).unwrap();

        assert_eq!(store.segments_at(i64::MAX).len(), 1);
        assert!(store.segments_intersecting(0, 1_000).unwrap().is_empty());
        assert_eq!(store.segments_intersecting(i64::MIN, i64::MAX).unwrap().len(), 2);

        let whole = Segment::new(i64::MIN, i64::MAX, "PROCESSING", "A", "3");
        assert_eq!(whole.duration(), u64::MAX);
    }

    #[test]
    fn test_aspects() {
        let segment = Segment::new(100, 150, "PROCESSING", "A", "1");
        assert_eq!(segment.duration(), 50);
        assert_eq!(SegmentAspect::Name.resolve(&segment), "PROCESSING");
        assert_eq!(SegmentAspect::Content.resolve(&segment), "requester=A, id=1");
        assert_eq!(SegmentAspect::Content.name(), "Content");
        assert!(!SegmentAspect::Name.help_text().is_empty());
    }
}
