//! Bounded rolling history of pitch detections.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::pitch::PitchDetectionResult;

/// Default number of points kept before the oldest is evicted.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// One detection stamped with its offset from the start of the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchHistoryPoint {
    /// Milliseconds since analysis start
    pub timestamp: u64,
    pub result: PitchDetectionResult,
}

/// FIFO of [`PitchHistoryPoint`]s with a fixed capacity.
#[derive(Debug, Clone)]
pub struct PitchHistory {
    points: VecDeque<PitchHistoryPoint>,
    capacity: usize,
}

impl PitchHistory {
    /// Creates an empty history. A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a point, evicting the oldest one when full.
    pub fn push(&mut self, point: PitchHistoryPoint) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn latest(&self) -> Option<&PitchHistoryPoint> {
        self.points.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PitchHistoryPoint> {
        self.points.iter()
    }

    /// Copies the points out in chronological order.
    pub fn to_vec(&self) -> Vec<PitchHistoryPoint> {
        self.points.iter().cloned().collect()
    }
}

impl Default for PitchHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(timestamp: u64) -> PitchHistoryPoint {
        PitchHistoryPoint {
            timestamp,
            result: PitchDetectionResult::empty(),
        }
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut history = PitchHistory::new(3);
        for t in 0..5 {
            history.push(point(t * 50));
        }
        assert_eq!(history.len(), 3);
        let stamps: Vec<u64> = history.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![100, 150, 200]);
        assert_eq!(history.latest().map(|p| p.timestamp), Some(200));
    }

    #[test]
    fn test_default_capacity_and_clear() {
        let mut history = PitchHistory::default();
        assert_eq!(history.capacity(), DEFAULT_HISTORY_CAPACITY);
        for t in 0..1500 {
            history.push(point(t));
        }
        assert_eq!(history.len(), DEFAULT_HISTORY_CAPACITY);
        assert_eq!(history.to_vec()[0].timestamp, 500);

        history.clear();
        assert!(history.is_empty());
        assert!(history.latest().is_none());
    }

    #[test]
    fn test_zero_capacity_is_bumped() {
        let mut history = PitchHistory::new(0);
        history.push(point(1));
        history.push(point(2));
        assert_eq!(history.len(), 1);
        assert_eq!(history.capacity(), 1);
    }
}
