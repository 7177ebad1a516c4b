//! Bounded, time-ordered history of action timestamps.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Reference capacity: roughly an hour of activity at one action per second.
pub const DEFAULT_HISTORY_CAPACITY: usize = 3600;

/// Largest accepted capacity.
pub const MAX_HISTORY_CAPACITY: usize = 1_000_000;

/// A ring buffer of action timestamps.
///
/// Appending to a full history evicts the oldest entry. Callers append in
/// real time, so entries stay in non-decreasing order.
#[derive(Debug, Clone)]
pub struct ActionHistory {
    entries: VecDeque<DateTime<Utc>>,
    capacity: usize,
}

impl ActionHistory {
    /// Create an empty history holding at most `capacity` entries.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            // Grows on demand; the capacity may be far above what is ever recorded
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Append a timestamp, evicting the oldest entry when full.
    pub fn push(&mut self, timestamp: DateTime<Utc>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(timestamp);
    }

    /// Change the capacity, keeping the most recent entries.
    pub fn set_capacity(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        while self.entries.len() > capacity {
            self.entries.pop_front();
        }
        self.capacity = capacity;
    }

    /// Number of entries strictly newer than `cutoff`.
    pub fn count_after(&self, cutoff: DateTime<Utc>) -> usize {
        // Entries are ordered, so scan from the newest end
        self.entries.iter().rev().take_while(|&&t| t > cutoff).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<DateTime<Utc>> {
        self.entries.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DateTime<Utc>> + '_ {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<DateTime<Utc>> {
        self.entries.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ActionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_huge_capacity_does_not_preallocate() {
        let mut history = ActionHistory::new(usize::MAX);
        history.push(base());
        assert_eq!(history.len(), 1);
        assert_eq!(history.capacity(), usize::MAX);
    }

    #[test]
    fn test_history_evicts_oldest() {
        let mut history = ActionHistory::new(3);
        for i in 0..5 {
            history.push(base() + Duration::seconds(i));
        }

        assert_eq!(history.len(), 3);
        assert_eq!(
            history.to_vec(),
            vec![
                base() + Duration::seconds(2),
                base() + Duration::seconds(3),
                base() + Duration::seconds(4),
            ]
        );
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut history = ActionHistory::new(0);
        history.push(base());
        history.push(base() + Duration::seconds(1));
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.last(), Some(base() + Duration::seconds(1)));
    }

    #[test]
    fn test_count_after_is_strict() {
        let mut history = ActionHistory::new(10);
        for offset in [0, 10, 20, 30] {
            history.push(base() + Duration::seconds(offset));
        }

        assert_eq!(history.count_after(base() + Duration::seconds(10)), 2);
        assert_eq!(history.count_after(base() - Duration::seconds(1)), 4);
        assert_eq!(history.count_after(base() + Duration::seconds(30)), 0);
    }

    #[test]
    fn test_shrinking_capacity_keeps_newest() {
        let mut history = ActionHistory::new(5);
        for i in 0..5 {
            history.push(base() + Duration::seconds(i));
        }

        history.set_capacity(2);
        assert_eq!(history.len(), 2);
        assert_eq!(history.iter().next(), Some(&(base() + Duration::seconds(3))));
    }
}
