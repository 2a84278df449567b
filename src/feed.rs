//! Activity feed of recent spot status changes
//!
//! Bounded, most-recent-first. Entries are never modified after creation and
//! nothing is persisted; a new process starts with an empty feed.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::types::{SpotStatus, StatusChangeEvent};

/// Maximum entries kept in the feed
pub const FEED_CAPACITY: usize = 20;

/// One observed status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    /// Synthetic, strictly increasing within a process
    pub id: u64,
    pub spot_id: i64,
    pub status: SpotStatus,
    pub observed_at: DateTime<Utc>,
    /// Local wall-clock time, e.g. `14:03:27`
    pub time: String,
}

#[derive(Debug, Clone)]
pub struct ActivityFeed {
    entries: VecDeque<FeedEntry>,
    next_id: u64,
}

impl ActivityFeed {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(FEED_CAPACITY + 1),
            next_id: 1,
        }
    }

    /// Prepend an entry for `event`, evicting the oldest beyond capacity.
    pub fn record(&mut self, event: &StatusChangeEvent) -> &FeedEntry {
        let entry = FeedEntry {
            id: self.next_id,
            spot_id: event.spot_id,
            status: event.status,
            observed_at: event.observed_at,
            time: event
                .observed_at
                .with_timezone(&Local)
                .format("%H:%M:%S")
                .to_string(),
        };
        self.next_id += 1;

        self.entries.push_front(entry);
        self.entries.truncate(FEED_CAPACITY);
        &self.entries[0]
    }

    /// Entries, most recent first
    pub fn entries(&self) -> impl Iterator<Item = &FeedEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<FeedEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ActivityFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(spot_id: i64, status: SpotStatus) -> StatusChangeEvent {
        StatusChangeEvent {
            spot_id,
            status,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_most_recent_first() {
        let mut feed = ActivityFeed::new();
        feed.record(&event(1, SpotStatus::Occupied));
        feed.record(&event(2, SpotStatus::Free));

        let spots: Vec<i64> = feed.entries().map(|e| e.spot_id).collect();
        assert_eq!(spots, vec![2, 1]);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut feed = ActivityFeed::new();
        for spot_id in 0..50 {
            feed.record(&event(spot_id, SpotStatus::Occupied));
            assert!(feed.len() <= FEED_CAPACITY);
        }

        assert_eq!(feed.len(), FEED_CAPACITY);
        let entries = feed.to_vec();
        assert_eq!(entries.first().unwrap().spot_id, 49);
        assert_eq!(entries.last().unwrap().spot_id, 30);
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut feed = ActivityFeed::new();
        let first = feed.record(&event(5, SpotStatus::Free)).id;
        let second = feed.record(&event(5, SpotStatus::Free)).id;
        assert!(second > first);
    }

    #[test]
    fn test_time_is_formatted() {
        let mut feed = ActivityFeed::new();
        let entry = feed.record(&event(1, SpotStatus::Free));
        assert_eq!(entry.time.len(), 8);
        assert_eq!(entry.time.matches(':').count(), 2);
    }
}
