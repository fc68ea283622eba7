//! First-seen word timestamps with latest-wins deduplication.
//!
//! Each confirmed word occurrence is keyed by `"{token}_{sequence_index}"`
//! so a word repeated at different positions stays distinct. Overlapping
//! partial results can observe the same occurrence more than once; the
//! tracker keeps the latest timestamp per key, and a final deduplication
//! pass collapses colliding keys that share a position index.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct WordTimestampTracker {
    /// Keys in first-observation order.
    order: Vec<String>,
    stamps: HashMap<String, u64>,
}

impl WordTimestampTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the wall-clock time (ms since epoch) a word occurrence was
    /// observed. The first observation fixes the key's position in the
    /// ordering; a re-observation keeps the latest timestamp.
    pub fn observe(&mut self, token: &str, sequence_index: usize, at_ms: u64) {
        let key = format!("{token}_{sequence_index}");
        match self.stamps.entry(key) {
            Entry::Occupied(mut entry) => {
                let stamp = entry.get_mut();
                *stamp = (*stamp).max(at_ms);
            }
            Entry::Vacant(entry) => {
                self.order.push(entry.key().clone());
                entry.insert(at_ms);
            }
        }
    }

    /// Observe every whitespace token of a hypothesis, indexed by position.
    pub fn observe_hypothesis(&mut self, text: &str, at_ms: u64) {
        for (index, token) in text.split_whitespace().enumerate() {
            self.observe(token, index, at_ms);
        }
    }

    /// The raw ordered key → timestamp mapping.
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        self.order
            .iter()
            .map(|key| (key.clone(), self.stamps[key]))
            .collect()
    }

    /// Collapse occurrences that share a position index, keeping only the
    /// entry with the highest timestamp per position. Stale early
    /// observations of a revised word are discarded in favor of the most
    /// recent one.
    pub fn deduplicated(&self) -> Vec<(String, u64)> {
        let mut position_order: Vec<String> = Vec::new();
        let mut best: HashMap<String, (String, u64)> = HashMap::new();

        for key in &self.order {
            let stamp = self.stamps[key];
            let position = key.rsplit('_').next().unwrap_or(key).to_string();
            match best.entry(position) {
                Entry::Occupied(mut entry) => {
                    if stamp > entry.get().1 {
                        *entry.get_mut() = (key.clone(), stamp);
                    }
                }
                Entry::Vacant(entry) => {
                    position_order.push(entry.key().clone());
                    entry.insert((key.clone(), stamp));
                }
            }
        }

        position_order
            .iter()
            .map(|position| best[position].clone())
            .collect()
    }

    /// Total utterance span: `max(timestamp) - min(timestamp)` over the
    /// deduplicated set. `None` before any observation.
    pub fn utterance_duration_ms(&self) -> Option<u64> {
        let deduped = self.deduplicated();
        let min = deduped.iter().map(|(_, stamp)| *stamp).min()?;
        let max = deduped.iter().map(|(_, stamp)| *stamp).max()?;
        Some(max - min)
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn reset(&mut self) {
        self.order.clear();
        self.stamps.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_order_is_preserved() {
        let mut tracker = WordTimestampTracker::new();
        tracker.observe("THE", 0, 100);
        tracker.observe("CAT", 1, 150);
        tracker.observe("SAT", 2, 220);

        let snapshot = tracker.snapshot();
        let keys: Vec<&str> = snapshot.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["THE_0", "CAT_1", "SAT_2"]);
    }

    #[test]
    fn duplicate_key_keeps_latest_timestamp() {
        let mut tracker = WordTimestampTracker::new();
        tracker.observe("cat", 0, 100);
        tracker.observe("cat", 0, 250);

        assert_eq!(tracker.deduplicated(), vec![("cat_0".to_string(), 250)]);
    }

    #[test]
    fn colliding_positions_keep_highest_timestamp() {
        let mut tracker = WordTimestampTracker::new();
        // The decoder first heard "HELO" at position 1, then revised it.
        tracker.observe("THE", 0, 100);
        tracker.observe("HELO", 1, 150);
        tracker.observe("HELLO", 1, 300);

        let deduped = tracker.deduplicated();
        assert_eq!(
            deduped,
            vec![("THE_0".to_string(), 100), ("HELLO_1".to_string(), 300)]
        );
    }

    #[test]
    fn repeated_words_at_distinct_positions_stay_distinct() {
        let mut tracker = WordTimestampTracker::new();
        tracker.observe_hypothesis("VERY VERY GOOD", 500);

        let keys: Vec<String> = tracker.snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["VERY_0", "VERY_1", "GOOD_2"]);
    }

    #[test]
    fn duration_spans_min_to_max() {
        let mut tracker = WordTimestampTracker::new();
        assert_eq!(tracker.utterance_duration_ms(), None);

        tracker.observe("A", 0, 1_000);
        tracker.observe("B", 1, 1_400);
        tracker.observe("C", 2, 2_500);
        assert_eq!(tracker.utterance_duration_ms(), Some(1_500));
    }

    #[test]
    fn reset_forgets_everything() {
        let mut tracker = WordTimestampTracker::new();
        tracker.observe("A", 0, 1);
        tracker.reset();

        assert!(tracker.is_empty());
        assert!(tracker.snapshot().is_empty());
    }
}
