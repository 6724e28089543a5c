use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Pending actions keyed by their source.
///
/// Scheduling a key that is already pending replaces its deadline, so only the
/// last trigger after a quiet period fires.
#[derive(Debug)]
pub struct Debouncer<K> {
    wait: Duration,
    pending: HashMap<K, Instant>,
}

impl<K: Eq + Hash + Clone> Debouncer<K> {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            pending: HashMap::new(),
        }
    }

    pub fn schedule(&mut self, key: K, now: Instant) {
        self.pending.insert(key, now + self.wait);
    }

    pub fn cancel(&mut self, key: &K) -> bool {
        self.pending.remove(key).is_some()
    }

    /// Time left until the earliest deadline.
    pub fn time_to_next(&self, now: Instant) -> Option<Duration> {
        self.pending
            .values()
            .min()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Remove and return every key whose deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Vec<K> {
        let due: Vec<K> = self
            .pending
            .iter()
            .filter(|&(_, deadline)| *deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in due.iter() {
            self.pending.remove(key);
        }
        due
    }
}
