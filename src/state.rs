//! Shared in-process sync state.
//!
//! One [`SyncState`] is created per process and handed (behind an `Arc`) to
//! the orchestrator, the evaluator, both pipelines and the content monitor.
//! It holds the per-section "last checked" timestamps that rate-limit the
//! monitor, the monitor's processed-item set, and the in-process force-resync
//! signal.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

pub struct SyncState {
    last_checked: Mutex<HashMap<String, DateTime<Utc>>>,
    processed: Mutex<ProcessedSet>,
    force_resync: AtomicBool,
}

impl SyncState {
    pub fn new(processed_capacity: usize) -> Self {
        Self {
            last_checked: Mutex::new(HashMap::new()),
            processed: Mutex::new(ProcessedSet::new(processed_capacity)),
            force_resync: AtomicBool::new(false),
        }
    }

    /// Mark `section_ids` as checked at `at`.
    pub fn mark_checked<'a, I>(&self, section_ids: I, at: DateTime<Utc>)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut last = self.last_checked.lock().unwrap_or_else(|e| e.into_inner());
        for id in section_ids {
            last.insert(id.to_string(), at);
        }
    }

    pub fn last_checked(&self, section_id: &str) -> Option<DateTime<Utc>> {
        let last = self.last_checked.lock().unwrap_or_else(|e| e.into_inner());
        last.get(section_id).copied()
    }

    /// True when the section has never been checked or its cooldown elapsed.
    pub fn is_due(&self, section_id: &str, now: DateTime<Utc>, cooldown: Duration) -> bool {
        match self.last_checked(section_id) {
            Some(at) => now - at >= cooldown,
            None => true,
        }
    }

    /// Claim `rating_key` for processing. Returns `false` if it was already
    /// claimed earlier in this session.
    pub fn claim(&self, rating_key: &str) -> bool {
        let mut processed = self.processed.lock().unwrap_or_else(|e| e.into_inner());
        processed.insert(rating_key)
    }

    /// Give up a claim so a later pass may process `rating_key` again.
    pub fn release(&self, rating_key: &str) {
        let mut processed = self.processed.lock().unwrap_or_else(|e| e.into_inner());
        processed.remove(rating_key);
    }

    pub fn processed_len(&self) -> usize {
        let processed = self.processed.lock().unwrap_or_else(|e| e.into_inner());
        processed.len()
    }

    pub fn signal_force_resync(&self) {
        self.force_resync.store(true, Ordering::SeqCst);
    }

    /// Read and clear the in-process force-resync signal.
    pub fn take_force_resync(&self) -> bool {
        self.force_resync.swap(false, Ordering::SeqCst)
    }

    pub fn force_resync_pending(&self) -> bool {
        self.force_resync.load(Ordering::SeqCst)
    }
}

/// Insertion-ordered set that forgets its oldest keys past `capacity`.
struct ProcessedSet {
    keys: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl ProcessedSet {
    fn new(capacity: usize) -> Self {
        Self {
            keys: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn insert(&mut self, key: &str) -> bool {
        if !self.keys.insert(key.to_string()) {
            return false;
        }
        self.order.push_back(key.to_string());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
        true
    }

    fn remove(&mut self, key: &str) {
        if self.keys.remove(key) {
            self.order.retain(|k| k != key);
        }
    }

    fn len(&self) -> usize {
        self.keys.len()
    }
}
