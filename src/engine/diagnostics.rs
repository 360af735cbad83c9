//! Once-per-message diagnostics
//!
//! Dispatch failures tend to repeat: a caller retrying an unsupported shape in
//! a loop would otherwise emit the same line thousands of times. The latch
//! keys on the message text: the first occurrence is logged at WARN, repeats
//! at DEBUG.
//!
//! Only a hash of each message is kept, and at most `capacity` of them. Once
//! full, unseen messages go to DEBUG as well, so no message is ever warned
//! twice.

use std::collections::HashSet;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// Distinct messages remembered by [`DiagnosticLatch::new`]
pub const DEFAULT_CAPACITY: usize = 4096;

/// Set of messages already reported
#[derive(Debug)]
pub struct DiagnosticLatch {
    seen: Mutex<HashSet<u64>>,
    capacity: usize,
    saturated: AtomicBool,
}

impl Default for DiagnosticLatch {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl DiagnosticLatch {
    /// Empty latch remembering up to [`DEFAULT_CAPACITY`] messages
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty latch remembering up to `capacity` messages
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
            capacity,
            saturated: AtomicBool::new(false),
        }
    }

    /// Log `message`; returns true if it was logged at WARN.
    pub fn emit(&self, message: &str) -> bool {
        let key = {
            let mut hasher = DefaultHasher::new();
            message.hash(&mut hasher);
            hasher.finish()
        };

        let mut seen = self.seen.lock();
        if seen.contains(&key) {
            drop(seen);
            tracing::debug!(target: "contractr::diagnostics", "(repeated) {message}");
            return false;
        }
        if seen.len() >= self.capacity {
            drop(seen);
            if !self.saturated.swap(true, Ordering::Relaxed) {
                tracing::warn!(
                    target: "contractr::diagnostics",
                    capacity = self.capacity,
                    "Diagnostic latch full; further new messages are logged at debug level"
                );
            }
            tracing::debug!(target: "contractr::diagnostics", "{message}");
            return false;
        }
        seen.insert(key);
        drop(seen);
        tracing::warn!(target: "contractr::diagnostics", "{message}");
        true
    }

    /// Number of distinct messages emitted
    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    /// Whether nothing has been emitted
    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_first_occurrence_only() {
        let latch = DiagnosticLatch::new();
        assert!(latch.emit("no solution for S_NN m=1"));
        assert!(!latch.emit("no solution for S_NN m=1"));
        assert!(latch.emit("no solution for S_NN m=2"));
        assert_eq!(latch.len(), 2);
    }

    #[test]
    fn test_capacity_bounds_memory_without_rewarning() {
        let latch = DiagnosticLatch::with_capacity(2);
        assert!(latch.emit("m=1"));
        assert!(latch.emit("m=2"));
        assert!(!latch.emit("m=3"));
        assert!(!latch.emit("m=3"));
        assert!(!latch.emit("m=1"));
        assert_eq!(latch.len(), 2);
    }

    #[test]
    fn test_concurrent_emitters_report_once() {
        let latch = Arc::new(DiagnosticLatch::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let latch = Arc::clone(&latch);
                std::thread::spawn(move || (0..100).filter(|_| latch.emit("same")).count())
            })
            .collect();
        let firsts: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(firsts, 1);
    }
}
