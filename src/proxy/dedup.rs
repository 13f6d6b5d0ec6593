//! First-seen deduplication of candidate tokens

use std::collections::HashSet;
use std::sync::Mutex;

/// Tracks candidates already dispatched during one run
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: Mutex<HashSet<String>>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time `candidate` is offered, `false` after.
    ///
    /// The check and the insert happen under one lock, so concurrent callers
    /// offering the same key never both win.
    pub fn admit(&self, candidate: &str) -> bool {
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if seen.contains(candidate) {
            return false;
        }
        seen.insert(candidate.to_string())
    }

    /// Number of distinct candidates admitted so far
    pub fn len(&self) -> usize {
        match self.seen.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_first_seen_wins() {
        let dedup = Deduplicator::new();
        assert!(dedup.is_empty());
        assert!(dedup.admit("1.2.3.4:80"));
        assert!(!dedup.admit("1.2.3.4:80"));
        assert!(dedup.admit("1.2.3.4:81"));
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn test_keys_are_exact_strings() {
        let dedup = Deduplicator::new();
        assert!(dedup.admit("1.2.3.4:80"));
        assert!(dedup.admit("01.2.3.4:80"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_admission_is_exclusive() {
        let dedup = Arc::new(Deduplicator::new());
        let winners = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let dedup = Arc::clone(&dedup);
                let winners = Arc::clone(&winners);
                tokio::spawn(async move {
                    for i in 0..100 {
                        if dedup.admit(&format!("10.0.0.{}:80", i)) {
                            winners.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 100);
        assert_eq!(dedup.len(), 100);
    }
}
