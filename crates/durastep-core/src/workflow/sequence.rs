//! Per-run step sequence allocator.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free monotonic counter scoped to one `ExecutionContext`.
///
/// Not persisted: every attempt of a run starts again at zero, and replay
/// relies on the driver issuing the same invocations in the same order.
#[derive(Debug, Default)]
pub struct SequenceAllocator {
    next: AtomicU64,
}

impl SequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next sequence number.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// Reserve `len` consecutive sequence numbers in one atomic step.
    pub fn next_block(&self, len: u64) -> Range<u64> {
        let start = self.next.fetch_add(len, Ordering::SeqCst);
        start..start + len
    }

    /// Number of sequence values handed out so far.
    pub fn allocated(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn starts_at_zero_and_increments() {
        let seq = SequenceAllocator::new();
        assert_eq!(seq.next(), 0);
        assert_eq!(seq.next(), 1);
        assert_eq!(seq.next(), 2);
        assert_eq!(seq.allocated(), 3);
    }

    #[test]
    fn block_is_contiguous_and_advances_counter() {
        let seq = SequenceAllocator::new();
        seq.next();
        assert_eq!(seq.next_block(3), 1..4);
        assert_eq!(seq.next(), 4);
        assert!(seq.next_block(0).is_empty());
        assert_eq!(seq.next(), 5);
    }

    #[test]
    fn concurrent_callers_never_share_a_value() {
        let seq = Arc::new(SequenceAllocator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let seq = Arc::clone(&seq);
                std::thread::spawn(move || (0..1000).map(|_| seq.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for value in handle.join().unwrap() {
                assert!(seen.insert(value), "duplicate sequence {value}");
            }
        }
        assert_eq!(seen.len(), 8000);
        assert_eq!(seq.allocated(), 8000);
    }
}
