//! Groups windows into batches that are transcribed together.

use crate::chunking::segmenter::Window;
use crate::error::{LongscribeError, Result};

/// Partitions an ordered window sequence into runs of at most `batch_size`.
///
/// Only partitions: windows are never reordered, dropped or merged, and a
/// batch size of 1 degenerates to sequential processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchScheduler {
    batch_size: usize,
}

impl BatchScheduler {
    pub fn new(batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(LongscribeError::invalid("batch_size", "must be at least 1"));
        }
        Ok(Self { batch_size })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Batches in window order.
    pub fn batches<'a>(&self, windows: &'a [Window]) -> std::slice::Chunks<'a, Window> {
        windows.chunks(self.batch_size)
    }

    /// Number of batches needed for `window_count` windows.
    pub fn batch_count(&self, window_count: usize) -> usize {
        window_count.div_ceil(self.batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn windows(n: usize) -> Vec<Window> {
        (0..n)
            .map(|i| Window {
                index: i,
                start_sample: i * 10,
                end_sample: i * 10 + 15,
                overlap_left: if i == 0 { 0 } else { 5 },
                overlap_right: if i + 1 == n { 0 } else { 5 },
            })
            .collect()
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        match BatchScheduler::new(0) {
            Err(LongscribeError::InvalidConfiguration { key, .. }) => assert_eq!(key, "batch_size"),
            other => panic!("Expected InvalidConfiguration, got {:?}", other),
        }
    }

    #[test]
    fn test_batches_keep_order() {
        let ws = windows(7);
        let scheduler = BatchScheduler::new(3).unwrap();
        let sizes: Vec<usize> = scheduler.batches(&ws).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(scheduler.batch_count(7), 3);

        let first: Vec<usize> = scheduler
            .batches(&ws)
            .map(|b| b[0].index)
            .collect();
        assert_eq!(first, vec![0, 3, 6]);
    }

    #[test]
    fn test_batch_size_one_is_sequential() {
        let ws = windows(4);
        let scheduler = BatchScheduler::new(1).unwrap();
        assert!(scheduler.batches(&ws).all(|b| b.len() == 1));
        assert_eq!(scheduler.batch_count(4), 4);
    }

    #[test]
    fn test_no_windows_no_batches() {
        let scheduler = BatchScheduler::new(8).unwrap();
        assert_eq!(scheduler.batches(&[]).count(), 0);
        assert_eq!(scheduler.batch_count(0), 0);
    }

    proptest! {
        #[test]
        fn batches_are_bounded_and_reassemble(n in 0usize..200, size in 1usize..20) {
            let ws = windows(n);
            let scheduler = BatchScheduler::new(size).unwrap();

            let batches: Vec<&[Window]> = scheduler.batches(&ws).collect();
            prop_assert_eq!(batches.len(), scheduler.batch_count(n));
            prop_assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= size));

            let rebuilt: Vec<Window> = batches.concat();
            prop_assert_eq!(rebuilt, ws);
        }
    }
}
