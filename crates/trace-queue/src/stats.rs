/// Accept/drop statistics for a [`TraceQueue`](crate::TraceQueue).
///
/// Counters cover every insertion since the last
/// [`snapshot_and_reset_stats`](crate::TraceQueue::snapshot_and_reset_stats).
/// An insertion that overwrites an existing item counts as one dropped item
/// *and* one accepted item, so `dropped <= accepted` always holds and
/// `accepted` equals the number of `enqueue` calls.
///
/// Plain `u64` fields: the queue mutates them under its own lock, so no
/// atomics are needed here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Items overwritten because the queue was full
    pub dropped: u64,
    /// Items inserted (appended or overwriting)
    pub accepted: u64,
    /// Total spans across accepted items
    pub accepted_sum: u64,
    /// Smallest accepted span count (0 until something is accepted)
    pub accepted_min: u64,
    /// Largest accepted span count
    pub accepted_max: u64,
    /// `ceil(accepted_sum / accepted)`
    pub accepted_avg: u64,
}

impl QueueStats {
    /// Records an accepted item with `span_count` spans.
    pub(crate) fn record_accepted(&mut self, span_count: usize) {
        let len = span_count as u64;
        self.accepted += 1;
        self.accepted_sum += len;
        // Zero doubles as "unset" for min and max.
        self.accepted_min = if self.accepted_min > 0 {
            self.accepted_min.min(len)
        } else {
            len
        };
        self.accepted_max = if self.accepted_max > 0 {
            self.accepted_max.max(len)
        } else {
            len
        };
        self.accepted_avg = self.accepted_sum.div_ceil(self.accepted);
    }

    /// Records an item lost to an overwrite.
    pub(crate) fn record_dropped(&mut self) {
        self.dropped += 1;
    }

    /// Returns `true` if every counter is zero.
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accepted() {
        let mut stats = QueueStats::default();
        stats.record_accepted(3);
        stats.record_accepted(2);
        stats.record_accepted(5);

        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.accepted_sum, 10);
        assert_eq!(stats.accepted_min, 2);
        assert_eq!(stats.accepted_max, 5);
        // ceil(10 / 3)
        assert_eq!(stats.accepted_avg, 4);
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn test_zero_length_resets_min_tracking() {
        let mut stats = QueueStats::default();
        stats.record_accepted(4);
        stats.record_accepted(0);
        assert_eq!(stats.accepted_min, 0);

        // min is "unset" again, so the next item replaces it
        stats.record_accepted(6);
        assert_eq!(stats.accepted_min, 6);
        assert_eq!(stats.accepted_max, 6);
    }

    #[test]
    fn test_is_zero() {
        let mut stats = QueueStats::default();
        assert!(stats.is_zero());
        stats.record_dropped();
        assert!(!stats.is_zero());
    }
}
