use crate::invariants::{
    debug_assert_bounded_len, debug_assert_overwrite_in_range, debug_assert_stats_consistent,
};
use crate::sync::Mutex;
use crate::{QueueConfig, QueueError, QueueStats};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Items stored in a [`TraceQueue`] report how many spans they carry.
///
/// The count feeds the `accepted_*` statistics. It should be computed once
/// when the item is built rather than on every call.
pub trait SpanCount {
    /// Number of spans carried by this item.
    fn span_count(&self) -> usize;
}

impl<T> SpanCount for Vec<T> {
    fn span_count(&self) -> usize {
        self.len()
    }
}

/// What `enqueue` did with an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// The item went into a free slot.
    Appended,
    /// The queue was full; the item replaced a random occupied slot.
    Overwrote,
}

/// Bounded, thread-safe trace buffer with overwrite-on-full eviction.
///
/// Many producers call [`enqueue`](Self::enqueue); one consumer periodically
/// calls [`drain_all`](Self::drain_all). Storage and statistics share a single
/// mutex so that an insert, an overwrite, a drain and a stats reset can never
/// interleave into an inconsistent count.
///
/// # Ordering
///
/// Drained items come back in insertion order until the first overwrite;
/// after that, an overwritten slot holds the newer item at the older position.
pub struct TraceQueue<T> {
    state: Mutex<QueueState<T>>,
    capacity: usize,
}

struct QueueState<T> {
    items: Vec<T>,
    stats: QueueStats,
    rng: StdRng,
    /// Set on the first overwrite after a drain; limits overflow warnings.
    overflowing: bool,
}

impl<T: SpanCount> TraceQueue<T> {
    /// Creates a new queue. Fails if the configuration is invalid.
    pub fn new(config: QueueConfig) -> Result<Self, QueueError> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Creates a queue whose overwrite choices come from a seeded RNG.
    ///
    /// Useful for reproducible tests and simulations.
    pub fn with_seed(config: QueueConfig, seed: u64) -> Result<Self, QueueError> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: QueueConfig, rng: StdRng) -> Result<Self, QueueError> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(QueueState {
                items: Vec::new(),
                stats: QueueStats::default(),
                rng,
                overflowing: false,
            }),
            capacity: config.capacity,
        })
    }

    /// Inserts an item. Never blocks on capacity and never fails.
    ///
    /// When the queue is full the item overwrites a uniformly random occupied
    /// slot; the overwrite is counted as one dropped and one accepted item.
    pub fn enqueue(&self, item: T) -> Enqueued {
        let span_count = item.span_count();
        let mut state = self.state.lock();

        if state.items.len() < self.capacity {
            state.items.push(item);
            state.stats.record_accepted(span_count);

            debug_assert_bounded_len!(state.items.len(), self.capacity);
            debug_assert_stats_consistent!(state.stats);
            return Enqueued::Appended;
        }

        // Occupancy is read under the same lock a drain takes, so a full queue
        // always has an occupied slot to overwrite here.
        let len = state.items.len();
        let idx = state.rng.gen_range(0..len);
        debug_assert_overwrite_in_range!(idx, len, self.capacity);

        let evicted = std::mem::replace(&mut state.items[idx], item);
        state.stats.record_dropped();
        state.stats.record_accepted(span_count);
        debug_assert_stats_consistent!(state.stats);

        let first_overwrite = !state.overflowing;
        state.overflowing = true;
        drop(state);

        // Free the evicted item outside the critical section.
        drop(evicted);

        if first_overwrite {
            tracing::warn!(
                capacity = self.capacity,
                "trace queue is full, some traces will be lost"
            );
        }
        Enqueued::Overwrote
    }

    /// Removes and returns everything currently queued.
    ///
    /// Non-blocking apart from the short critical section: the storage is
    /// swapped for an empty one and the old contents handed to the caller.
    /// Returns an empty `Vec` if nothing is queued.
    pub fn drain_all(&self) -> Vec<T> {
        let mut state = self.state.lock();
        state.overflowing = false;
        std::mem::take(&mut state.items)
    }

    /// Returns the statistics gathered since the last call and zeroes them,
    /// in one critical section.
    pub fn snapshot_and_reset_stats(&self) -> QueueStats {
        std::mem::take(&mut self.state.lock().stats)
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of items held at once.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> std::fmt::Debug for TraceQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceQueue")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
