//! Property-based tests for the queue invariants.
//!
//! Coverage:
//! - bounded occupancy under arbitrary enqueue/drain sequences
//! - accept/drop accounting against a simple model
//! - read-and-reset semantics of the statistics
//! - no item is ever returned by two drains

use proptest::prelude::*;
use trace_queue::{QueueConfig, TraceQueue};

#[derive(Debug, Clone)]
enum Op {
    Enqueue(usize),
    Drain,
    ResetStats,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (0usize..20).prop_map(Op::Enqueue),
        1 => Just(Op::Drain),
        1 => Just(Op::ResetStats),
    ]
}

// =============================================================================
// Bounded occupancy
// "len == min(insertions since last drain, capacity)"
// =============================================================================

proptest! {
    #[test]
    fn prop_len_is_min_of_insertions_and_capacity(
        capacity in 1usize..16,
        inserts in 0usize..64,
    ) {
        let queue = TraceQueue::<Vec<u8>>::new(QueueConfig::new(capacity)).unwrap();

        for i in 0..inserts {
            queue.enqueue(vec![0; i % 4]);
            prop_assert_eq!(queue.len(), (i + 1).min(capacity));
        }

        prop_assert_eq!(queue.drain_all().len(), inserts.min(capacity));
    }
}

// =============================================================================
// Accounting model
// accepted == enqueue calls, dropped == overwrites, sums over accepted items
// =============================================================================

proptest! {
    #[test]
    fn prop_stats_match_model(
        capacity in 1usize..8,
        ops in prop::collection::vec(op(), 1..100),
    ) {
        let queue = TraceQueue::<Vec<u8>>::new(QueueConfig::new(capacity)).unwrap();

        let mut occupancy = 0usize;
        let mut accepted = 0u64;
        let mut dropped = 0u64;
        let mut sum = 0u64;

        for op in ops {
            match op {
                Op::Enqueue(len) => {
                    queue.enqueue(vec![0; len]);
                    accepted += 1;
                    sum += len as u64;
                    if occupancy == capacity {
                        dropped += 1;
                    } else {
                        occupancy += 1;
                    }
                }
                Op::Drain => {
                    prop_assert_eq!(queue.drain_all().len(), occupancy);
                    occupancy = 0;
                }
                Op::ResetStats => {
                    let stats = queue.snapshot_and_reset_stats();
                    prop_assert_eq!(stats.accepted, accepted);
                    prop_assert_eq!(stats.dropped, dropped);
                    prop_assert_eq!(stats.accepted_sum, sum);
                    prop_assert!(stats.dropped <= stats.accepted);
                    if stats.accepted > 0 {
                        prop_assert_eq!(stats.accepted_avg, sum.div_ceil(accepted));
                    }
                    accepted = 0;
                    dropped = 0;
                    sum = 0;
                }
            }
            prop_assert!(queue.len() <= capacity);
        }
    }
}

// =============================================================================
// Read-and-reset
// =============================================================================

proptest! {
    #[test]
    fn prop_second_reset_reads_zero(
        lens in prop::collection::vec(0usize..10, 0..40),
    ) {
        let queue = TraceQueue::<Vec<u8>>::new(QueueConfig::new(5)).unwrap();
        for len in &lens {
            queue.enqueue(vec![0; *len]);
        }

        let first = queue.snapshot_and_reset_stats();
        prop_assert_eq!(first.accepted, lens.len() as u64);

        let second = queue.snapshot_and_reset_stats();
        prop_assert!(second.is_zero(), "second reset not zero: {:?}", second);
    }
}

// =============================================================================
// No duplicate export
// =============================================================================

proptest! {
    #[test]
    fn prop_drained_items_are_unique(
        capacity in 1usize..8,
        rounds in prop::collection::vec(0usize..20, 1..10),
    ) {
        let queue = TraceQueue::<Vec<u32>>::new(QueueConfig::new(capacity)).unwrap();
        let mut next_id = 0u32;
        let mut seen = std::collections::HashSet::new();

        for round in rounds {
            for _ in 0..round {
                queue.enqueue(vec![next_id]);
                next_id += 1;
            }
            for item in queue.drain_all() {
                prop_assert!(seen.insert(item[0]), "item {} drained twice", item[0]);
            }
        }
    }
}
