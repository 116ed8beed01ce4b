//! Debug assertion macros for queue invariants.
//!
//! Only active in debug builds (`#[cfg(debug_assertions)]`), so there is
//! zero overhead in release builds.

// =============================================================================
// Bounded occupancy
// =============================================================================

/// Assert that the queue never holds more than its capacity.
///
/// **Invariant**: `0 ≤ len ≤ capacity`
///
/// Used in: `enqueue()` after append or overwrite
macro_rules! debug_assert_bounded_len {
    ($len:expr, $capacity:expr) => {
        debug_assert!(
            $len <= $capacity,
            "bounded occupancy violated: len {} exceeds capacity {}",
            $len,
            $capacity
        )
    };
}

/// Assert that an overwrite targets an occupied slot.
///
/// **Invariant**: `idx < len` and `len == capacity` when overwriting
///
/// Used in: `enqueue()` on the overflow path
macro_rules! debug_assert_overwrite_in_range {
    ($idx:expr, $len:expr, $capacity:expr) => {
        debug_assert!(
            $idx < $len && $len == $capacity,
            "overwrite out of range: index {} with len {} (capacity {})",
            $idx,
            $len,
            $capacity
        )
    };
}

// =============================================================================
// Stats accounting
// =============================================================================

/// Assert that the stats counters are mutually consistent.
///
/// **Invariant**: every overwrite is also an accept, so `dropped ≤ accepted`;
/// min never exceeds max; the average lies within `[min, max]` unless a
/// zero-length item cleared the min.
///
/// Used in: `enqueue()` after updating stats
macro_rules! debug_assert_stats_consistent {
    ($stats:expr) => {
        debug_assert!(
            $stats.dropped <= $stats.accepted,
            "stats violated: dropped {} > accepted {}",
            $stats.dropped,
            $stats.accepted
        );
        debug_assert!(
            $stats.accepted_min <= $stats.accepted_max,
            "stats violated: accepted_min {} > accepted_max {}",
            $stats.accepted_min,
            $stats.accepted_max
        );
        debug_assert!(
            $stats.accepted_avg <= $stats.accepted_max,
            "stats violated: accepted_avg {} > accepted_max {}",
            $stats.accepted_avg,
            $stats.accepted_max
        )
    };
}

pub(crate) use debug_assert_bounded_len;
pub(crate) use debug_assert_overwrite_in_range;
pub(crate) use debug_assert_stats_consistent;
