//! trace-queue - Bounded Overwrite-on-Full Trace Buffer
//!
//! A fixed-capacity container that sits between many producer threads (the
//! instrumented application) and a single background consumer (the export
//! worker). Producers never block and never see an error: once the buffer
//! holds `capacity` items, each new item replaces a uniformly random occupied
//! slot instead.
//!
//! # Key Features
//!
//! - Single critical section for insert, overwrite, drain and stats reset
//! - `drain_all` swaps the storage out in O(1) under the lock
//! - Resettable accept/drop statistics (`QueueStats`) read and cleared atomically
//! - Loom model checking behind the `loom` feature
//!
//! # Example
//!
//! ```
//! use trace_queue::{QueueConfig, TraceQueue};
//!
//! // Any `SpanCount` item works; `Vec<T>` counts its elements.
//! let queue = TraceQueue::<Vec<u32>>::new(QueueConfig::new(2)).unwrap();
//!
//! queue.enqueue(vec![1, 2, 3]);
//! queue.enqueue(vec![4, 5]);
//! queue.enqueue(vec![6, 7, 8, 9, 10]); // overwrites one of the first two
//!
//! assert_eq!(queue.len(), 2);
//!
//! let stats = queue.snapshot_and_reset_stats();
//! assert_eq!(stats.accepted, 3);
//! assert_eq!(stats.dropped, 1);
//!
//! let drained = queue.drain_all();
//! assert_eq!(drained.len(), 2);
//! assert!(queue.is_empty());
//! ```

mod config;
mod invariants;
mod queue;
mod stats;
mod sync;

pub use config::{QueueConfig, QueueError, DEFAULT_CAPACITY};
pub use queue::{Enqueued, SpanCount, TraceQueue};
pub use stats::QueueStats;
