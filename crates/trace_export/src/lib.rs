//! Trace Export Pipeline
//!
//! Buffers finished traces from any number of application threads and ships
//! them to a collector from one background worker. Producers never block and
//! never see an error; overload sheds traces through the bounded
//! [`trace_queue::TraceQueue`] and shows up in health metrics instead.
//!
//! Each tick the worker drains the queue, runs the [`FilterChain`], hands the
//! survivors to a [`CollectorTransport`], logs failures (rate-limited), and
//! forwards any sampling rates in the collector's answer to the
//! [`AdaptiveSampler`].
//!
//! This crate uses native async traits (no `#[async_trait]` macro).

pub mod config;
pub mod error;
pub mod filter;
pub mod log_limiter;
pub mod metrics;
pub mod pipeline;
pub mod sampler;
pub mod span;
pub mod transport;
pub mod worker;

// Re-export main types
pub use config::PipelineConfig;
pub use error::{ConfigError, PipelineError};
pub use filter::{DropByResource, FilterChain, FilterError, TraceFilter};
pub use log_limiter::ErrorLogLimiter;
pub use metrics::{
    FlushSummary, HealthMetrics, InMemoryMetricsSink, MetricKind, MetricPoint, MetricsSink,
    TracingMetricsSink,
};
pub use pipeline::{PipelineParts, TracePipeline, TracePipelineBuilder, TraceWriter};
pub use sampler::{AdaptiveSampler, RateByServiceSampler};
pub use span::{Span, TraceBatch};
pub use transport::{
    CollectorResponse, CollectorTransport, CollectorTransportBoxed, JsonFileTransport,
    NullTransport, PayloadStats, SendReport, StdoutTransport, TransportError,
};
pub use worker::{CycleError, CycleReport, ExportWorker, WorkerState};
