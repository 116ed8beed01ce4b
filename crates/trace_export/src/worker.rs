//! The export worker: one task that owns the drain, filter, send, report cycle.
//!
//! ```text
//! Idle → Draining → Filtering → Sending → Reporting → Idle
//!   └──────────── ShuttingDown (one final bounded cycle) → Terminated
//! ```
//!
//! A cycle never propagates failure out of the worker. Filter errors abort
//! the cycle and discard what was drained; transport failures are logged
//! through [`ErrorLogLimiter`]; a panic anywhere in the cycle is caught and
//! the schedule continues on the next tick.

use crate::config::PipelineConfig;
use crate::filter::{FilterChain, FilterError};
use crate::log_limiter::{log_at, ErrorLogLimiter};
use crate::metrics::{FlushSummary, HealthMetrics};
use crate::pipeline::PipelineParts;
use crate::sampler::AdaptiveSampler;
use crate::span::TraceBatch;
use crate::transport::{CollectorTransportBoxed, PayloadStats, SendReport, TransportError};
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use trace_queue::TraceQueue;

/// Where the worker is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Draining,
    Filtering,
    Sending,
    Reporting,
    ShuttingDown,
    Terminated,
}

/// Why a cycle was aborted.
#[derive(Debug, Error)]
pub enum CycleError {
    /// A filter stage failed; nothing was sent.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// What one completed cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Batches drained from the queue
    pub drained: usize,
    /// Spans across drained batches
    pub spans: usize,
    /// Batches removed by filters
    pub filtered: usize,
    /// Batches handed to the transport
    pub sent: usize,
    /// Reports that were failures (HTTP >= 400 or transport error)
    pub failures: usize,
}

/// Background worker driving export cycles.
pub struct ExportWorker {
    queue: Arc<TraceQueue<TraceBatch>>,
    transport: Arc<dyn CollectorTransportBoxed>,
    filters: FilterChain,
    sampler: Option<Arc<dyn AdaptiveSampler>>,
    metrics: HealthMetrics,
    limiter: ErrorLogLimiter,
    tick_interval: Duration,
    send_timeout: Duration,
    shutdown_timeout: Duration,
    state: WorkerState,
}

impl ExportWorker {
    /// Creates a worker draining `queue`.
    pub fn new(
        queue: Arc<TraceQueue<TraceBatch>>,
        parts: &PipelineParts,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            queue,
            transport: Arc::clone(&parts.transport),
            filters: parts.filters.clone(),
            sampler: parts.sampler.clone(),
            metrics: HealthMetrics::new(parts.metrics_sink.clone(), config.health_metrics_enabled),
            limiter: ErrorLogLimiter::new(config.error_log_interval),
            tick_interval: config.tick_interval,
            send_timeout: config.send_timeout,
            shutdown_timeout: config.shutdown_timeout,
            state: WorkerState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Runs one tick: a full cycle with errors and panics contained.
    ///
    /// Returns the report of a completed cycle, or `None` if it was aborted.
    pub async fn tick(&mut self) -> Option<CycleReport> {
        let result = AssertUnwindSafe(self.run_cycle()).catch_unwind().await;
        self.state = WorkerState::Idle;
        // Aborted cycles still report queue health for this tick.
        self.report_queue();
        match result {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "export cycle aborted, drained traces discarded");
                None
            }
            Err(panic) => {
                tracing::error!(panic = panic_message(&*panic), "export cycle panicked");
                None
            }
        }
    }

    /// One drain, filter, send, report cycle.
    ///
    /// Errors are returned rather than logged; [`tick`](Self::tick) is the
    /// caller that keeps the schedule alive.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        self.metrics.heartbeat();

        self.state = WorkerState::Draining;
        let batches = self.queue.drain_all();
        let mut report = CycleReport {
            drained: batches.len(),
            spans: batches.iter().map(TraceBatch::len).sum(),
            ..CycleReport::default()
        };
        if batches.is_empty() {
            return Ok(report);
        }

        self.state = WorkerState::Filtering;
        let batches = self.filters.apply(batches)?;
        report.filtered = report.drained - batches.len();
        report.sent = batches.len();

        self.state = WorkerState::Sending;
        let reports = if batches.is_empty() {
            Vec::new()
        } else {
            self.send(batches).await
        };

        self.state = WorkerState::Reporting;
        for send_report in &reports {
            if send_report.is_failure() {
                report.failures += 1;
                self.log_failure(send_report);
            } else {
                self.apply_feedback(send_report);
            }
        }

        if self.metrics.is_enabled() {
            let summary =
                FlushSummary::new(report.drained, report.spans, report.filtered, &reports);
            self.metrics.report_flush(&summary);
        }

        tracing::trace!(
            drained = report.drained,
            filtered = report.filtered,
            failures = report.failures,
            "export cycle complete"
        );
        Ok(report)
    }

    /// Sends with the per-call deadline; a timeout fails every batch at once.
    async fn send(&self, batches: Vec<TraceBatch>) -> Vec<SendReport> {
        let payload = PayloadStats::for_batches(&batches, 0);
        match tokio::time::timeout(self.send_timeout, self.transport.send_boxed(batches)).await {
            Ok(reports) => reports,
            Err(_) => vec![SendReport::error(
                TransportError::Timeout(self.send_timeout),
                payload,
            )],
        }
    }

    fn log_failure(&mut self, report: &SendReport) {
        let level = self.limiter.level(Instant::now());
        let endpoint = self.transport.endpoint();
        match &report.outcome {
            Ok(response) => log_at!(
                level,
                endpoint,
                status = response.status,
                reason = %response.reason,
                traces = report.payload.traces,
                "failed to send traces"
            ),
            Err(e) => log_at!(
                level,
                endpoint,
                error = %e,
                traces = report.payload.traces,
                "failed to send traces"
            ),
        }
    }

    fn apply_feedback(&self, report: &SendReport) {
        let (Some(sampler), Ok(response)) = (&self.sampler, &report.outcome) else {
            return;
        };
        if let Some(rates) = response.rate_by_service() {
            sampler.set_sample_rate_by_service(rates);
        }
    }

    fn report_queue(&self) {
        // Stats are only consumed when someone reads them.
        if self.metrics.is_enabled() {
            let stats = self.queue.snapshot_and_reset_stats();
            self.metrics.report_queue(self.queue.capacity(), &stats);
        }
    }

    /// Runs the final cycle bounded by `timeout`, then terminates.
    ///
    /// Anything the final cycle did not get through in time is discarded.
    pub async fn shutdown(&mut self, timeout: Duration) {
        self.state = WorkerState::ShuttingDown;
        tracing::debug!(?timeout, pending = self.queue.len(), "export worker shutting down");
        match tokio::time::timeout(timeout, self.tick()).await {
            Ok(report) => {
                tracing::debug!(?report, "final export cycle finished");
            }
            Err(_) => {
                tracing::warn!(?timeout, "final export cycle timed out, unsent traces discarded");
            }
        }
        self.state = WorkerState::Terminated;
    }

    /// Ticks every `tick_interval` until the shutdown signal arrives.
    ///
    /// The signal carries the final-cycle timeout; a dropped sender means
    /// "shut down with the configured timeout". A signal arriving mid-cycle
    /// abandons that cycle, so shutdown never waits on an in-flight send.
    pub(crate) async fn run(mut self, mut shutdown_rx: oneshot::Receiver<Duration>) {
        let mut interval =
            tokio::time::interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        // A slow cycle must not be followed by a burst of catch-up ticks.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::debug!(
            endpoint = self.transport.endpoint(),
            interval = ?self.tick_interval,
            "export worker started"
        );

        loop {
            tokio::select! {
                biased;

                signal = &mut shutdown_rx => {
                    let timeout = signal.unwrap_or(self.shutdown_timeout);
                    self.shutdown(timeout).await;
                    break;
                }

                _ = interval.tick() => {
                    let signal = tokio::select! {
                        biased;
                        signal = &mut shutdown_rx => Some(signal),
                        _ = self.tick() => None,
                    };
                    if let Some(signal) = signal {
                        tracing::warn!(
                            state = ?self.state,
                            "shutdown requested mid-cycle, in-flight traces discarded"
                        );
                        self.shutdown(signal.unwrap_or(self.shutdown_timeout)).await;
                        break;
                    }
                }
            }
        }

        tracing::debug!("export worker terminated");
    }
}

impl std::fmt::Debug for ExportWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportWorker")
            .field("endpoint", &self.transport.endpoint())
            .field("filters", &self.filters)
            .field("state", &self.state)
            .field("queued", &self.queue.len())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
