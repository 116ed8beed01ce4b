//! Pipeline lifecycle: assembling, starting, recreating and stopping.

use crate::config::PipelineConfig;
use crate::error::{ConfigError, PipelineError};
use crate::filter::{FilterChain, TraceFilter};
use crate::metrics::MetricsSink;
use crate::sampler::AdaptiveSampler;
use crate::span::{Span, TraceBatch};
use crate::transport::{CollectorTransport, CollectorTransportBoxed};
use crate::worker::ExportWorker;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use trace_queue::TraceQueue;

/// Collaborators shared by every incarnation of a pipeline.
///
/// Cloning shares the same transport, filters, sampler and sink.
#[derive(Clone)]
pub struct PipelineParts {
    pub(crate) transport: Arc<dyn CollectorTransportBoxed>,
    pub(crate) filters: FilterChain,
    pub(crate) sampler: Option<Arc<dyn AdaptiveSampler>>,
    pub(crate) metrics_sink: Option<Arc<dyn MetricsSink>>,
}

impl PipelineParts {
    /// Parts with only a transport.
    pub fn new(transport: Arc<dyn CollectorTransportBoxed>) -> Self {
        Self {
            transport,
            filters: FilterChain::default(),
            sampler: None,
            metrics_sink: None,
        }
    }

    /// The collector endpoint.
    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }
}

impl std::fmt::Debug for PipelineParts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineParts")
            .field("endpoint", &self.transport.endpoint())
            .field("filters", &self.filters)
            .field("sampler", &self.sampler.is_some())
            .field("metrics_sink", &self.metrics_sink.is_some())
            .finish()
    }
}

/// Builder for [`TracePipeline`].
///
/// # Example
///
/// ```no_run
/// use trace_export::{NullTransport, PipelineConfig, TracePipelineBuilder, Span};
///
/// # async fn run() -> Result<(), trace_export::PipelineError> {
/// let pipeline = TracePipelineBuilder::new(NullTransport::new())
///     .with_config(PipelineConfig::default().with_queue_capacity(500))
///     .start()?;
///
/// let writer = pipeline.writer();
/// writer.write(vec![Span::new(1, 1, 0, "web", "GET /")]);
///
/// pipeline.shutdown().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TracePipelineBuilder {
    config: PipelineConfig,
    parts: PipelineParts,
}

impl TracePipelineBuilder {
    /// Starts a builder around a transport.
    pub fn new<T: CollectorTransport + 'static>(transport: T) -> Self {
        Self::with_shared_transport(Arc::new(transport))
    }

    /// Starts a builder around an already shared transport.
    pub fn with_shared_transport(transport: Arc<dyn CollectorTransportBoxed>) -> Self {
        Self {
            config: PipelineConfig::default(),
            parts: PipelineParts::new(transport),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Appends a filter to the chain.
    pub fn with_filter<F: TraceFilter + 'static>(mut self, filter: F) -> Self {
        self.parts.filters.push(Arc::new(filter));
        self
    }

    /// Sets the sampler that receives collector feedback.
    pub fn with_sampler(mut self, sampler: Arc<dyn AdaptiveSampler>) -> Self {
        self.parts.sampler = Some(sampler);
        self
    }

    /// Sets the metrics sink.
    pub fn with_metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.parts.metrics_sink = Some(sink);
        self
    }

    /// Validates the configuration and creates a stopped pipeline.
    pub fn build(self) -> Result<TracePipeline, PipelineError> {
        self.config.validate()?;
        TracePipeline::new(self.config, self.parts)
    }

    /// Builds the pipeline and starts its worker on the current runtime.
    pub fn start(self) -> Result<TracePipeline, PipelineError> {
        let mut pipeline = self.build()?;
        pipeline.start()?;
        Ok(pipeline)
    }
}

struct WorkerHandle {
    shutdown_tx: oneshot::Sender<Duration>,
    task: JoinHandle<()>,
}

/// A queue plus the worker exporting it.
///
/// Dropping a running pipeline signals the worker, which runs its final
/// cycle with the configured shutdown timeout in the background. Use
/// [`shutdown`](Self::shutdown) to wait for it.
pub struct TracePipeline {
    config: PipelineConfig,
    parts: PipelineParts,
    queue: Arc<TraceQueue<TraceBatch>>,
    worker: Option<WorkerHandle>,
}

impl TracePipeline {
    fn new(config: PipelineConfig, parts: PipelineParts) -> Result<Self, PipelineError> {
        let queue = TraceQueue::new(config.queue).map_err(ConfigError::from)?;
        Ok(Self {
            config,
            parts,
            queue: Arc::new(queue),
            worker: None,
        })
    }

    /// Spawns the export worker on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::AlreadyStarted`] if the worker was started before
    /// - [`PipelineError::NoRuntime`] when called outside a runtime
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.worker.is_some() {
            return Err(PipelineError::AlreadyStarted);
        }
        let handle = Handle::try_current().map_err(|_| PipelineError::NoRuntime)?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let worker = ExportWorker::new(Arc::clone(&self.queue), &self.parts, &self.config);
        let task = handle.spawn(worker.run(shutdown_rx));

        tracing::info!(
            endpoint = self.parts.endpoint(),
            capacity = self.queue.capacity(),
            "trace pipeline started"
        );
        self.worker = Some(WorkerHandle { shutdown_tx, task });
        Ok(())
    }

    /// A fresh, started pipeline with the same configuration and
    /// collaborators, and an empty queue.
    ///
    /// Used when the host replaces a pipeline whose worker can no longer
    /// run, e.g. in a forked child. This pipeline is left untouched.
    pub fn recreate(&self) -> Result<TracePipeline, PipelineError> {
        let mut pipeline = TracePipeline::new(self.config.clone(), self.parts.clone())?;
        pipeline.start()?;
        Ok(pipeline)
    }

    /// A cloneable producer handle.
    pub fn writer(&self) -> TraceWriter {
        TraceWriter {
            queue: Arc::clone(&self.queue),
        }
    }

    /// Enqueues one trace. See [`TraceWriter::write`].
    pub fn write(&self, spans: Vec<Span>) {
        self.writer().write(spans);
    }

    /// Returns `true` while the worker task is alive.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.task.is_finished())
    }

    /// The configuration this pipeline was built with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Batches currently waiting for the next cycle.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Stops the worker with the configured shutdown timeout.
    pub async fn shutdown(self) -> Result<(), PipelineError> {
        let timeout = self.config.shutdown_timeout;
        self.shutdown_with_timeout(timeout).await
    }

    /// Stops the worker: no more ticks, one final cycle bounded by `timeout`.
    ///
    /// Traces written after this call are never exported.
    pub async fn shutdown_with_timeout(mut self, timeout: Duration) -> Result<(), PipelineError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        // The worker may already be gone; joining reports why.
        let _ = worker.shutdown_tx.send(timeout);
        worker
            .task
            .await
            .map_err(|e| PipelineError::WorkerJoin(e.to_string()))?;
        tracing::info!(endpoint = self.parts.endpoint(), "trace pipeline stopped");
        Ok(())
    }
}

impl std::fmt::Debug for TracePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracePipeline")
            .field("config", &self.config)
            .field("parts", &self.parts)
            .field("queued", &self.queue.len())
            .field("running", &self.is_running())
            .finish()
    }
}

/// Producer handle. Writing never blocks and never fails.
#[derive(Debug, Clone)]
pub struct TraceWriter {
    queue: Arc<TraceQueue<TraceBatch>>,
}

impl TraceWriter {
    /// Enqueues the spans of one finished trace. Empty traces are ignored.
    pub fn write(&self, spans: Vec<Span>) {
        if spans.is_empty() {
            return;
        }
        self.queue.enqueue(TraceBatch::new(spans));
    }

    /// Enqueues an already built batch. Empty batches are ignored.
    pub fn write_batch(&self, batch: TraceBatch) {
        if batch.is_empty() {
            return;
        }
        self.queue.enqueue(batch);
    }
}
