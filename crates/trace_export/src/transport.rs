use crate::span::TraceBatch;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Error types for a send attempt that never got an HTTP response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Could not reach the collector (network, socket)
    #[error("connection error: {0}")]
    Connection(String),
    /// The send exceeded its deadline
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
    /// Payload could not be encoded
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Local I/O failure
    #[error("I/O error: {0}")]
    Io(String),
}

impl TransportError {
    /// Short stable name, used as the `error:<kind>` metric tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Timeout(_) => "timeout",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
        }
    }
}

/// Size and content of one network payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PayloadStats {
    /// Encoded size in bytes (0 if never encoded)
    pub size: usize,
    /// Trace batches carried
    pub traces: usize,
    /// Spans carried
    pub spans: usize,
}

impl PayloadStats {
    /// Stats for a payload carrying `batches`, encoded to `size` bytes.
    pub fn for_batches(batches: &[TraceBatch], size: usize) -> Self {
        Self {
            size,
            traces: batches.len(),
            spans: batches.iter().map(TraceBatch::len).sum(),
        }
    }
}

/// Response from the collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorResponse {
    /// HTTP status code
    pub status: u16,
    /// Reason phrase
    pub reason: String,
    /// Response body, if any
    pub body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CollectorFeedback {
    rate_by_service: Option<HashMap<String, f64>>,
}

impl CollectorResponse {
    /// Creates a response without a body.
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            body: None,
        }
    }

    /// A `200 OK` response without a body.
    pub fn ok() -> Self {
        Self::new(200, "OK")
    }

    /// Attaches a body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Returns `true` for statuses the pipeline treats as failures (>= 400).
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// Sampling rates the collector asked for, if the body carries a
    /// `rate_by_service` table.
    ///
    /// A missing body, a body that is not JSON, or a body without the table
    /// all yield `None`.
    pub fn rate_by_service(&self) -> Option<HashMap<String, f64>> {
        let body = self.body.as_deref()?;
        match serde_json::from_str::<CollectorFeedback>(body) {
            Ok(feedback) => feedback.rate_by_service,
            Err(e) => {
                tracing::debug!(error = %e, "collector response body is not valid feedback JSON");
                None
            }
        }
    }
}

/// Outcome of sending one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SendReport {
    /// The collector's response, or why there was none
    pub outcome: Result<CollectorResponse, TransportError>,
    /// What the payload carried
    pub payload: PayloadStats,
}

impl SendReport {
    /// A payload that got a response (which may still be an HTTP error).
    pub fn response(response: CollectorResponse, payload: PayloadStats) -> Self {
        Self {
            outcome: Ok(response),
            payload,
        }
    }

    /// A payload that got no response.
    pub fn error(error: TransportError, payload: PayloadStats) -> Self {
        Self {
            outcome: Err(error),
            payload,
        }
    }

    /// Returns `true` on transport error or HTTP status >= 400.
    pub fn is_failure(&self) -> bool {
        match &self.outcome {
            Ok(response) => response.is_error(),
            Err(_) => true,
        }
    }
}

/// Trait for shipping trace batches to a collector.
///
/// Implementations may group batches into any number of network payloads but
/// must return one [`SendReport`] per payload, whose [`PayloadStats`] account
/// for every batch passed in. Encoding is entirely up to the implementation.
///
/// Uses native async fn in traits. For dynamic dispatch, use
/// [`CollectorTransportBoxed`], which every `CollectorTransport` implements.
pub trait CollectorTransport: Send + Sync {
    /// Sends the batches. Never retries; failures are reported, not raised.
    fn send(&self, batches: Vec<TraceBatch>) -> impl Future<Output = Vec<SendReport>> + Send;

    /// Where the batches go, for log lines.
    fn endpoint(&self) -> &str;
}

/// Object-safe version of [`CollectorTransport`].
pub trait CollectorTransportBoxed: Send + Sync {
    /// Sends the batches (boxed future for object safety).
    fn send_boxed(
        &self,
        batches: Vec<TraceBatch>,
    ) -> Pin<Box<dyn Future<Output = Vec<SendReport>> + Send + '_>>;

    /// Where the batches go, for log lines.
    fn endpoint(&self) -> &str;
}

/// Blanket implementation: any CollectorTransport can be used as CollectorTransportBoxed
impl<T: CollectorTransport> CollectorTransportBoxed for T {
    fn send_boxed(
        &self,
        batches: Vec<TraceBatch>,
    ) -> Pin<Box<dyn Future<Output = Vec<SendReport>> + Send + '_>> {
        Box::pin(self.send(batches))
    }

    fn endpoint(&self) -> &str {
        CollectorTransport::endpoint(self)
    }
}

/// Transport that accepts everything and sends nothing (for benchmarking)
#[derive(Debug, Default)]
pub struct NullTransport;

impl NullTransport {
    pub fn new() -> Self {
        Self
    }
}

impl CollectorTransport for NullTransport {
    async fn send(&self, batches: Vec<TraceBatch>) -> Vec<SendReport> {
        let payload = PayloadStats::for_batches(&batches, 0);
        vec![SendReport::response(CollectorResponse::ok(), payload)]
    }

    fn endpoint(&self) -> &str {
        "null"
    }
}

/// Stdout transport for debugging
#[derive(Debug)]
pub struct StdoutTransport {
    verbose: bool,
}

impl StdoutTransport {
    /// Creates a new stdout transport; `verbose` prints every span.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl CollectorTransport for StdoutTransport {
    async fn send(&self, batches: Vec<TraceBatch>) -> Vec<SendReport> {
        let payload = PayloadStats::for_batches(&batches, 0);
        println!(
            "=== Exporting {} traces ({} spans) ===",
            payload.traces, payload.spans
        );
        if self.verbose {
            for span in batches.iter().flat_map(TraceBatch::spans) {
                println!(
                    "Span: trace_id={:016x} span_id={:016x} service={} resource={} \
                     duration={}ns error={}",
                    span.trace_id,
                    span.span_id,
                    span.service,
                    span.resource,
                    span.duration,
                    span.error
                );
            }
        }
        vec![SendReport::response(CollectorResponse::ok(), payload)]
    }

    fn endpoint(&self) -> &str {
        "stdout"
    }
}

/// Appends each payload as one JSON line to a local file.
#[derive(Debug)]
pub struct JsonFileTransport {
    path: PathBuf,
    endpoint: String,
}

impl JsonFileTransport {
    /// Creates a transport writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let endpoint = format!("file://{}", path.display());
        Self { path, endpoint }
    }

    async fn append(&self, line: &[u8]) -> std::io::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line).await?;
        file.flush().await
    }
}

impl CollectorTransport for JsonFileTransport {
    async fn send(&self, batches: Vec<TraceBatch>) -> Vec<SendReport> {
        let traces: Vec<_> = batches.iter().map(TraceBatch::spans).collect();
        let mut line = match serde_json::to_vec(&traces) {
            Ok(line) => line,
            Err(e) => {
                let payload = PayloadStats::for_batches(&batches, 0);
                return vec![SendReport::error(
                    TransportError::Serialization(e.to_string()),
                    payload,
                )];
            }
        };
        line.push(b'\n');

        let payload = PayloadStats::for_batches(&batches, line.len());
        let report = match self.append(&line).await {
            Ok(()) => SendReport::response(CollectorResponse::ok(), payload),
            Err(e) => SendReport::error(TransportError::Io(e.to_string()), payload),
        };
        vec![report]
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
