//! Error types for pipeline configuration and lifecycle.

use thiserror::Error;
use trace_queue::QueueError;

/// Invalid pipeline configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Queue configuration rejected.
    #[error("invalid queue configuration: {0}")]
    Queue(#[from] QueueError),
    /// A duration that must be positive was zero.
    #[error("{field} must be greater than zero")]
    ZeroDuration {
        /// Name of the offending setting.
        field: &'static str,
    },
}

/// Errors from starting, recreating or stopping a pipeline.
///
/// Producers never see these: writing traces cannot fail.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration rejected at build time.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// `start` called on a pipeline whose worker is already running.
    #[error("export worker already started")]
    AlreadyStarted,
    /// `start` called outside a tokio runtime.
    #[error("no tokio runtime available to spawn the export worker")]
    NoRuntime,
    /// The worker task ended abnormally.
    #[error("export worker task failed: {0}")]
    WorkerJoin(String),
}

impl PipelineError {
    /// Returns `true` if retrying with a different configuration could help.
    #[inline]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
