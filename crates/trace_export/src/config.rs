//! Configuration for the export pipeline.

use crate::error::ConfigError;
use std::time::Duration;
use trace_queue::QueueConfig;

/// Configuration for a [`TracePipeline`](crate::TracePipeline).
///
/// Supplied at construction; there is no runtime reconfiguration.
/// Collector endpoint and transport settings live on the transport itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Trace buffer configuration.
    ///
    /// Default: 1000 batches
    pub queue: QueueConfig,

    /// Time between export cycles.
    ///
    /// Default: 1s
    pub tick_interval: Duration,

    /// Upper bound on one transport call. A send that takes longer counts as
    /// a failure for every batch it carried.
    ///
    /// Default: 2s
    pub send_timeout: Duration,

    /// Upper bound on the final drain-and-send cycle run at shutdown.
    ///
    /// Default: 5s
    pub shutdown_timeout: Duration,

    /// Transport failures are logged at error level at most once per window;
    /// the rest go out at debug level.
    ///
    /// Default: 60s
    pub error_log_interval: Duration,

    /// Emit queue and flush health metrics to the metrics sink.
    /// The heartbeat is sent whenever a sink is present.
    ///
    /// Default: false
    pub health_metrics_enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            tick_interval: Duration::from_secs(1),
            send_timeout: Duration::from_secs(2),
            shutdown_timeout: Duration::from_secs(5),
            error_log_interval: Duration::from_secs(60),
            health_metrics_enabled: false,
        }
    }
}

impl PipelineConfig {
    /// Sets the queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue = self.queue.with_capacity(capacity);
        self
    }

    /// Sets the tick interval.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Sets the per-send timeout.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Sets the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Sets the error log cooldown window.
    pub fn with_error_log_interval(mut self, interval: Duration) -> Self {
        self.error_log_interval = interval;
        self
    }

    /// Enables or disables health metrics.
    pub fn with_health_metrics(mut self, enabled: bool) -> Self {
        self.health_metrics_enabled = enabled;
        self
    }

    /// Checks every setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.queue.validate()?;
        for (field, value) in [
            ("tick_interval", self.tick_interval),
            ("send_timeout", self.send_timeout),
            ("shutdown_timeout", self.shutdown_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration { field });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_queue::QueueError;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert_eq!(config.queue.capacity, 1000);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.error_log_interval, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_values() {
        let zero_tick = PipelineConfig::default().with_tick_interval(Duration::ZERO);
        assert_eq!(
            zero_tick.validate(),
            Err(ConfigError::ZeroDuration { field: "tick_interval" })
        );

        let zero_cap = PipelineConfig::default().with_queue_capacity(0);
        assert_eq!(
            zero_cap.validate(),
            Err(ConfigError::Queue(QueueError::ZeroCapacity))
        );
    }

    #[test]
    fn test_zero_error_log_interval_is_allowed() {
        // Logs every failure at error level.
        let config = PipelineConfig::default().with_error_log_interval(Duration::ZERO);
        assert!(config.validate().is_ok());
    }
}
