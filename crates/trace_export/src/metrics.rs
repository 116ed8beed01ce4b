//! Internal health metrics.
//!
//! [`MetricsSink`] is the outlet (a statsd client, a log line, a test
//! recorder). [`HealthMetrics`] decides what the pipeline emits: the liveness
//! heartbeat whenever a sink is present, and queue/flush statistics only when
//! health metrics are enabled as well. Without a sink every call is a no-op.

use crate::transport::{PayloadStats, SendReport};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use trace_queue::QueueStats;

/// Destination for metric points. Tags use the `key:value` form.
pub trait MetricsSink: Send + Sync {
    /// Records the current value of a gauge.
    fn gauge(&self, name: &str, value: f64, tags: &[&str]);

    /// Records one observation in a histogram.
    fn histogram(&self, name: &str, value: f64, tags: &[&str]);

    /// Adds `value` to a counter.
    fn count(&self, name: &str, value: i64, tags: &[&str]);

    /// Adds one to a counter.
    fn increment(&self, name: &str, tags: &[&str]) {
        self.count(name, 1, tags);
    }
}

/// Kind of a recorded metric point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Histogram,
    Count,
}

/// One recorded metric point.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub kind: MetricKind,
    pub name: String,
    pub value: f64,
    pub tags: Vec<String>,
}

/// Sink that keeps every point in memory, for tests and inspection.
#[derive(Debug, Default)]
pub struct InMemoryMetricsSink {
    points: Mutex<Vec<MetricPoint>>,
}

impl InMemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, kind: MetricKind, name: &str, value: f64, tags: &[&str]) {
        self.points.lock().push(MetricPoint {
            kind,
            name: name.to_string(),
            value,
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
        });
    }

    /// Every point recorded so far.
    pub fn points(&self) -> Vec<MetricPoint> {
        self.points.lock().clone()
    }

    /// Points with the given name and kind, in recording order.
    pub fn values(&self, kind: MetricKind, name: &str) -> Vec<f64> {
        self.points
            .lock()
            .iter()
            .filter(|p| p.kind == kind && p.name == name)
            .map(|p| p.value)
            .collect()
    }

    /// Sum of a counter across all tags.
    pub fn count_total(&self, name: &str) -> f64 {
        self.values(MetricKind::Count, name).iter().sum()
    }

    /// Sum of a counter for points carrying `tag`.
    pub fn count_with_tag(&self, name: &str, tag: &str) -> f64 {
        self.points
            .lock()
            .iter()
            .filter(|p| p.kind == MetricKind::Count && p.name == name)
            .filter(|p| p.tags.iter().any(|t| t == tag))
            .map(|p| p.value)
            .sum()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.points.lock().clear();
    }
}

impl MetricsSink for InMemoryMetricsSink {
    fn gauge(&self, name: &str, value: f64, tags: &[&str]) {
        self.record(MetricKind::Gauge, name, value, tags);
    }

    fn histogram(&self, name: &str, value: f64, tags: &[&str]) {
        self.record(MetricKind::Histogram, name, value, tags);
    }

    fn count(&self, name: &str, value: i64, tags: &[&str]) {
        self.record(MetricKind::Count, name, value as f64, tags);
    }
}

/// Sink that turns every point into a `trace`-level log event.
#[derive(Debug, Default)]
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn gauge(&self, name: &str, value: f64, tags: &[&str]) {
        tracing::trace!(target: "trace_export::metrics", metric = name, value, ?tags, "gauge");
    }

    fn histogram(&self, name: &str, value: f64, tags: &[&str]) {
        tracing::trace!(target: "trace_export::metrics", metric = name, value, ?tags, "histogram");
    }

    fn count(&self, name: &str, value: i64, tags: &[&str]) {
        tracing::trace!(target: "trace_export::metrics", metric = name, value, ?tags, "count");
    }
}

/// What one export cycle did, in the shape the flush metrics need.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushSummary {
    /// Batches drained from the queue
    pub traces: usize,
    /// Spans across drained batches
    pub spans: usize,
    /// Batches removed by the filter chain
    pub filtered: usize,
    /// Transport errors grouped by kind
    pub errors: BTreeMap<&'static str, usize>,
    /// Collector responses grouped by status (including >= 400)
    pub responses: BTreeMap<u16, usize>,
    /// One entry per network payload
    pub payloads: Vec<PayloadStats>,
}

impl FlushSummary {
    /// Summarizes the drained/filtered counts and the transport reports.
    pub fn new(traces: usize, spans: usize, filtered: usize, reports: &[SendReport]) -> Self {
        let mut summary = Self {
            traces,
            spans,
            filtered,
            ..Self::default()
        };
        for report in reports {
            match &report.outcome {
                Ok(response) => *summary.responses.entry(response.status).or_default() += 1,
                Err(error) => *summary.errors.entry(error.kind()).or_default() += 1,
            }
            summary.payloads.push(report.payload);
        }
        summary
    }

    /// Number of transport calls that produced a report.
    pub fn requests(&self) -> usize {
        self.payloads.len()
    }
}

/// Emits the pipeline's health metrics; a passthrough when disabled.
#[derive(Clone, Default)]
pub struct HealthMetrics {
    sink: Option<Arc<dyn MetricsSink>>,
    enabled: bool,
}

impl HealthMetrics {
    /// Creates a collector over an optional sink.
    pub fn new(sink: Option<Arc<dyn MetricsSink>>, enabled: bool) -> Self {
        Self { sink, enabled }
    }

    /// Returns `true` if queue and flush statistics are emitted.
    pub fn is_enabled(&self) -> bool {
        self.enabled && self.sink.is_some()
    }

    fn stats_sink(&self) -> Option<&dyn MetricsSink> {
        if self.enabled {
            self.sink.as_deref()
        } else {
            None
        }
    }

    /// Liveness signal, sent every tick whenever a sink exists.
    pub fn heartbeat(&self) {
        if let Some(sink) = self.sink.as_deref() {
            sink.gauge("tracer.heartbeat", 1.0, &[]);
            // Counter, not gauge: several writers per process must add up.
            sink.increment("tracer.writers", &[]);
        }
    }

    /// Queue capacity and the stats gathered since the previous report.
    pub fn report_queue(&self, capacity: usize, stats: &QueueStats) {
        let Some(sink) = self.stats_sink() else {
            return;
        };
        sink.gauge("tracer.queue.max_length", capacity as f64, &[]);

        sink.histogram("tracer.queue.dropped.traces", stats.dropped as f64, &[]);
        sink.count("tracer.queue.dropped.traces.sum", stats.dropped as i64, &[]);
        sink.histogram("tracer.queue.enqueued.traces", stats.accepted as f64, &[]);
        sink.count("tracer.queue.enqueued.traces.sum", stats.accepted as i64, &[]);
        sink.gauge("tracer.queue.enqueued.spans.sum", stats.accepted_sum as f64, &[]);
        sink.gauge("tracer.queue.enqueued.spans.min", stats.accepted_min as f64, &[]);
        sink.gauge("tracer.queue.enqueued.spans.max", stats.accepted_max as f64, &[]);
        sink.gauge("tracer.queue.enqueued.spans.avg", stats.accepted_avg as f64, &[]);
    }

    /// Statistics about one flush.
    pub fn report_flush(&self, summary: &FlushSummary) {
        let Some(sink) = self.stats_sink() else {
            return;
        };
        sink.increment("tracer.flushes", &[]);
        sink.histogram("tracer.flush.traces", summary.traces as f64, &[]);
        sink.count("tracer.flush.traces.sum", summary.traces as i64, &[]);
        sink.histogram("tracer.flush.spans", summary.spans as f64, &[]);
        sink.count("tracer.flush.spans.sum", summary.spans as i64, &[]);

        flush_stat(sink, "traces.filtered", summary.filtered, &[]);
        flush_stat(sink, "api.requests", summary.requests(), &[]);

        for (kind, n) in &summary.errors {
            let tag = format!("error:{}", kind);
            flush_stat(sink, "api.errors", *n, &[&tag]);
        }
        for (status, n) in &summary.responses {
            let tag = format!("status:{}", status);
            flush_stat(sink, "api.responses", *n, &[&tag]);
        }

        flush_stat(sink, "payloads", summary.payloads.len(), &[]);
        for payload in &summary.payloads {
            flush_stat(sink, "payload.size", payload.size, &[]);
            flush_stat(sink, "payload.traces", payload.traces, &[]);
            flush_stat(sink, "payload.spans", payload.spans, &[]);
        }
    }
}

/// `tracer.flush.<name>` histogram plus `tracer.<name>` counter.
fn flush_stat(sink: &dyn MetricsSink, name: &str, value: usize, tags: &[&str]) {
    sink.histogram(&format!("tracer.flush.{}", name), value as f64, tags);
    sink.count(&format!("tracer.{}", name), value as i64, tags);
}

impl std::fmt::Debug for HealthMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMetrics")
            .field("has_sink", &self.sink.is_some())
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{CollectorResponse, TransportError};
    use std::time::Duration;

    fn health(enabled: bool) -> (HealthMetrics, Arc<InMemoryMetricsSink>) {
        let sink = Arc::new(InMemoryMetricsSink::new());
        (HealthMetrics::new(Some(sink.clone()), enabled), sink)
    }

    #[test]
    fn test_no_sink_is_noop() {
        let metrics = HealthMetrics::default();
        assert!(!metrics.is_enabled());
        metrics.heartbeat();
        metrics.report_queue(10, &QueueStats::default());
    }

    #[test]
    fn test_heartbeat_without_health_metrics() {
        let (metrics, sink) = health(false);
        metrics.heartbeat();
        metrics.report_queue(10, &QueueStats::default());
        metrics.report_flush(&FlushSummary::default());

        assert_eq!(sink.values(MetricKind::Gauge, "tracer.heartbeat"), vec![1.0]);
        assert_eq!(sink.count_total("tracer.writers"), 1.0);
        assert_eq!(sink.points().len(), 2);
    }

    #[test]
    fn test_queue_report() {
        let (metrics, sink) = health(true);
        let stats = QueueStats {
            dropped: 1,
            accepted: 3,
            accepted_sum: 10,
            accepted_min: 2,
            accepted_max: 5,
            accepted_avg: 4,
        };
        metrics.report_queue(2, &stats);

        assert_eq!(sink.values(MetricKind::Gauge, "tracer.queue.max_length"), vec![2.0]);
        assert_eq!(sink.count_total("tracer.queue.dropped.traces.sum"), 1.0);
        assert_eq!(sink.count_total("tracer.queue.enqueued.traces.sum"), 3.0);
        assert_eq!(sink.values(MetricKind::Gauge, "tracer.queue.enqueued.spans.avg"), vec![4.0]);
    }

    #[test]
    fn test_flush_summary_grouping() {
        let payload = PayloadStats { size: 100, traces: 2, spans: 5 };
        let reports = vec![
            SendReport::response(CollectorResponse::ok(), payload),
            SendReport::response(CollectorResponse::new(503, "Unavailable"), payload),
            SendReport::response(CollectorResponse::new(503, "Unavailable"), payload),
            SendReport::error(TransportError::Timeout(Duration::from_secs(2)), payload),
        ];
        let summary = FlushSummary::new(8, 20, 1, &reports);
        assert_eq!(summary.requests(), 4);
        assert_eq!(summary.responses.get(&503), Some(&2));
        assert_eq!(summary.errors.get("timeout"), Some(&1));

        let (metrics, sink) = health(true);
        metrics.report_flush(&summary);
        assert_eq!(sink.count_total("tracer.flushes"), 1.0);
        assert_eq!(sink.count_with_tag("tracer.api.responses", "status:503"), 2.0);
        assert_eq!(sink.count_with_tag("tracer.api.responses", "status:200"), 1.0);
        assert_eq!(sink.count_with_tag("tracer.api.errors", "error:timeout"), 1.0);
        assert_eq!(sink.count_total("tracer.traces.filtered"), 1.0);
        assert_eq!(sink.values(MetricKind::Histogram, "tracer.flush.payload.size").len(), 4);
    }
}
