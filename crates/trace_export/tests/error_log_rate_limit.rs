//! Severity of transport failure logs during a sustained collector outage.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use trace_export::{
    CollectorResponse, CollectorTransport, PayloadStats, PipelineConfig, SendReport, Span,
    TraceBatch, TracePipelineBuilder,
};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

const FAILURE_MESSAGE: &str = "failed to send traces";

/// Records the level of every send-failure event.
#[derive(Clone, Default)]
struct FailureLevels {
    levels: Arc<Mutex<Vec<Level>>>,
}

impl FailureLevels {
    fn levels(&self) -> Vec<Level> {
        self.levels.lock().clone()
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        }
    }
}

impl<S: Subscriber> Layer<S> for FailureLevels {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        if visitor.message.as_deref() == Some(FAILURE_MESSAGE) {
            self.levels.lock().push(*event.metadata().level());
        }
    }
}

/// Collector that is down.
struct Unavailable;

impl CollectorTransport for Unavailable {
    async fn send(&self, batches: Vec<TraceBatch>) -> Vec<SendReport> {
        let payload = PayloadStats::for_batches(&batches, 0);
        vec![SendReport::response(
            CollectorResponse::new(503, "Service Unavailable"),
            payload,
        )]
    }

    fn endpoint(&self) -> &str {
        "test://unavailable"
    }
}

/// Writes one trace half a second before each of `ticks` ticks, then stops
/// the pipeline after the last tick.
async fn run_outage(config: PipelineConfig, ticks: u64) -> Vec<Level> {
    let recorder = FailureLevels::default();
    let subscriber = tracing_subscriber::registry().with(recorder.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let pipeline = TracePipelineBuilder::new(Unavailable)
        .with_config(config)
        .start()
        .unwrap();

    let start = Instant::now();
    for i in 0..ticks {
        tokio::time::sleep_until(start + Duration::from_millis(500 + 1000 * i)).await;
        pipeline.write(vec![Span::new(i + 1, 1, 0, "svc-a", "op")]);
    }
    tokio::time::sleep_until(start + Duration::from_millis(1000 * ticks + 600)).await;
    pipeline.shutdown().await.unwrap();

    recorder.levels()
}

#[tokio::test(start_paused = true)]
async fn test_seventy_failing_ticks_with_sixty_second_window() {
    let config = PipelineConfig::default().with_error_log_interval(Duration::from_secs(60));
    let levels = run_outage(config, 70).await;

    assert_eq!(levels.len(), 70);
    let loud: Vec<usize> = levels
        .iter()
        .enumerate()
        .filter(|(_, level)| **level == Level::ERROR)
        .map(|(i, _)| i)
        .collect();
    // Ticks at t=1s and t=62s; t=61s is still inside the first window.
    assert_eq!(loud, vec![0, 61]);
    assert_eq!(levels.iter().filter(|l| **l == Level::DEBUG).count(), 68);
}

#[tokio::test(start_paused = true)]
async fn test_short_outage_logs_one_error() {
    let config = PipelineConfig::default().with_error_log_interval(Duration::from_secs(60));
    let levels = run_outage(config, 5).await;

    assert_eq!(
        levels,
        vec![Level::ERROR, Level::DEBUG, Level::DEBUG, Level::DEBUG, Level::DEBUG]
    );
}

#[tokio::test(start_paused = true)]
async fn test_zero_window_logs_every_failure_as_error() {
    let config = PipelineConfig::default().with_error_log_interval(Duration::ZERO);
    let levels = run_outage(config, 4).await;

    assert_eq!(levels, vec![Level::ERROR; 4]);
}
