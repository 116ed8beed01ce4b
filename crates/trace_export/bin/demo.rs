//! # Trace Export Pipeline Demo
//!
//! Runs the pipeline end to end against a simulated collector.
//!
//! ## What it shows
//!
//! - Producer threads (plain OS threads, no async) writing traces through
//!   cloned `TraceWriter` handles, never blocking
//! - A small queue that overflows, so random overwrite kicks in
//! - A collector that answers 503 part of the time and sometimes sends back
//!   a `rate_by_service` table, which lands in `RateByServiceSampler`
//! - A `DropByResource` filter discarding health checks
//! - Health metrics emitted through `TracingMetricsSink`
//! - Graceful shutdown with a final drain
//!
//! ## Running
//!
//! ```bash
//! # Quick mode (2 producers, 200 traces each)
//! cargo run -p trace_export --bin trace-export-demo --release -- --quick
//!
//! # Full mode with metric points in the log
//! RUST_LOG=trace_export=trace cargo run -p trace_export --bin trace-export-demo -- --verbose
//! ```

use anyhow::Context;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use trace_export::{
    CollectorResponse, CollectorTransport, DropByResource, PayloadStats, PipelineConfig,
    RateByServiceSampler, SendReport, Span, TraceBatch, TracePipelineBuilder, TracingMetricsSink,
};
use tracing_subscriber::EnvFilter;

/// Collector stand-in with a configurable outage rate.
struct SimulatedCollector {
    failure_rate: f64,
    latency: Duration,
    requests: AtomicU64,
    accepted_traces: AtomicU64,
    last_rates: Mutex<HashMap<String, f64>>,
}

impl SimulatedCollector {
    fn new(failure_rate: f64, latency: Duration) -> Self {
        Self {
            failure_rate,
            latency,
            requests: AtomicU64::new(0),
            accepted_traces: AtomicU64::new(0),
            last_rates: Mutex::new(HashMap::new()),
        }
    }

    /// Rates the collector would ask for, based on what it has seen.
    fn feedback(&self, batches: &[TraceBatch]) -> String {
        let mut rates = self.last_rates.lock();
        for root in batches.iter().filter_map(TraceBatch::root) {
            let key = RateByServiceSampler::key(&root.service, Some("demo"));
            let rate = rates.entry(key).or_insert(1.0);
            *rate = (*rate * 0.9_f64).max(0.1);
        }
        serde_json::json!({ "rate_by_service": &*rates }).to_string()
    }
}

impl CollectorTransport for SimulatedCollector {
    async fn send(&self, batches: Vec<TraceBatch>) -> Vec<SendReport> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(self.latency).await;

        let size = batches.iter().map(|b| b.len() * 120).sum();
        let payload = PayloadStats::for_batches(&batches, size);

        let failed = rand::thread_rng().gen_bool(self.failure_rate);
        let response = if failed {
            CollectorResponse::new(503, "Service Unavailable")
        } else {
            self.accepted_traces
                .fetch_add(batches.len() as u64, Ordering::Relaxed);
            CollectorResponse::ok().with_body(self.feedback(&batches))
        };
        vec![SendReport::response(response, payload)]
    }

    fn endpoint(&self) -> &str {
        "http://collector.demo:8126/v0.4/traces"
    }
}

fn make_trace(trace_id: u64, service: &str, health_check: bool) -> Vec<Span> {
    let resource = if health_check { "GET /health" } else { "GET /users/{id}" };
    let root_id = trace_id << 8;
    let mut root = Span::new(trace_id, root_id, 0, service, "http.request").with_resource(resource);
    root.set_tag("http.method", "GET");

    let children = if health_check { 0 } else { rand::thread_rng().gen_range(1..6) };
    let mut spans: Vec<Span> = (1..=children)
        .map(|i| {
            let mut child = Span::new(trace_id, root_id | i, root_id, service, "db.query");
            child.finish(false);
            child
        })
        .collect();
    root.finish(rand::thread_rng().gen_bool(0.05));
    spans.insert(0, root);
    spans
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let verbose = args.contains(&"--verbose".to_string());
    let quick = args.contains(&"--quick".to_string());

    let num_producers: u64 = if quick { 2 } else { 4 };
    let traces_per_producer: u64 = if quick { 200 } else { 1000 };

    println!("Demo configuration:");
    println!("   Mode: {}", if quick { "quick" } else { "full" });
    println!("   Producers: {}", num_producers);
    println!("   Traces per producer: {}", traces_per_producer);
    println!();

    let collector = Arc::new(SimulatedCollector::new(0.3, Duration::from_millis(20)));
    let sampler = Arc::new(RateByServiceSampler::default());

    let config = PipelineConfig::default()
        .with_queue_capacity(100)
        .with_tick_interval(Duration::from_millis(100))
        .with_send_timeout(Duration::from_millis(500))
        .with_error_log_interval(Duration::from_secs(2))
        .with_health_metrics(verbose);

    let pipeline = TracePipelineBuilder::with_shared_transport(collector.clone())
        .with_config(config)
        .with_filter(DropByResource::new(["GET /health"]))
        .with_sampler(sampler.clone())
        .with_metrics_sink(Arc::new(TracingMetricsSink))
        .start()
        .context("failed to start trace pipeline")?;

    let handles: Vec<_> = (0..num_producers)
        .map(|id| {
            let writer = pipeline.writer();
            std::thread::spawn(move || {
                let service = format!("service-{}", id % 2);
                for seq in 0..traces_per_producer {
                    let trace_id = (id << 32) | (seq + 1);
                    writer.write(make_trace(trace_id, &service, seq % 10 == 0));
                    std::thread::sleep(Duration::from_micros(500));
                }
            })
        })
        .collect();

    for handle in handles {
        if handle.join().is_err() {
            anyhow::bail!("producer thread panicked");
        }
    }

    println!("Producers finished, {} traces still queued", pipeline.queue_len());
    pipeline
        .shutdown()
        .await
        .context("trace pipeline did not shut down cleanly")?;

    println!();
    println!("Collector requests: {}", collector.requests.load(Ordering::Relaxed));
    println!(
        "Traces accepted by collector: {} of {} written",
        collector.accepted_traces.load(Ordering::Relaxed),
        num_producers * traces_per_producer
    );
    println!("Sampling rates from collector:");
    let mut rates: Vec<_> = sampler.rates().iter().map(|(k, v)| (k.clone(), *v)).collect();
    rates.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, rate) in rates {
        println!("   {} => {:.3}", key, rate);
    }
    Ok(())
}
