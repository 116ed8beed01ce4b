//! Adaptive sampling feedback.
//!
//! The collector may answer a successful send with a table of per-service
//! sampling rates. The export worker forwards that table to an
//! [`AdaptiveSampler`]; deciding which traces to keep is the sampler's job.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

/// Receiver of collector-provided sampling rates.
pub trait AdaptiveSampler: Send + Sync {
    /// Replaces the rate table with the one the collector sent.
    fn set_sample_rate_by_service(&self, rates: HashMap<String, f64>);
}

/// Rate table keyed by `service:<name>,env:<env>`, as collectors send it.
///
/// The table is swapped atomically on update. Readers load a snapshot
/// without taking a lock, so lookups on the sampling path never block the
/// export worker and vice versa.
#[derive(Debug)]
pub struct RateByServiceSampler {
    rates: ArcSwap<HashMap<String, f64>>,
    default_rate: f64,
}

impl RateByServiceSampler {
    /// Key the collector uses for "any service, any env".
    pub const DEFAULT_KEY: &'static str = "service:,env:";

    /// Creates a sampler that keeps `default_rate` of traces until told otherwise.
    pub fn new(default_rate: f64) -> Self {
        Self {
            rates: ArcSwap::from_pointee(HashMap::new()),
            default_rate: default_rate.clamp(0.0, 1.0),
        }
    }

    /// Builds the table key for a service and environment.
    pub fn key(service: &str, env: Option<&str>) -> String {
        format!("service:{},env:{}", service, env.unwrap_or_default())
    }

    /// Keep-probability for a service, falling back to the collector's
    /// default entry, then to the configured default rate.
    pub fn sample_rate(&self, service: &str, env: Option<&str>) -> f64 {
        let rates = self.rates.load();
        rates
            .get(&Self::key(service, env))
            .or_else(|| rates.get(Self::DEFAULT_KEY))
            .copied()
            .unwrap_or(self.default_rate)
            .clamp(0.0, 1.0)
    }

    /// Current table snapshot.
    pub fn rates(&self) -> Arc<HashMap<String, f64>> {
        self.rates.load_full()
    }
}

impl Default for RateByServiceSampler {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl AdaptiveSampler for RateByServiceSampler {
    fn set_sample_rate_by_service(&self, rates: HashMap<String, f64>) {
        tracing::debug!(services = rates.len(), "updating sample rates from collector");
        self.rates.store(Arc::new(rates));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_order() {
        let sampler = RateByServiceSampler::new(0.8);
        assert_eq!(sampler.sample_rate("svc-a", None), 0.8);

        sampler.set_sample_rate_by_service(HashMap::from([
            ("service:svc-a,env:prod".to_string(), 0.5),
            (RateByServiceSampler::DEFAULT_KEY.to_string(), 0.25),
        ]));

        assert_eq!(sampler.sample_rate("svc-a", Some("prod")), 0.5);
        assert_eq!(sampler.sample_rate("svc-a", None), 0.25);
        assert_eq!(sampler.sample_rate("svc-b", Some("prod")), 0.25);
    }

    #[test]
    fn test_update_replaces_whole_table() {
        let sampler = RateByServiceSampler::default();
        sampler.set_sample_rate_by_service(HashMap::from([("service:a,env:".to_string(), 0.1)]));
        sampler.set_sample_rate_by_service(HashMap::from([("service:b,env:".to_string(), 0.2)]));

        let rates = sampler.rates();
        assert_eq!(rates.len(), 1);
        assert_eq!(sampler.sample_rate("a", None), 1.0);
        assert_eq!(sampler.sample_rate("b", None), 0.2);
    }

    #[test]
    fn test_out_of_range_rates_are_clamped() {
        let sampler = RateByServiceSampler::new(3.0);
        assert_eq!(sampler.sample_rate("x", None), 1.0);
        sampler.set_sample_rate_by_service(HashMap::from([("service:x,env:".to_string(), -1.0)]));
        assert_eq!(sampler.sample_rate("x", None), 0.0);
    }
}
