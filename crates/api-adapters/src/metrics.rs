//! Prometheus counters exposed on `/metrics`.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct OutcomeLabels {
    status: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct EndpointLabels {
    endpoint: String,
}

pub struct Metrics {
    registry: Registry,
    evaluations: Family<OutcomeLabels, Counter>,
    archived_by_sweep: Counter,
    rate_limited: Family<EndpointLabels, Counter>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("listing_lifecycle");
        let evaluations = Family::<OutcomeLabels, Counter>::default();
        let archived_by_sweep = Counter::default();
        let rate_limited = Family::<EndpointLabels, Counter>::default();

        registry.register(
            "evaluations",
            "Listing evaluations by outcome status",
            evaluations.clone(),
        );
        registry.register(
            "sweep_archived",
            "Listings archived by sweeps",
            archived_by_sweep.clone(),
        );
        registry.register(
            "rate_limited",
            "Requests rejected by the rate limiter",
            rate_limited.clone(),
        );

        Self {
            registry,
            evaluations,
            archived_by_sweep,
            rate_limited,
        }
    }

    pub fn record_evaluation(&self, status: &str) {
        self.evaluations
            .get_or_create(&OutcomeLabels {
                status: status.to_string(),
            })
            .inc();
    }

    pub fn record_sweep_archived(&self, archived: u64) {
        self.archived_by_sweep.inc_by(archived);
    }

    pub fn record_rate_limited(&self, endpoint: &str) {
        self.rate_limited
            .get_or_create(&EndpointLabels {
                endpoint: endpoint.to_string(),
            })
            .inc();
    }

    /// OpenMetrics text exposition of every registered metric.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_outcomes() {
        let metrics = Metrics::new();
        metrics.record_evaluation("archived");
        metrics.record_evaluation("archived");
        metrics.record_rate_limited("/api/v1/messages/ids");

        let text = metrics.render().unwrap();
        assert!(text.contains("listing_lifecycle_evaluations_total{status=\"archived\"} 2"));
        assert!(text.contains("listing_lifecycle_rate_limited_total"));
    }
}
