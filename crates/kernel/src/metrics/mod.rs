//! Prometheus metrics collection.
//!
//! Provides application metrics in Prometheus format.

use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

/// HTTP request labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    pub method: String,
    pub path: String,
    pub status: u16,
}

/// Entity operation labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EntityLabels {
    pub entity: String,
    pub action: String,
}

/// Application metrics.
pub struct Metrics {
    registry: Registry,

    /// HTTP request counter by method/path/status.
    pub http_requests: Family<HttpLabels, Counter>,

    /// HTTP request duration histogram.
    pub http_duration_seconds: Family<HttpLabels, Histogram>,

    /// Successful entity operations by entity/action.
    pub entity_operations: Family<EntityLabels, Counter>,

    /// List query duration, including count and page.
    pub query_duration_seconds: Histogram,
}

impl Metrics {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        // Counters are exposed with a `_total` suffix.
        let http_requests = Family::<HttpLabels, Counter>::default();
        registry.register(
            "http_requests",
            "Total HTTP requests",
            http_requests.clone(),
        );

        let http_duration_seconds = Family::<HttpLabels, Histogram>::new_with_constructor(|| {
            Histogram::new(exponential_buckets(0.001, 2.0, 12))
        });
        registry.register(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
            http_duration_seconds.clone(),
        );

        let entity_operations = Family::<EntityLabels, Counter>::default();
        registry.register(
            "entity_operations",
            "Completed entity operations",
            entity_operations.clone(),
        );

        let query_duration_seconds = Histogram::new(exponential_buckets(0.0001, 2.0, 14));
        registry.register(
            "query_duration_seconds",
            "List query duration in seconds",
            query_duration_seconds.clone(),
        );

        Self {
            registry,
            http_requests,
            http_duration_seconds,
            entity_operations,
            query_duration_seconds,
        }
    }

    /// Record an HTTP request.
    pub fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let labels = HttpLabels {
            method: method.to_string(),
            path: normalize_path(path),
            status,
        };

        self.http_requests.get_or_create(&labels).inc();
        self.http_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    /// Record a completed entity operation.
    pub fn record_operation(&self, entity: &str, action: &str) {
        let labels = EntityLabels {
            entity: entity.to_string(),
            action: action.to_string(),
        };
        self.entity_operations.get_or_create(&labels).inc();
    }

    pub fn record_query(&self, duration_secs: f64) {
        self.query_duration_seconds.observe(duration_secs);
    }

    /// Encode metrics in Prometheus text format.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        // Prometheus encoding to String buffer is infallible
        #[allow(clippy::expect_used)]
        encode(&mut buffer, &self.registry).expect("encoding metrics");
        buffer
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish()
    }
}

/// Normalize a path for metrics labels.
///
/// Replaces UUID and numeric segments with `{id}` to limit cardinality.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|s| {
            if uuid::Uuid::parse_str(s).is_ok()
                || (!s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
            {
                "{id}"
            } else {
                s
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/api/students/123"), "/api/students/{id}");
        assert_eq!(
            normalize_path("/api/students/550e8400-e29b-41d4-a716-446655440000"),
            "/api/students/{id}"
        );
        assert_eq!(normalize_path("/api/entities"), "/api/entities");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        let output = metrics.encode();
        assert!(output.contains("# TYPE http_requests counter"));
        assert!(output.contains("# TYPE query_duration_seconds histogram"));
    }

    #[test]
    fn test_record_operation() {
        let metrics = Metrics::new();
        metrics.record_operation("students", "create");
        metrics.record_request("POST", "/api/students", 200, 0.01);

        let output = metrics.encode();
        assert!(output.contains("entity_operations_total{entity=\"students\",action=\"create\"} 1"));
        assert!(output.contains("path=\"/api/students\""));
    }
}
