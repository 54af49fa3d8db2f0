//! Prometheus metrics collection for production monitoring
//!
//! All metrics are exposed via the `/metrics` endpoint for Prometheus scraping.

use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry,
    register_int_gauge_with_registry, CounterVec, Encoder, HistogramVec, IntGauge, IntGaugeVec,
    IntCounterVec, Registry, TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: std::sync::LazyLock<Registry> = std::sync::LazyLock::new(Registry::new);

/// HTTP read-path metrics
pub mod http {
    use super::{register_int_gauge_with_registry, HistogramVec, IntGauge, IntGaugeVec, REGISTRY};
    use prometheus::{
        register_int_counter_vec_with_registry, HistogramOpts, IntCounterVec, Opts,
    };

    /// Total HTTP requests, labeled by method, path, and status code.
    pub static HTTP_REQUESTS_TOTAL: std::sync::LazyLock<IntCounterVec> = std::sync::LazyLock::new(|| {
        register_int_counter_vec_with_registry!(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "path", "status"],
            REGISTRY.clone()
        )
        .expect("Failed to register HTTP_REQUESTS_TOTAL")
    });

    /// HTTP request duration in seconds, labeled by method and path.
    pub static HTTP_REQUEST_DURATION_SECONDS: std::sync::LazyLock<HistogramVec> = std::sync::LazyLock::new(|| {
        HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["method", "path"],
        )
        .and_then(|m| {
            REGISTRY.register(Box::new(m.clone()))?;
            Ok(m)
        })
        .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS")
    });

    /// Number of in-flight HTTP requests.
    pub static HTTP_REQUESTS_IN_FLIGHT: std::sync::LazyLock<IntGauge> = std::sync::LazyLock::new(|| {
        register_int_gauge_with_registry!(
            "http_requests_in_flight",
            "Number of HTTP requests currently being processed",
            REGISTRY.clone()
        )
        .expect("Failed to register HTTP_REQUESTS_IN_FLIGHT")
    });

    /// In-flight fan-out queries issued by the Aggregator when the cache misses.
    pub static AGGREGATOR_FANOUT_IN_FLIGHT: std::sync::LazyLock<IntGaugeVec> = std::sync::LazyLock::new(|| {
        prometheus::register_int_gauge_vec_with_registry!(
            Opts::new("aggregator_fanout_in_flight", "In-flight aggregator fan-out queries"),
            &["query_kind"],
            REGISTRY.clone()
        )
        .expect("Failed to register AGGREGATOR_FANOUT_IN_FLIGHT")
    });
}

/// Collection engine metrics
pub mod collection {
    use super::{
        register_counter_vec_with_registry, register_histogram_vec_with_registry,
        register_int_gauge_with_registry, CounterVec, HistogramVec, IntGauge, REGISTRY,
    };

    /// Videos collected per task, labeled by source and outcome (`new`/`merged`/`skipped`).
    pub static VIDEOS_COLLECTED_TOTAL: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
        register_counter_vec_with_registry!(
            "videos_collected_total",
            "Total number of videos processed by the collection engine",
            &["source_id", "outcome"],
            REGISTRY.clone()
        )
        .expect("Failed to register VIDEOS_COLLECTED_TOTAL")
    });

    /// Upstream page-fetch duration, labeled by source.
    pub static PAGE_FETCH_DURATION_SECONDS: std::sync::LazyLock<HistogramVec> = std::sync::LazyLock::new(|| {
        register_histogram_vec_with_registry!(
            "page_fetch_duration_seconds",
            "Time to fetch and parse one upstream list page",
            &["source_id"],
            REGISTRY.clone()
        )
        .expect("Failed to register PAGE_FETCH_DURATION_SECONDS")
    });

    /// Number of currently running collection tasks.
    pub static TASKS_RUNNING: std::sync::LazyLock<IntGauge> = std::sync::LazyLock::new(|| {
        register_int_gauge_with_registry!(
            "collection_tasks_running",
            "Number of collection tasks currently running",
            REGISTRY.clone()
        )
        .expect("Failed to register TASKS_RUNNING")
    });

    /// Parse/merge errors recorded into `collect_logs`, labeled by error kind.
    pub static COLLECT_ERRORS_TOTAL: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
        register_counter_vec_with_registry!(
            "collect_errors_total",
            "Total number of recoverable errors recorded during collection",
            &["source_id", "kind"],
            REGISTRY.clone()
        )
        .expect("Failed to register COLLECT_ERRORS_TOTAL")
    });
}

/// Source health metrics
pub mod source_health {
    use super::{register_int_gauge_with_registry, IntGaugeVec, REGISTRY};
    use prometheus::Opts;

    /// Current health status per source (0=healthy, 1=degraded, 2=down).
    pub static SOURCE_STATUS: std::sync::LazyLock<IntGaugeVec> = std::sync::LazyLock::new(|| {
        prometheus::register_int_gauge_vec_with_registry!(
            Opts::new("source_status", "Current health status of an upstream source"),
            &["source_id"],
            REGISTRY.clone()
        )
        .expect("Failed to register SOURCE_STATUS")
    });
}

/// Cache operations (classifier mapping cache, trending cache, recommendation cache)
pub mod cache {
    use super::{register_counter_vec_with_registry, CounterVec, REGISTRY};

    /// Cache hit counter
    pub static CACHE_HITS: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
        register_counter_vec_with_registry!(
            "cache_hits_total",
            "Total number of cache hits",
            &["cache_type", "level"],
            REGISTRY.clone()
        )
        .expect("Failed to register CACHE_HITS")
    });

    /// Cache miss counter
    pub static CACHE_MISSES: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
        register_counter_vec_with_registry!(
            "cache_misses_total",
            "Total number of cache misses",
            &["cache_type", "level"],
            REGISTRY.clone()
        )
        .expect("Failed to register CACHE_MISSES")
    });
}

/// Database operations
pub mod database {
    use super::{
        register_counter_vec_with_registry, register_histogram_vec_with_registry,
        register_int_gauge_with_registry, CounterVec, HistogramVec, IntGauge, REGISTRY,
    };
    use prometheus::{register_gauge_vec_with_registry, GaugeVec, Opts};

    /// Query duration histogram
    pub static DB_QUERY_DURATION: std::sync::LazyLock<HistogramVec> = std::sync::LazyLock::new(|| {
        register_histogram_vec_with_registry!(
            "db_query_duration_seconds",
            "Database query duration in seconds",
            &["operation", "table"],
            REGISTRY.clone()
        )
        .expect("Failed to register DB_QUERY_DURATION")
    });

    /// Active connections gauge
    pub static DB_CONNECTIONS_ACTIVE: std::sync::LazyLock<IntGauge> = std::sync::LazyLock::new(|| {
        register_int_gauge_with_registry!(
            "db_connections_active",
            "Current number of active database connections",
            REGISTRY.clone()
        )
        .expect("Failed to register DB_CONNECTIONS_ACTIVE")
    });

    /// Idle connections gauge
    pub static DB_CONNECTIONS_IDLE: std::sync::LazyLock<IntGauge> = std::sync::LazyLock::new(|| {
        register_int_gauge_with_registry!(
            "db_connections_idle",
            "Current number of idle database connections",
            REGISTRY.clone()
        )
        .expect("Failed to register DB_CONNECTIONS_IDLE")
    });

    /// Configured maximum pool size gauge
    pub static DB_POOL_SIZE_MAX: std::sync::LazyLock<IntGauge> = std::sync::LazyLock::new(|| {
        register_int_gauge_with_registry!(
            "db_pool_size_max",
            "Configured maximum database connection pool size",
            REGISTRY.clone()
        )
        .expect("Failed to register DB_POOL_SIZE_MAX")
    });

    /// Fraction of the pool currently in use, labeled by pool name.
    pub static DB_POOL_UTILIZATION: std::sync::LazyLock<GaugeVec> = std::sync::LazyLock::new(|| {
        register_gauge_vec_with_registry!(
            Opts::new("db_pool_utilization_ratio", "Fraction of the database pool currently in use"),
            &["pool"],
            REGISTRY.clone()
        )
        .expect("Failed to register DB_POOL_UTILIZATION")
    });

    /// Query error counter
    pub static DB_QUERY_ERRORS: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
        register_counter_vec_with_registry!(
            "db_query_errors_total",
            "Total number of database query errors",
            &["operation", "error_type"],
            REGISTRY.clone()
        )
        .expect("Failed to register DB_QUERY_ERRORS")
    });
}

/// Hit tracker flush metrics
pub mod hits {
    use super::{register_counter_vec_with_registry, register_int_gauge_with_registry, CounterVec, IntGauge, REGISTRY};

    /// Total hits flushed from the in-memory counter into storage.
    pub static HITS_FLUSHED_TOTAL: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
        register_counter_vec_with_registry!(
            "hits_flushed_total",
            "Total number of view hits flushed to storage",
            &["video_id_bucket"],
            REGISTRY.clone()
        )
        .expect("Failed to register HITS_FLUSHED_TOTAL")
    });

    /// Number of distinct videos pending flush in the in-memory counter.
    pub static HITS_PENDING: std::sync::LazyLock<IntGauge> = std::sync::LazyLock::new(|| {
        register_int_gauge_with_registry!(
            "hits_pending",
            "Number of distinct videos with unflushed hit counts",
            REGISTRY.clone()
        )
        .expect("Failed to register HITS_PENDING")
    });
}

/// Helper macro to record HTTP request metrics
#[macro_export]
macro_rules! record_http_request {
    ($method:expr, $path:expr, $status:expr, $duration:expr) => {
        let status_str = $status.to_string();
        let method_str = $method.to_string();

        $crate::metrics::http::HTTP_REQUEST_DURATION_SECONDS
            .with_label_values(&[&method_str, $path])
            .observe($duration.as_secs_f64());

        $crate::metrics::http::HTTP_REQUESTS_TOTAL
            .with_label_values(&[&method_str, $path, &status_str])
            .inc();
    };
}

/// Helper macro to record cache metrics
#[macro_export]
macro_rules! record_cache_hit {
    ($cache_type:expr, $level:expr) => {
        $crate::metrics::cache::CACHE_HITS
            .with_label_values(&[$cache_type, $level])
            .inc();
    };
}

#[macro_export]
macro_rules! record_cache_miss {
    ($cache_type:expr, $level:expr) => {
        $crate::metrics::cache::CACHE_MISSES
            .with_label_values(&[$cache_type, $level])
            .inc();
    };
}

/// Normalize a request path for metric labels.
///
/// Replaces path parameters (video/source ids) with placeholders to avoid
/// high-cardinality labels.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let mut result = Vec::with_capacity(segments.len());

    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            result.push(*segment);
            continue;
        }

        let prev = if i > 0 { segments.get(i - 1) } else { None };
        let is_id = matches!(prev, Some(&"videos" | &"sources" | &"tasks"));

        if is_id {
            result.push(":id");
        } else {
            result.push(segment);
        }
    }

    result.join("/")
}

/// Expose metrics in Prometheus format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {}
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            return String::from("# Failed to encode metrics\n");
        }
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Metrics buffer contains invalid UTF-8: {}", e);
        String::from("# Invalid UTF-8 in metrics\n")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        http::HTTP_REQUEST_DURATION_SECONDS.with_label_values(&["GET", "/test"]).observe(0.1);
        http::HTTP_REQUESTS_TOTAL.with_label_values(&["GET", "/test", "200"]).inc();

        let encoder = TextEncoder::new();
        let metric_families = REGISTRY.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("http_request_duration_seconds"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/videos/abc123"), "/videos/:id");
        assert_eq!(normalize_path("/sources/s1/health"), "/sources/:id/health");
        assert_eq!(normalize_path("/search"), "/search");
    }
}
