// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Order creation
// - Lifecycle commands and their outcomes
// - Compare-and-swap conflicts retried by the lifecycle engine
// - HTTP request counts and latency
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Order Metrics
    pub orders_created: IntCounter,
    pub order_commands: IntCounterVec,
    pub order_command_conflicts: IntCounterVec,

    // HTTP Metrics
    pub http_requests: IntCounterVec,
    pub http_request_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Order Metrics
        let orders_created = IntCounter::new("orders_created_total", "Total orders created")?;
        registry.register(Box::new(orders_created.clone()))?;

        let order_commands = IntCounterVec::new(
            Opts::new("order_commands_total", "Lifecycle commands handled"),
            &["command", "outcome"],
        )?;
        registry.register(Box::new(order_commands.clone()))?;

        let order_command_conflicts = IntCounterVec::new(
            Opts::new(
                "order_command_conflicts_total",
                "Lifecycle writes that lost a version race and were retried",
            ),
            &["command"],
        )?;
        registry.register(Box::new(order_command_conflicts.clone()))?;

        // HTTP Metrics
        let http_requests = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests"),
            &["route", "status"],
        )?;
        registry.register(Box::new(http_requests.clone()))?;

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["route"],
        )?;
        registry.register(Box::new(http_request_duration.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            order_commands,
            order_command_conflicts,
            http_requests,
            http_request_duration,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_order_created(&self) {
        self.orders_created.inc();
    }

    /// Helper to record a lifecycle command outcome
    pub fn record_command(&self, command: &str, outcome: &str) {
        self.order_commands.with_label_values(&[command, outcome]).inc();
    }

    pub fn record_conflict(&self, command: &str) {
        self.order_command_conflicts.with_label_values(&[command]).inc();
    }

    /// Helper to record a served HTTP request
    pub fn record_http_request(&self, route: &str, status: u16, duration_secs: f64) {
        self.http_requests
            .with_label_values(&[route, &status.to_string()])
            .inc();
        self.http_request_duration
            .with_label_values(&[route])
            .observe(duration_secs);
    }
}
