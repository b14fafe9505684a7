use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .unwrap();

    // Interaction Metrics
    pub static ref INTERACTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "interactions_total",
        "Total number of Discord interactions received",
        &["kind"]
    )
    .unwrap();

    // Verification Metrics
    pub static ref VERIFICATION_FLOWS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "verification_flows_total",
        "Total number of verification flows by outcome",
        &["outcome"]
    )
    .unwrap();

    pub static ref VERIFICATION_FLOWS_ACTIVE: IntGauge = register_int_gauge!(
        "verification_flows_active",
        "Number of verification flows waiting on user input"
    )
    .unwrap();

    pub static ref RESPONSE_STORE_WRITES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "response_store_writes_total",
        "Total number of response store writes",
        &["status"]
    )
    .unwrap();

    // Platform Metrics
    pub static ref PLATFORM_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "platform_requests_total",
        "Total number of Discord REST calls",
        &["operation", "status"]
    )
    .unwrap();

    pub static ref PLATFORM_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "platform_request_duration_seconds",
        "Discord REST call duration in seconds",
        &["operation"],
        vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track a platform call with metrics
pub async fn track_platform_operation<F, T, E>(operation: &str, future: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    PLATFORM_REQUESTS_TOTAL
        .with_label_values(&[operation, status])
        .inc();

    PLATFORM_REQUEST_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration);

    result
}

pub fn record_interaction(kind: &str) {
    INTERACTIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_store_write(success: bool) {
    let status = if success { "success" } else { "error" };
    RESPONSE_STORE_WRITES_TOTAL.with_label_values(&[status]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let _ = HTTP_REQUESTS_TOTAL
            .with_label_values(&["POST", "/interactions", "200"])
            .get();
        let _ = VERIFICATION_FLOWS_ACTIVE.get();
    }

    #[test]
    fn test_render_metrics() {
        VERIFICATION_FLOWS_TOTAL
            .with_label_values(&["passed"])
            .inc();

        let output = render_metrics().expect("metrics render");
        assert!(output.contains("verification_flows_total"));
    }

    #[tokio::test]
    async fn track_platform_operation_counts_errors() {
        let before = PLATFORM_REQUESTS_TOTAL
            .with_label_values(&["test_op", "error"])
            .get();
        let result: Result<(), &str> = track_platform_operation("test_op", async { Err("nope") }).await;
        assert!(result.is_err());
        let after = PLATFORM_REQUESTS_TOTAL
            .with_label_values(&["test_op", "error"])
            .get();
        assert_eq!(after, before + 1);
    }
}
