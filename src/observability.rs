use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total API operations handled. Labels: op, status.
pub const REQUESTS_TOTAL: &str = "innkeeper_requests_total";

/// Histogram: operation latency in seconds. Labels: op.
pub const REQUEST_DURATION_SECONDS: &str = "innkeeper_request_duration_seconds";

// ── Domain metrics ──────────────────────────────────────────────

/// Counter: reservations successfully created.
pub const RESERVATIONS_CREATED_TOTAL: &str = "innkeeper_reservations_created_total";

/// Counter: reservations successfully deleted.
pub const RESERVATIONS_DELETED_TOTAL: &str = "innkeeper_reservations_deleted_total";

/// Counter: availability computations aborted by a negative minimum.
pub const OVERBOOKING_DETECTED_TOTAL: &str = "innkeeper_overbooking_detected_total";

/// Counter: stored documents that failed to parse back into a reservation.
pub const DOCUMENT_PARSE_FAILURES_TOTAL: &str = "innkeeper_document_parse_failures_total";

// ── Store metrics ───────────────────────────────────────────────

/// Histogram: oplog group-commit flush duration in seconds.
pub const OPLOG_FLUSH_DURATION_SECONDS: &str = "innkeeper_oplog_flush_duration_seconds";

/// Histogram: oplog group-commit batch size (records per flush).
pub const OPLOG_FLUSH_BATCH_SIZE: &str = "innkeeper_oplog_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
