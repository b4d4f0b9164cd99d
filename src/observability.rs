use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: bookings committed.
pub const BOOKINGS_TOTAL: &str = "visitplan_bookings_total";

/// Counter: booking attempts rejected by a conflict (duplicate participant,
/// occupied slot, or a lost re-validation race).
pub const BOOKING_CONFLICTS_TOTAL: &str = "visitplan_booking_conflicts_total";

/// Counter: cancellations committed.
pub const CANCELLATIONS_TOTAL: &str = "visitplan_cancellations_total";

/// Histogram: duration of the commit-time snapshot re-validation in seconds.
pub const COMMIT_CHECK_DURATION_SECONDS: &str = "visitplan_commit_check_duration_seconds";

/// Install the Prometheus metrics exporter on the given port. No-op if port
/// is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Install the default fmt tracing subscriber. For embedding binaries that
/// don't configure their own.
pub fn init_tracing() {
    tracing_subscriber::fmt::init();
}
