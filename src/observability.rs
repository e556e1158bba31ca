use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "lendit_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "lendit_query_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "lendit_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "lendit_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "lendit_connections_rejected_total";

/// Gauge: number of active tenants (loaded engines).
pub const TENANTS_ACTIVE: &str = "lendit_tenants_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "lendit_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "lendit_wal_flush_batch_size";

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

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::CreateUser { .. } => "create_user",
        Command::DeleteUser { .. } => "delete_user",
        Command::CreateItem { .. } => "create_item",
        Command::SetItemAvailable { .. } => "set_item_available",
        Command::RequestBooking { .. } => "request_booking",
        Command::DecideBooking { .. } => "decide_booking",
        Command::AddComment { .. } => "add_comment",
        Command::SelectBookingById { .. } => "select_booking_by_id",
        Command::SelectBookingsByOwner { .. } => "select_bookings_by_owner",
        Command::SelectBookingsByBooker { .. } => "select_bookings_by_booker",
        Command::SelectItems { .. } => "select_items",
        Command::SelectAvailability { .. } => "select_availability",
        Command::CanComment { .. } => "can_comment",
        Command::Listen { .. } => "listen",
    }
}
