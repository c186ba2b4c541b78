use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "hoteld_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "hoteld_query_duration_seconds";

/// Counter: booking attempts. Labels: outcome (`confirmed` or an error kind).
pub const BOOKINGS_TOTAL: &str = "hoteld_bookings_total";

/// Counter: payment attempts. Labels: outcome (`paid`, `partial` or an error kind).
pub const PAYMENTS_TOTAL: &str = "hoteld_payments_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "hoteld_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "hoteld_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "hoteld_connections_rejected_total";

/// Counter: startup/auth failures.
pub const AUTH_FAILURES_TOTAL: &str = "hoteld_auth_failures_total";

/// Counter: lock waits that hit the lock timeout. Labels: lock.
pub const LOCK_TIMEOUTS_TOTAL: &str = "hoteld_lock_timeouts_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "hoteld_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "hoteld_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertBranch { .. } => "insert_branch",
        Command::InsertRoomType { .. } => "insert_room_type",
        Command::DeleteRoomType { .. } => "delete_room_type",
        Command::InsertRoom { .. } => "insert_room",
        Command::InsertBooking { .. } => "insert_booking",
        Command::CancelBooking { .. } => "cancel_booking",
        Command::CheckIn { .. } => "check_in",
        Command::CheckOut { .. } => "check_out",
        Command::InsertBill { .. } => "insert_bill",
        Command::InsertPayment { .. } => "insert_payment",
        Command::SelectBill { .. } => "select_bill",
        Command::SelectPayments { .. } => "select_payments",
        Command::SelectBookings { .. } => "select_bookings",
        Command::SelectBookedRooms { .. } => "select_booked_rooms",
        Command::SelectAvailability { .. } => "select_availability",
        Command::SelectOccupiedRooms { .. } => "select_occupied_rooms",
        Command::SelectBranches => "select_branches",
        Command::SelectRoomTypes => "select_room_types",
        Command::SelectRooms { .. } => "select_rooms",
    }
}
