//! Metric names and label values

/// Unauthenticated buffered transport
pub const MODE_BUFFERED: &str = "buffered";

/// SASL-authenticated transport
pub const MODE_SASL: &str = "sasl";

/// Operation succeeded
pub const RESULT_OK: &str = "ok";

/// Operation failed
pub const RESULT_ERROR: &str = "error";

/// Query finished and was fully consumed
pub const STATUS_FINISHED: &str = "finished";

/// Query ended in the EXCEPTION state
pub const STATUS_FAILED: &str = "failed";

pub(crate) const CONNECTIONS_TOTAL: &str = "impala_wire_connections_total";
pub(crate) const CONNECTION_ERRORS_TOTAL: &str = "impala_wire_connection_errors_total";
pub(crate) const AUTH_TOTAL: &str = "impala_wire_auth_total";
pub(crate) const QUERIES_SUBMITTED_TOTAL: &str = "impala_wire_queries_submitted_total";
pub(crate) const QUERIES_COMPLETED_TOTAL: &str = "impala_wire_queries_completed_total";
pub(crate) const CANCELS_TOTAL: &str = "impala_wire_cancels_total";
pub(crate) const ROWS_FETCHED_TOTAL: &str = "impala_wire_rows_fetched_total";
pub(crate) const RPC_ERRORS_TOTAL: &str = "impala_wire_rpc_errors_total";

pub(crate) const CONNECT_DURATION_MS: &str = "impala_wire_connect_duration_ms";
pub(crate) const RPC_DURATION_MS: &str = "impala_wire_rpc_duration_ms";
pub(crate) const QUERY_WAIT_DURATION_MS: &str = "impala_wire_query_wait_duration_ms";
