//! Counter metrics

use super::labels::*;
use metrics::counter;

/// SASL negotiation started
pub fn auth_attempted(mechanism: &'static str) {
    counter!(AUTH_TOTAL, "mechanism" => mechanism, "result" => "attempted").increment(1);
}

/// SASL negotiation completed
pub fn auth_successful(mechanism: &'static str) {
    counter!(AUTH_TOTAL, "mechanism" => mechanism, "result" => RESULT_OK).increment(1);
}

/// SASL negotiation failed
pub fn auth_failed(mechanism: &'static str, reason: &'static str) {
    counter!(
        AUTH_TOTAL,
        "mechanism" => mechanism,
        "result" => RESULT_ERROR,
        "reason" => reason
    )
    .increment(1);
}

/// Session established
pub fn connection_opened(mode: &'static str) {
    counter!(CONNECTIONS_TOTAL, "mode" => mode).increment(1);
}

/// Session establishment failed
pub fn connection_failed(reason: &'static str) {
    counter!(CONNECTION_ERRORS_TOTAL, "reason" => reason).increment(1);
}

/// Query accepted by the server
pub fn query_submitted() {
    counter!(QUERIES_SUBMITTED_TOTAL).increment(1);
}

/// Query reached the end of its lifecycle
pub fn query_completed(status: &'static str) {
    counter!(QUERIES_COMPLETED_TOTAL, "status" => status).increment(1);
}

/// Remote cancel issued
pub fn cancel(result: &'static str) {
    counter!(CANCELS_TOTAL, "result" => result).increment(1);
}

/// Rows handed to the caller
pub fn rows_fetched(count: u64) {
    counter!(ROWS_FETCHED_TOTAL).increment(count);
}

/// RPC failed
pub fn rpc_error(method: &'static str, kind: &'static str) {
    counter!(RPC_ERRORS_TOTAL, "method" => method, "kind" => kind).increment(1);
}
