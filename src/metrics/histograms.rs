//! Histogram metrics (milliseconds)

use super::labels::*;
use metrics::histogram;

/// Time from dialing to an opened transport
pub fn connect_duration(mode: &'static str, millis: u64) {
    histogram!(CONNECT_DURATION_MS, "mode" => mode).record(millis as f64);
}

/// One request/reply round trip
pub fn rpc_duration(method: &'static str, millis: u64) {
    histogram!(RPC_DURATION_MS, "method" => method).record(millis as f64);
}

/// Time spent polling until a query reached a terminal state
pub fn query_wait_duration(millis: u64) {
    histogram!(QUERY_WAIT_DURATION_MS).record(millis as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        connect_duration(MODE_BUFFERED, 12);
        rpc_duration("fetch", 3);
        query_wait_duration(250);
        crate::metrics::counters::rows_fetched(10);
    }
}
