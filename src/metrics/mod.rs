//! Metrics emitted through the `metrics` facade
//!
//! Nothing is recorded unless the application installs a recorder. Label
//! values are static strings so recording never allocates.

pub mod counters;
pub mod histograms;
pub mod labels;
