// Metrics and observability module
// This file registers the prometheus metrics for oracle calls and
// route selection

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec,
    HistogramVec, IntCounter,
};

pub static REQ_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "rebalance_request_latency_seconds",
        "latency for oracle calls",
        &["service", "method"]
    )
    .unwrap()
});

pub static REQ_ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "rebalance_request_errors_total",
        "errors by oracle call",
        &["service", "method"]
    )
    .unwrap()
});

pub static ROUTES_REQUESTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "rebalance_routes_requested_total",
        "routes requested from the oracle, summed over batches"
    )
    .unwrap()
});

pub static ROUTE_REJECTIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "rebalance_route_rejections_total",
        "candidate routes dropped by validation",
        &["reason"]
    )
    .unwrap()
});
