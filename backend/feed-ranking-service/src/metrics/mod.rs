//! Feed Ranking Metrics
//!
//! Prometheus metrics for the three feed operations and their candidate sources

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};
use std::time::Duration;

static FEED_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_ranking_requests_total",
        "Total feed requests by feed kind and status",
        &["feed", "status"]
    )
    .expect("Failed to register feed requests metric")
});

static FEED_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "feed_ranking_request_duration_seconds",
        "Duration of feed assembly",
        &["feed"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register feed duration metric")
});

static SOURCE_OUTCOMES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_ranking_source_outcomes_total",
        "Candidate source calls by source and outcome (ok/error/timeout)",
        &["source", "outcome"]
    )
    .expect("Failed to register source outcome metric")
});

static CANDIDATES_PER_PASS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "feed_ranking_candidates",
        "Candidates gathered per ranking pass",
        &["feed"],
        vec![0.0, 5.0, 10.0, 25.0, 50.0, 100.0, 150.0, 200.0, 300.0]
    )
    .expect("Failed to register candidates metric")
});

/// Record a feed request result (ok/error)
pub fn record_request(feed: &str, status: &str) {
    FEED_REQUESTS_TOTAL.with_label_values(&[feed, status]).inc();
}

/// Record how long a feed took to assemble
pub fn record_duration(feed: &str, duration: Duration) {
    FEED_REQUEST_DURATION_SECONDS
        .with_label_values(&[feed])
        .observe(duration.as_secs_f64());
}

/// Record a candidate source call outcome
pub fn record_source_outcome(source: &str, outcome: &str) {
    SOURCE_OUTCOMES_TOTAL
        .with_label_values(&[source, outcome])
        .inc();
}

/// Record candidate pool size for one pass
pub fn record_candidates(feed: &str, count: usize) {
    CANDIDATES_PER_PASS
        .with_label_values(&[feed])
        .observe(count as f64);
}

/// Render the default registry in the text exposition format.
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
