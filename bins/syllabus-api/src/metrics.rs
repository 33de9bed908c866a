// Prometheus metrics for the evaluation pipeline

use lazy_static::lazy_static;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Once;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref EVALUATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("syllabus_evaluations_total", "Submitted answers by question type and outcome"),
        &["question_type", "outcome"]
    )
    .expect("metric can be created");
    pub static ref RUNNER_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "syllabus_runner_duration_seconds",
            "Time spent waiting for code runner verdicts"
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
    )
    .expect("metric can be created");
}

static REGISTER: Once = Once::new();

/// Register all collectors with the registry. Safe to call more than once.
pub fn register() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(EVALUATIONS_TOTAL.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(RUNNER_DURATION_SECONDS.clone()))
            .expect("collector can be registered");
    });
}

pub fn record_evaluation(question_type: &str, outcome: &str) {
    EVALUATIONS_TOTAL
        .with_label_values(&[question_type, outcome])
        .inc();
}

/// Text exposition of every registered metric
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
