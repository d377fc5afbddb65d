use std::sync::LazyLock;

use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
};
use prometheus::{Encoder, HistogramVec, IntCounterVec, Registry as PrometheusRegistry, TextEncoder};
use tracing::error;

use crate::error::Error;

pub static POLICY_EVALUATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        "authentication_policy_evaluations_total",
        "Total number of authentication policy evaluations",
        &["policy", "result"],
        &METRICS_PROVIDER.registry
    )
    .expect("Failed to register authentication_policy_evaluations metric")
});

pub static TRIGGER_EVALUATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        "mfa_trigger_evaluations_total",
        "Total number of multifactor trigger evaluations",
        &["trigger", "result"],
        &METRICS_PROVIDER.registry
    )
    .expect("Failed to register mfa_trigger_evaluations metric")
});

pub static REST_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        "rest_endpoint_requests_total",
        "Total number of requests sent to REST policy and trigger endpoints",
        &["endpoint", "result"],
        &METRICS_PROVIDER.registry
    )
    .expect("Failed to register rest_endpoint_requests metric")
});

pub static REST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec_with_registry!(
        "rest_endpoint_duration_seconds",
        "REST policy and trigger endpoint request duration",
        &["endpoint"],
        &METRICS_PROVIDER.registry
    )
    .expect("Failed to register rest_endpoint_duration metric")
});

pub static METRICS_PROVIDER: LazyLock<MetricsProvider> =
    LazyLock::new(|| MetricsProvider::new().expect("Unable to create metrics provider"));

pub struct MetricsProvider {
    registry: PrometheusRegistry,
    pub metric_events_total: IntCounterVec,
}

impl MetricsProvider {
    pub fn new() -> Result<Self, Error> {
        let registry = PrometheusRegistry::new();

        let metric_events_total = register_int_counter_vec_with_registry!(
            "mfa_events_total",
            "Total number of multifactor events resolved, by outcome.",
            &["outcome"],
            &registry
        )
        .map_err(|error| {
            error!("Unable to create mfa_events_total metric: {error}");
            Error::Initialization(String::from("Unable to create mfa_events_total metric"))
        })?;

        Ok(Self {
            registry,
            metric_events_total,
        })
    }

    pub fn gather(&self) -> Result<(String, Vec<u8>), Error> {
        let mut buffer = vec![];
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|error| Error::Execution(format!("Unable to encode metrics: {error}")))?;
        Ok((encoder.format_type().to_string(), buffer))
    }
}
