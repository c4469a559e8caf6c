use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub dispatches_total: IntCounterVec,
    pub dispatch_latency_seconds: HistogramVec,
    pub drivers_available: IntGauge,
    pub shift_rotations_total: IntCounterVec,
    pub notifications_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let dispatches_total = IntCounterVec::new(
            Opts::new("dispatches_total", "Total SOS dispatch attempts by outcome"),
            &["outcome"],
        )
        .expect("valid dispatches_total metric");

        let dispatch_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "dispatch_latency_seconds",
                "Latency of SOS dispatch handling in seconds",
            ),
            &["outcome"],
        )
        .expect("valid dispatch_latency_seconds metric");

        let drivers_available = IntGauge::new(
            "drivers_available",
            "Current number of drivers accepting calls",
        )
        .expect("valid drivers_available metric");

        let shift_rotations_total = IntCounterVec::new(
            Opts::new("shift_rotations_total", "Shift rotation updates by result"),
            &["result"],
        )
        .expect("valid shift_rotations_total metric");

        let notifications_total = IntCounterVec::new(
            Opts::new("notifications_total", "Dispatch notifications by outcome"),
            &["outcome"],
        )
        .expect("valid notifications_total metric");

        registry
            .register(Box::new(dispatches_total.clone()))
            .expect("register dispatches_total");
        registry
            .register(Box::new(dispatch_latency_seconds.clone()))
            .expect("register dispatch_latency_seconds");
        registry
            .register(Box::new(drivers_available.clone()))
            .expect("register drivers_available");
        registry
            .register(Box::new(shift_rotations_total.clone()))
            .expect("register shift_rotations_total");
        registry
            .register(Box::new(notifications_total.clone()))
            .expect("register notifications_total");

        Self {
            registry,
            dispatches_total,
            dispatch_latency_seconds,
            drivers_available,
            shift_rotations_total,
            notifications_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
