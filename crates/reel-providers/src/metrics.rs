//! Provider chain metrics.

use metrics::{counter, histogram};
use reel_models::{Capability, Provider};

/// Metric names as constants for consistency.
pub mod names {
    pub const PROVIDER_ATTEMPTS_TOTAL: &str = "reel_provider_attempts_total";
    pub const PROVIDER_LATENCY_SECONDS: &str = "reel_provider_latency_seconds";
    pub const CHAIN_EXHAUSTED_TOTAL: &str = "reel_chain_exhausted_total";
}

/// Record one provider attempt.
pub fn record_attempt(provider: Provider, capability: Capability, outcome: &'static str, duration_secs: f64) {
    let labels = [
        ("provider", provider.as_str().to_string()),
        ("capability", capability.as_str().to_string()),
        ("outcome", outcome.to_string()),
    ];

    counter!(names::PROVIDER_ATTEMPTS_TOTAL, &labels).increment(1);
    histogram!(names::PROVIDER_LATENCY_SECONDS, &labels).record(duration_secs);
}

/// Record a chain that ran out of providers.
pub fn record_exhausted(capability: Capability) {
    let labels = [("capability", capability.as_str().to_string())];
    counter!(names::CHAIN_EXHAUSTED_TOTAL, &labels).increment(1);
}
