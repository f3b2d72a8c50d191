//! Telemetry for the contract system
//!
//! - `metrics` - Prometheus counters and gauges for validation, violations,
//!   budget samples and lifecycle transitions
//! - [`init_tracing`] - structured JSON logging for hosts that do not install
//!   their own subscriber

pub mod metrics;

pub use metrics::ContractMetrics;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a JSON tracing subscriber filtered by `RUST_LOG`.
///
/// Falls back to `debug` or `info` when `RUST_LOG` is unset. Returns `false`
/// when a global subscriber was already installed, which makes repeated calls
/// harmless.
pub fn init_tracing(debug: bool) -> bool {
    let fallback = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .is_ok()
}
