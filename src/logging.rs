//! Tracing subscriber setup for the binary.
//!
//! `RUST_LOG` overrides the configured level. HTTP client internals are held
//! at `warn` so request chatter does not drown out the screen's own logs.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Modules pinned to `warn`.
pub const NOISY_MODULES: &[&str] = &["hyper", "hyper_util", "reqwest", "h2", "rustls"];

fn build_filter(log_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let mut directives = String::from(log_level);
    for module in NOISY_MODULES {
        directives.push_str(&format!(",{module}=warn"));
    }
    EnvFilter::new(directives)
}

/// Install the global subscriber. `log_format` is `"json"` or `"pretty"`.
///
/// Logs go to stderr so stdout stays free for the trade summary.
pub fn init_logging(log_level: &str, log_format: &str) {
    let subscriber = tracing_subscriber::registry().with(build_filter(log_level));

    if log_format == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_current_span(true);
        let _ = subscriber.with(fmt_layer).try_init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false);
        let _ = subscriber.with(fmt_layer).try_init();
    }

    tracing::debug!(log_level, log_format, "logging initialized");
}
