//! Subscriber setup. Logs go to stderr so stdout carries only payloads.

use anyhow::{Result, anyhow};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

/// Install the global subscriber. `RUST_LOG` overrides `level`.
pub fn init_logging(json: bool, level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if json {
        let json_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE);

        subscriber
            .with(json_layer)
            .try_init()
            .map_err(|e| anyhow!("failed to initialize logging: {e}"))
    } else {
        let pretty_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false);

        subscriber
            .with(pretty_layer)
            .try_init()
            .map_err(|e| anyhow!("failed to initialize logging: {e}"))
    }
}
