//! Structured logging with `tracing`.
//!
//! Library code only emits events through the `tracing` macros. Binaries and
//! tests call [`init_subscriber`] once to get human-readable output on stderr.

/// Initialize the global tracing subscriber with stderr output.
///
/// Subsequent calls are no-ops. `RUST_LOG` takes precedence over `level`.
///
/// # Arguments
///
/// * `level` - Minimum log level or filter directive (e.g. `"info"`,
///   `"parley_client=debug"`).
pub fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // try_init fails if a global subscriber is already installed
    let _ = subscriber.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_subscriber_does_not_panic() {
        init_subscriber("warn");
        init_subscriber("debug");
    }
}
