//! `tracing` subscriber set-up for the binary.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

const FALLBACK_FILTER: &str = "cadenza=info";

/// `RUST_LOG` wins over the configured filter; an unparsable directive falls
/// back to `cadenza=info`.
fn build_filter(rust_log: Option<&str>, settings: &LoggingSettings) -> EnvFilter {
    rust_log
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .or_else(|| EnvFilter::try_new(&settings.filter).ok())
        .unwrap_or_else(|| EnvFilter::new(FALLBACK_FILTER))
}

/// Install the global subscriber. Logs go to stderr so stdout stays free for
/// command output. Calling this twice is harmless.
pub fn init(settings: &LoggingSettings) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = build_filter(rust_log.as_deref(), settings);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
