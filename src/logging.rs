use std::env;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the tracing filter, e.g. `debug` or
/// `mortuary_schedule=debug,reqwest=warn`
pub const LOG_ENV: &str = "MORTUARY_LOG";

pub fn init_logger() {
    // Fall back to `info` when the variable is unset or does not parse
    let filter = env::var(LOG_ENV)
        .ok()
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    // Diagnostics go to stderr so stdout carries only progress lines
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact()
        .init();
}
