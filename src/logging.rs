/// Structured logging setup using tracing
///
/// Writes to stderr ONLY (never stdout) so stdout stays clean for report
/// output. Auto-detects format: human-readable with ANSI colors when stderr
/// is a terminal, structured JSON when piped/redirected.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;
use crate::config::Config;

/// Initialize tracing with stderr-only output
///
/// Log level comes from config.log_level; the RUST_LOG env var overrides it
/// at runtime.
pub fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    if std::io::stderr().is_terminal() {
        builder.with_ansi(true).init();
    } else {
        builder.json().init();
    }
}
