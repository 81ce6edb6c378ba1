//! Process start-up shared by every command.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LOG_ENV_VAR;

/// Initialize tracing from the CAFE_LEDGER_LOG environment variable.
///
/// Falls back to "info" ("debug" when `verbose`). Logs go to stderr so command output on
/// stdout stays clean.
pub fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
