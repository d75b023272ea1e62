use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when `RUST_LOG` is not set
///
/// Matches both the `recyclens` binary and the `recyclens_lib` targets.
pub const DEFAULT_FILTER: &str = "recyclens=debug,warn";

/// Initialize logging with tracing
///
/// This function sets up the tracing subscriber with the following configuration:
/// - Reads filter from RUST_LOG environment variable if available
/// - Falls back to [`DEFAULT_FILTER`] if RUST_LOG is not set
/// - Uses a formatted output layer
///
/// Calling it again after a subscriber is installed is a no-op.
///
/// # Example
///
/// ```no_run
/// use recyclens_lib::utils::logging::init_logging;
///
/// init_logging();
/// ```
pub fn init_logging() {
    if try_init_logging().is_ok() {
        tracing::info!("RecycLens logging initialized");
    }
}

/// Like [`init_logging`], but reports whether a global subscriber was
/// already installed
pub fn try_init_logging() -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
}
