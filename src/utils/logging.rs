use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter applied when `RUST_LOG` is unset: engine internals at debug,
/// everything else at warn
pub const DEFAULT_LOG_FILTER: &str = "echoflow=debug,warn";

/// Install the tracing subscriber
///
/// Honors `RUST_LOG` when set, falling back to [`DEFAULT_LOG_FILTER`].
/// Call once at startup; a second call panics, as the global subscriber
/// can only be set once.
///
/// # Examples
///
/// ```no_run
/// echoflow::utils::logging::init_logging();
/// ```
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
