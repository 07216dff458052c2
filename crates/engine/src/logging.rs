//! Structured logging setup.
//!
//! The embedding application is free to install its own `tracing` subscriber
//! instead; this helper is a convenience for binaries (like the demo) that
//! want the SDK's documented defaults: `RUST_LOG`-driven filtering, and a
//! timestamped file under `logs/` when `ENABLE_FILE_LOGGING=true`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Guard returned by [`init`]; keep it alive for the process lifetime when
/// file logging is enabled, otherwise the background writer thread stops.
pub struct LoggingGuard(Option<tracing_appender::non_blocking::WorkerGuard>);

/// Initializes the global `tracing` subscriber. Safe to call once per
/// process; a second call is a no-op (the set-global-default error is
/// swallowed, matching the corpus's tolerance for double-init in tests).
pub fn init() -> LoggingGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if std::env::var("ENABLE_FILE_LOGGING").as_deref() == Ok("true") {
        let file_appender = tracing_appender::rolling::daily("logs", "workbridge.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(non_blocking))
            .try_init();
        LoggingGuard(Some(guard))
    } else {
        let _ = tracing_subscriber::registry().with(filter).with(fmt::layer()).try_init();
        LoggingGuard(None)
    }
}
