use crate::cache::RuntimeMode;
use tracing::Level;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::FmtSubscriber;

/// Installs a global fmt subscriber: `DEBUG` in debug mode, `INFO` in production.
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn init_logging(mode: RuntimeMode) -> Result<(), SetGlobalDefaultError> {
    let level = if mode.is_debug() { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
}
