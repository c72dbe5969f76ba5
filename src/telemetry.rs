use tracing_subscriber::{fmt, EnvFilter};

/// Installs the JSON log subscriber filtered by `RUST_LOG`. Calling it again after a subscriber
/// is installed is a no-op.
pub fn init_tracing() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init();
}
