use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber. `RUST_LOG` controls filtering,
/// defaulting to info for this crate.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,chat_relay_service=info"));

    // Ignore the error if a subscriber is already installed (tests)
    let _ = fmt().with_env_filter(filter).try_init();
}
