//! Logging setup.
//!
//! The binary calls [`init`] once at startup. Everything else uses the `tracing` macros
//! directly.

use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    prelude::*,
};

/// Log to stderr, filtering according to environment variable RUST_LOG, overriding the default
/// level (ERROR) to INFO.
///
/// Records go to stdout by default, so diagnostics must stay off it.
pub fn init() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
