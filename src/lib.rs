use std::sync::Once;

pub mod application;
pub mod cli;
pub mod domain;
pub mod io;
pub mod storage;

pub use domain::*;
pub use storage::Repository;

static TRACING_INIT: Once = Once::new();

/// Initializes the global tracing subscriber with sensible defaults.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt};

        let filter = EnvFilter::from_default_env().add_directive("cagnotte=info".parse().unwrap());

        fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    });
}
