//! Optional `tracing-subscriber` init helper. The library never installs a
//! global subscriber on its own — callers decide whether and how to do
//! that; this just mirrors the teacher's `main.rs` setup for convenience.

/// Installs an `EnvFilter`-based subscriber writing to stderr, defaulting to
/// `info` level for this crate when `RUST_LOG` is unset.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tdd_coordination=info".parse().expect("valid directive")),
        )
        .with_writer(std::io::stderr)
        .init();
}
