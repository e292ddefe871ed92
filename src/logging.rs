//! Logging setup
//!
//! All modules log through `tracing`. This installs a formatting subscriber
//! for binaries and notebooks-turned-scripts that do not bring their own.

use tracing_subscriber::EnvFilter;

/// Default filter used when no level is supplied.
pub const DEFAULT_LEVEL: &str = "warn";

/// Install a global fmt subscriber filtered at `level`.
///
/// `level` is any `EnvFilter` directive (`"info"`, `"trueno_sweep=debug"`).
/// When `RUST_LOG` is set it takes precedence. Returns `false` if a global
/// subscriber was already installed, in which case nothing changes.
///
/// ```rust
/// trueno_sweep::logging::init("info");
/// // second call is a no-op
/// assert!(!trueno_sweep::logging::init("debug"));
/// ```
pub fn init(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_noop() {
        init("debug");
        assert!(!init("info"));
    }

    #[test]
    fn test_init_with_garbage_level_falls_back() {
        // Must not panic on an unparsable directive
        init("not a [valid] directive ===");
    }
}
