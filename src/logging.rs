//! Log output for a process embedding the provider.
//!
//! Events go to stderr through a `tracing_subscriber` fmt layer, leaving
//! stdout to the host.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: overrides the default level
//!
//! # Examples
//!
//! ```bash
//! # Lifecycle calls only
//! RUST_LOG=info ./host
//!
//! # Every Flipt request and parent-document rewrite
//! RUST_LOG=flipt_provider=debug ./host
//!
//! # Quiet except for splice decisions
//! RUST_LOG=warn,flipt_provider::document=trace ./host
//! ```

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn install(default_level: &str) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .try_init()
}

/// Install the stderr subscriber at `info` unless `RUST_LOG` says otherwise.
///
/// The subscriber:
/// - writes to **stderr**
/// - filters with `RUST_LOG` when it is set and parses
/// - prints targets, so `flipt_provider::client` lines are easy to grep
/// - leaves out thread ids, file names and line numbers
///
/// # Panics
///
/// If a global subscriber is already installed.
///
/// # Example
///
/// ```ignore
/// use flipt_provider::init_logging;
///
/// fn main() {
///     init_logging();
///     tracing::info!(endpoint = "http://localhost:8080", "provider starting");
/// }
/// ```
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Like [`init_logging`] with `default_level` used when `RUST_LOG` is unset.
///
/// `default_level` takes the same directive syntax as `RUST_LOG`.
///
/// # Panics
///
/// If a global subscriber is already installed.
///
/// # Example
///
/// ```ignore
/// // Request-level logs unless the operator asks for something else.
/// flipt_provider::init_logging_with_default("flipt_provider=debug");
/// ```
pub fn init_logging_with_default(default_level: &str) {
    if let Err(e) = install(default_level) {
        panic!("logging already initialized: {}", e);
    }
}

/// Install the subscriber if none is set. Returns whether this call did it.
///
/// Never panics, so every test may call it.
///
/// # Example
///
/// ```ignore
/// #[tokio::test]
/// async fn test_flag_lifecycle() {
///     flipt_provider::try_init_logging();
///     // ...
/// }
/// ```
pub fn try_init_logging() -> bool {
    install("info").is_ok()
}

#[cfg(test)]
mod tests {
    // Only one global subscriber per process.

    use super::*;

    #[test]
    fn test_filter_directives() {
        for directive in ["info", "flipt_provider=debug", "warn,flipt_provider::document=trace"] {
            assert!(EnvFilter::try_new(directive).is_ok(), "{}", directive);
        }
    }

    #[test]
    fn test_second_install_is_refused() {
        let _ = try_init_logging();
        assert!(!try_init_logging());
    }
}
