//! Tracing initialization.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "MODSPEC_LOG";

static INIT: Once = Once::new();

/// Install the global subscriber.
///
/// Reads `MODSPEC_LOG` (e.g. `MODSPEC_LOG=modspec_core=debug`), falling back
/// to `modspec_core=info`. Output goes to stderr so stdout stays free for
/// JSON. Safe to call more than once.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new("modspec_core=info"));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .init();
    });
}
