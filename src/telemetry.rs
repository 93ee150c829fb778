//! Structured logging bootstrap.
//!
//! Initialisation is idempotent so embedding applications and tests can call
//! it without coordinating; the first caller wins.

use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the JSON tracing subscriber with `RUST_LOG`-style filtering.
pub fn init() {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init skipped");
    }
}
