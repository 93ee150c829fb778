//! Outbound adapters: one concrete backend implementation per port family.
//!
//! Every adapter is constructed by [`factory::LiveBackendFactory`] from a
//! validated descriptor and owns exactly one connection pool. Kind
//! branching happens only at this seam; callers see ports.

pub mod cache;
pub mod document;
pub mod factory;
pub mod queue;
mod redis_support;
pub mod relational;

pub use factory::LiveBackendFactory;

use std::time::Duration;

use crate::domain::ports::DrainOutcome;

/// Poll `is_idle` until the pool has no checked-out connections or the
/// drain window elapses.
pub(crate) async fn wait_for_pool_drain(
    drain: Duration,
    is_idle: impl Fn() -> bool,
) -> DrainOutcome {
    let deadline = tokio::time::Instant::now() + drain;
    while !is_idle() {
        if tokio::time::Instant::now() >= deadline {
            return DrainOutcome::Forced;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    DrainOutcome::Clean
}
