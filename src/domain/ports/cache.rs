//! Port contract for best-effort caching.
//!
//! A cache outage must never fail the caller's primary operation: the port
//! distinguishes `Unavailable` from an ordinary miss (`Ok(None)`) so
//! callers can bypass the cache instead of aborting.

use std::time::Duration;

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced by cache adapters.
    pub enum CacheError {
        /// The cache backend is unreachable or timing out. Degrade
        /// gracefully; never abort the primary operation over this.
        Unavailable { logical_name: String, message: String } => "cache '{logical_name}' unavailable: {message}",
        /// The pool ceiling was reached within the connect timeout.
        PoolExhausted { logical_name: String } => "cache '{logical_name}': connection pool exhausted",
    }
}

/// Capability contract for caches. A missing key is `Ok(None)`, never an
/// error.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Read a cached value.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value, optionally expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Remove a key; removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}
