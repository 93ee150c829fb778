//! Immutable descriptions of one infrastructure target each.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use super::ConfigurationError;

/// The backend families a descriptor can select.
///
/// The three relational kinds differ only in how the adapter interprets
/// schema; all of them satisfy the same relational port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Relational store driven through object mapping (Diesel).
    RelationalOrm,
    /// Relational store executing hand-written statements (sqlx).
    RelationalRaw,
    /// Relational store whose schema is declared in YAML and materialized
    /// at startup.
    RelationalYamlSchema,
    /// Document store (MongoDB).
    Document,
    /// Best-effort cache (Redis).
    Cache,
    /// At-least-once task queue (Redis lists).
    Queue,
}

impl BackendKind {
    /// Parse the configuration spelling of a kind.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "relational_orm" => Some(Self::RelationalOrm),
            "relational_raw" => Some(Self::RelationalRaw),
            "relational_yaml_schema" => Some(Self::RelationalYamlSchema),
            "document" => Some(Self::Document),
            "cache" => Some(Self::Cache),
            "queue" => Some(Self::Queue),
            _ => None,
        }
    }

    /// Stable configuration spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RelationalOrm => "relational_orm",
            Self::RelationalRaw => "relational_raw",
            Self::RelationalYamlSchema => "relational_yaml_schema",
            Self::Document => "document",
            Self::Cache => "cache",
            Self::Queue => "queue",
        }
    }

    /// The port family adapters of this kind expose.
    pub fn family(self) -> PortFamily {
        match self {
            Self::RelationalOrm | Self::RelationalRaw | Self::RelationalYamlSchema => {
                PortFamily::Relational
            }
            Self::Document => PortFamily::Document,
            Self::Cache => PortFamily::Cache,
            Self::Queue => PortFamily::Queue,
        }
    }

    /// Durable stores start before (and stop after) the ephemeral ones.
    pub fn is_durable(self) -> bool {
        matches!(self.family(), PortFamily::Relational | PortFamily::Document)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One capability contract per backend concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortFamily {
    Relational,
    Document,
    Cache,
    Queue,
}

impl fmt::Display for PortFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Relational => "relational",
            Self::Document => "document",
            Self::Cache => "cache",
            Self::Queue => "queue",
        };
        f.write_str(name)
    }
}

/// Bounded retry budget for connection establishment.
///
/// Only transient construction failures are retried; operation failures
/// never are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// Build a policy; `max_attempts` must be at least one.
    pub fn new(max_attempts: u32, backoff: Duration) -> Result<Self, ConfigurationError> {
        if max_attempts == 0 {
            return Err(ConfigurationError::InvalidRetryPolicy {
                resource: String::new(),
            });
        }
        Ok(Self {
            max_attempts,
            backoff,
        })
    }

    /// Total number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Base backoff; attempt `n` waits roughly `backoff * 2^(n-1)`.
    pub fn backoff(&self) -> Duration {
        self.backoff
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

/// Validated, immutable description of one infrastructure target.
///
/// A descriptor is produced once by [`super::resolve_descriptors`] and never
/// mutated; a backend swap replaces the registry entry with an adapter built
/// from a fresh descriptor instead of editing an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendDescriptor {
    logical_name: String,
    kind: BackendKind,
    connection_params: BTreeMap<String, String>,
    pool_min: u32,
    pool_max: u32,
    connect_timeout: Duration,
    retry_policy: RetryPolicy,
}

impl BackendDescriptor {
    pub(crate) fn new(
        logical_name: String,
        kind: BackendKind,
        connection_params: BTreeMap<String, String>,
        pool_min: u32,
        pool_max: u32,
        connect_timeout: Duration,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            logical_name,
            kind,
            connection_params,
            pool_min,
            pool_max,
            connect_timeout,
            retry_policy,
        }
    }

    /// Unique name application code resolves this backend by.
    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    /// Backend kind; fixed for the descriptor's lifetime.
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Look up an opaque connection parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.connection_params.get(key).map(String::as_str)
    }

    /// Look up a parameter the adapter cannot construct without.
    pub fn require_param(&self, key: &str) -> Result<&str, ConfigurationError> {
        self.param(key)
            .ok_or_else(|| ConfigurationError::missing_field(&self.logical_name, key))
    }

    /// Minimum pool residency.
    pub fn pool_min(&self) -> u32 {
        self.pool_min
    }

    /// Hard ceiling on concurrently checked-out connections.
    pub fn pool_max(&self) -> u32 {
        self.pool_max
    }

    /// How long a caller waits for checkout or connect before failing.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Retry budget for connection establishment.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }
}
