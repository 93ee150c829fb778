//! Process configuration and backend descriptor resolution.
//!
//! Raw settings (TOML plus environment) are turned into validated,
//! immutable [`BackendDescriptor`] values. Resolution is a pure transform:
//! no network I/O happens here, and every malformed input is rejected with
//! a [`ConfigurationError`] before any adapter is constructed.

mod descriptor;
mod settings;

pub use descriptor::{BackendDescriptor, BackendKind, PortFamily, RetryPolicy};
pub use settings::{ResourceSettings, RetrySettings, Settings, resolve_descriptors};

/// Fatal configuration failures.
///
/// These abort startup and are never retried: a bad descriptor cannot heal
/// on its own.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// A field the resource's kind requires was not supplied.
    #[error("resource '{resource}': required field '{field}' is missing")]
    MissingField { resource: String, field: String },

    /// Pool bounds are inconsistent or the pool can never serve a caller.
    #[error("resource '{resource}': pool bounds invalid (min {pool_min}, max {pool_max})")]
    InvalidPoolBounds {
        resource: String,
        pool_min: u32,
        pool_max: u32,
    },

    /// The connect timeout must be strictly positive.
    #[error("resource '{resource}': connect timeout must be greater than zero")]
    InvalidConnectTimeout { resource: String },

    /// The retry policy must allow at least one attempt.
    #[error("resource '{resource}': retry policy must allow at least one attempt")]
    InvalidRetryPolicy { resource: String },

    /// The declared backend kind is not one this crate knows how to build.
    #[error("resource '{resource}': unrecognized backend kind '{kind}'")]
    UnknownKind { resource: String, kind: String },

    /// Two resources share one logical name.
    #[error("duplicate logical name '{name}'")]
    DuplicateName { name: String },

    /// A `${VAR}` placeholder referenced an environment variable that is
    /// not set.
    #[error("resource '{resource}': environment variable '{variable}' referenced by '{field}' is not set")]
    MissingEnvVar {
        resource: String,
        field: String,
        variable: String,
    },

    /// The settings document itself could not be read or parsed.
    #[error("failed to load settings: {message}")]
    Load { message: String },
}

impl ConfigurationError {
    pub(crate) fn missing_field(resource: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            resource: resource.into(),
            field: field.into(),
        }
    }

    pub(crate) fn load(message: impl Into<String>) -> Self {
        Self::Load {
            message: message.into(),
        }
    }
}
