//! Failures raised at the registry boundary.

use crate::config::{ConfigurationError, PortFamily};
use crate::domain::ports::BackendUnavailableError;

/// Why a logical name could not be resolved to a port.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnknownResourceError {
    /// No backend is registered under the requested name.
    #[error("no backend registered under '{logical_name}'")]
    NotRegistered { logical_name: String },

    /// The name exists but serves a different port family.
    #[error("backend '{logical_name}' serves the {actual} port, not {requested}")]
    WrongFamily {
        logical_name: String,
        requested: PortFamily,
        actual: PortFamily,
    },

    /// The registry has been stopped; no resolution is possible.
    #[error("registry is stopped; cannot resolve '{logical_name}'")]
    Stopped { logical_name: String },
}

/// Why the registry could not start.
///
/// Startup is all-or-nothing: the first backend that stays unavailable
/// after its retry budget aborts the start, and everything already built
/// is torn down again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Backend(#[from] BackendUnavailableError),
}

/// Why a hot swap was rejected or failed.
///
/// A failed swap leaves the previous adapter registered and serving.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SwapError {
    /// The registry has been stopped; no swaps are possible.
    #[error("registry is stopped; cannot replace '{logical_name}'")]
    Stopped { logical_name: String },

    /// No backend is registered under the requested name.
    #[error("no backend registered under '{logical_name}'")]
    Unknown { logical_name: String },

    /// The replacement would change the port family callers depend on.
    #[error("'{logical_name}' serves the {current} port; replacement would serve {proposed}")]
    FamilyMismatch {
        logical_name: String,
        current: PortFamily,
        proposed: PortFamily,
    },

    /// The replacement backend could not be built or probed.
    #[error(transparent)]
    Backend(#[from] BackendUnavailableError),
}
