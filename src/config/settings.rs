//! Settings loading and descriptor resolution.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::{BackendDescriptor, BackendKind, ConfigurationError, RetryPolicy};

const DEFAULT_POOL_MIN: u32 = 0;
const DEFAULT_POOL_MAX: u32 = 10;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;

/// Raw process configuration: one entry per logical resource.
///
/// Deserialized from TOML; secrets can be deferred to the environment with
/// `${VAR}` placeholders in parameter values, resolved during
/// [`resolve_descriptors`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub resources: Vec<ResourceSettings>,
}

/// Raw configuration for a single logical resource.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceSettings {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    pub pool_min: Option<u32>,
    pub pool_max: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
    pub retry: Option<RetrySettings>,
}

/// Raw retry policy knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: Option<u32>,
    pub backoff_ms: Option<u64>,
}

impl Settings {
    /// Parse settings from a TOML document.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigurationError> {
        toml::from_str(document).map_err(|e| ConfigurationError::load(e.to_string()))
    }

    /// Read and parse a TOML settings file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::load(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&document)
    }

    /// Load the settings file named by `PLUGBOARD_CONFIG`, after loading any
    /// `.env` file present in the working directory.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let _ = dotenvy::dotenv();
        let path = std::env::var("PLUGBOARD_CONFIG")
            .map_err(|_| ConfigurationError::load("PLUGBOARD_CONFIG is not set"))?;
        Self::from_toml_file(path)
    }
}

/// Turn raw settings into validated [`BackendDescriptor`] values.
///
/// Pure transform: no network I/O. Every invalid input fails with a
/// [`ConfigurationError`]; partial results are never returned.
pub fn resolve_descriptors(
    settings: &Settings,
) -> Result<Vec<BackendDescriptor>, ConfigurationError> {
    let mut seen = BTreeSet::new();
    let mut descriptors = Vec::with_capacity(settings.resources.len());

    for resource in &settings.resources {
        if !seen.insert(resource.name.clone()) {
            return Err(ConfigurationError::DuplicateName {
                name: resource.name.clone(),
            });
        }
        descriptors.push(resolve_resource(resource)?);
    }

    Ok(descriptors)
}

fn resolve_resource(resource: &ResourceSettings) -> Result<BackendDescriptor, ConfigurationError> {
    let kind =
        BackendKind::parse(&resource.kind).ok_or_else(|| ConfigurationError::UnknownKind {
            resource: resource.name.clone(),
            kind: resource.kind.clone(),
        })?;

    let pool_min = resource.pool_min.unwrap_or(DEFAULT_POOL_MIN);
    let pool_max = resource.pool_max.unwrap_or(DEFAULT_POOL_MAX);
    // A zero-capacity pool can never serve an operation, so it is rejected
    // alongside inverted bounds.
    if pool_max < pool_min || pool_max == 0 {
        return Err(ConfigurationError::InvalidPoolBounds {
            resource: resource.name.clone(),
            pool_min,
            pool_max,
        });
    }

    let connect_timeout_ms = resource
        .connect_timeout_ms
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS);
    if connect_timeout_ms == 0 {
        return Err(ConfigurationError::InvalidConnectTimeout {
            resource: resource.name.clone(),
        });
    }

    let retry_policy = resolve_retry(resource)?;
    let params = expand_params(resource)?;
    check_required_params(&resource.name, kind, &params)?;

    Ok(BackendDescriptor::new(
        resource.name.clone(),
        kind,
        params,
        pool_min,
        pool_max,
        Duration::from_millis(connect_timeout_ms),
        retry_policy,
    ))
}

fn resolve_retry(resource: &ResourceSettings) -> Result<RetryPolicy, ConfigurationError> {
    let defaults = RetryPolicy::default();
    let Some(retry) = &resource.retry else {
        return Ok(defaults);
    };
    let max_attempts = retry.max_attempts.unwrap_or(defaults.max_attempts());
    let backoff = retry
        .backoff_ms
        .map(Duration::from_millis)
        .unwrap_or(defaults.backoff());
    RetryPolicy::new(max_attempts, backoff).map_err(|_| ConfigurationError::InvalidRetryPolicy {
        resource: resource.name.clone(),
    })
}

/// Substitute whole-value `${VAR}` placeholders from the environment.
fn expand_params(
    resource: &ResourceSettings,
) -> Result<BTreeMap<String, String>, ConfigurationError> {
    let mut expanded = BTreeMap::new();
    for (key, value) in &resource.params {
        let value = match value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
            Some(variable) => {
                std::env::var(variable).map_err(|_| ConfigurationError::MissingEnvVar {
                    resource: resource.name.clone(),
                    field: key.clone(),
                    variable: variable.to_string(),
                })?
            }
            None => value.clone(),
        };
        expanded.insert(key.clone(), value);
    }
    Ok(expanded)
}

fn check_required_params(
    resource: &str,
    kind: BackendKind,
    params: &BTreeMap<String, String>,
) -> Result<(), ConfigurationError> {
    let require = |field: &str| -> Result<(), ConfigurationError> {
        if params.contains_key(field) {
            Ok(())
        } else {
            Err(ConfigurationError::missing_field(resource, field))
        }
    };

    match kind {
        BackendKind::RelationalOrm | BackendKind::RelationalRaw
        | BackendKind::RelationalYamlSchema => {
            // A full URL overrides the discrete parameters, mirroring the
            // DATABASE_URL convention.
            if !params.contains_key("url") {
                for field in ["host", "port", "user", "password", "database"] {
                    require(field)?;
                }
            }
            if kind == BackendKind::RelationalYamlSchema
                && !params.contains_key("schema")
                && !params.contains_key("schema_file")
            {
                return Err(ConfigurationError::missing_field(resource, "schema"));
            }
            Ok(())
        }
        BackendKind::Document => {
            require("uri")?;
            require("database")
        }
        BackendKind::Cache | BackendKind::Queue => require("uri"),
    }
}
