//! Shared Redis pool construction for the cache and queue adapters.

use bb8_redis::RedisConnectionManager;
use bb8_redis::bb8::Pool;
use bb8_redis::redis::{ConnectionInfo, IntoConnectionInfo};
use tracing::debug;

use crate::config::BackendDescriptor;
use crate::domain::ports::BackendUnavailableError;

pub(crate) type RedisPool = Pool<RedisConnectionManager>;

/// Resolve the connection target from a descriptor. A `password` parameter
/// overrides any credential embedded in the URI, so secrets can stay out of
/// the connection string.
pub(crate) fn connection_info(
    descriptor: &BackendDescriptor,
) -> Result<ConnectionInfo, BackendUnavailableError> {
    let uri = descriptor
        .require_param("uri")
        .map_err(|e| BackendUnavailableError::new(descriptor, e.to_string()))?;
    let mut info = uri
        .into_connection_info()
        .map_err(|e| BackendUnavailableError::new(descriptor, e.to_string()))?;
    if let Some(password) = descriptor.param("password") {
        let settings = info
            .redis_settings()
            .clone()
            .set_password(password);
        info = info.set_redis_settings(settings);
    }
    Ok(info)
}

/// Build a bb8 pool sized and timed per the descriptor.
pub(crate) async fn build_pool(
    descriptor: &BackendDescriptor,
) -> Result<RedisPool, BackendUnavailableError> {
    let info = connection_info(descriptor)?;
    debug!(
        logical_name = descriptor.logical_name(),
        addr = %info.addr(),
        "building redis pool"
    );

    let manager = RedisConnectionManager::new(info)
        .map_err(|e| BackendUnavailableError::new(descriptor, e.to_string()))?;
    let min_idle = (descriptor.pool_min() > 0).then_some(descriptor.pool_min());
    Pool::builder()
        .max_size(descriptor.pool_max())
        .min_idle(min_idle)
        .connection_timeout(descriptor.connect_timeout())
        .build(manager)
        .await
        .map_err(|e| BackendUnavailableError::new(descriptor, e.to_string()))
}

/// Whether the pool currently has no checked-out connections.
pub(crate) fn pool_is_idle(pool: &RedisPool) -> bool {
    let state = pool.state();
    state.connections == state.idle_connections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Settings, resolve_descriptors};
    use rstest::rstest;

    fn descriptor_from_toml(document: &str) -> BackendDescriptor {
        let settings = Settings::from_toml_str(document).expect("valid TOML");
        resolve_descriptors(&settings)
            .expect("valid settings")
            .remove(0)
    }

    #[rstest]
    fn password_parameter_overrides_uri_credentials() {
        let descriptor = descriptor_from_toml(
            r#"
            [[resources]]
            name = "sessions"
            kind = "cache"
            [resources.params]
            uri = "redis://cache.internal:6379/2"
            password = "hunter2"
            "#,
        );

        let info = connection_info(&descriptor).expect("valid target");
        assert_eq!(info.redis_settings().password(), Some("hunter2"));
        assert_eq!(info.redis_settings().db(), 2);
    }

    #[rstest]
    fn uri_without_password_parameter_is_used_verbatim() {
        let descriptor = descriptor_from_toml(
            r#"
            [[resources]]
            name = "sessions"
            kind = "cache"
            [resources.params]
            uri = "redis://:embedded@cache.internal:6379"
            "#,
        );

        let info = connection_info(&descriptor).expect("valid target");
        assert_eq!(info.redis_settings().password(), Some("embedded"));
    }
}
