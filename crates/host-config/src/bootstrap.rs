use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::config::SystemConfig;
use crate::policy::PartnerPolicy;
use crate::pool::{ConnectionFactory, PoolError};
use crate::repository::{HostConfigRepository, RepositoryError};
use crate::service::HostPolicyService;
use crate::sql_repository::SqlHostConfigRepository;
use crate::static_config::{BOOTSTRAP_CREATE_SCHEMA, BOOTSTRAP_STAMP_VERSION, HOST_ID};
use crate::vendor::redact_url;

pub struct PolicyBundle {
    pub connections: Option<Arc<ConnectionFactory>>,
    pub repository: Arc<dyn HostConfigRepository>,
    pub service: Arc<HostPolicyService>,
    pub policy: Arc<dyn PartnerPolicy>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("missing required config key: {0}")]
    MissingKey(&'static str),
    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub fn load_from_repository(
    host_id: &str,
    repository: Arc<dyn HostConfigRepository>,
    stamp_version: bool,
) -> Result<PolicyBundle, BootstrapError> {
    if host_id.trim().is_empty() {
        return Err(BootstrapError::MissingKey(HOST_ID));
    }
    let service = Arc::new(HostPolicyService::open(host_id.trim(), Arc::clone(&repository))?);
    if stamp_version {
        service.stamp_version(service.host_id())?;
    }
    let policy = service.policy();
    Ok(PolicyBundle {
        connections: None,
        repository,
        service,
        policy,
    })
}

pub fn load_from_system_config(config: &SystemConfig) -> Result<PolicyBundle, BootstrapError> {
    let host_id = config.get_string(HOST_ID);
    if host_id.trim().is_empty() {
        return Err(BootstrapError::MissingKey(HOST_ID));
    }

    let storage = config.storage();
    let connections = Arc::new(ConnectionFactory::with_acquire_timeout(storage.acquire_timeout));
    connections.initialize(&storage.url, &storage.user, &storage.password)?;

    let repository = SqlHostConfigRepository::shared(Arc::clone(&connections));
    if config.get_bool(BOOTSTRAP_CREATE_SCHEMA) {
        repository.ensure_schema()?;
    }
    info!(
        host_id = %host_id,
        url = %redact_url(&storage.url),
        "host policy storage ready"
    );

    let mut bundle = load_from_repository(
        &host_id,
        repository,
        config.get_bool(BOOTSTRAP_STAMP_VERSION),
    )?;
    bundle.connections = Some(connections);
    Ok(bundle)
}
