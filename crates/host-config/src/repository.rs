use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::pool::PoolError;
use crate::record::{HostConfigFilter, HostConfigRecord};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("host configuration not found: {0}")]
    NotFound(String),
    #[error("host configuration already exists: {0}")]
    AlreadyExists(String),
    #[error(transparent)]
    Connection(#[from] PoolError),
    #[error("repository error: {0}")]
    Store(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl RepositoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound(_))
    }
}

pub trait HostConfigRepository: Send + Sync {
    fn insert(&self, record: &HostConfigRecord) -> Result<(), RepositoryError>;
    fn select(&self, host_id: &str) -> Result<HostConfigRecord, RepositoryError>;
    fn update(&self, record: &HostConfigRecord) -> Result<(), RepositoryError>;
    fn delete(&self, host_id: &str) -> Result<(), RepositoryError>;
    fn exists(&self, host_id: &str) -> Result<bool, RepositoryError>;
    fn find(&self, filter: &HostConfigFilter) -> Result<Vec<HostConfigRecord>, RepositoryError>;
}

#[derive(Clone, Default)]
pub struct InMemoryHostConfigRepository {
    records: Arc<RwLock<BTreeMap<String, HostConfigRecord>>>,
}

impl InMemoryHostConfigRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn with_records(records: impl IntoIterator<Item = HostConfigRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.host_id().to_string(), record))
            .collect();
        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }
}

impl HostConfigRepository for InMemoryHostConfigRepository {
    fn insert(&self, record: &HostConfigRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write();
        if records.contains_key(record.host_id()) {
            return Err(RepositoryError::AlreadyExists(record.host_id().to_string()));
        }
        records.insert(record.host_id().to_string(), record.clone());
        Ok(())
    }

    fn select(&self, host_id: &str) -> Result<HostConfigRecord, RepositoryError> {
        self.records
            .read()
            .get(host_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(host_id.to_string()))
    }

    fn update(&self, record: &HostConfigRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write();
        let Some(slot) = records.get_mut(record.host_id()) else {
            return Err(RepositoryError::NotFound(record.host_id().to_string()));
        };
        *slot = record.clone();
        Ok(())
    }

    fn delete(&self, host_id: &str) -> Result<(), RepositoryError> {
        self.records
            .write()
            .remove(host_id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(host_id.to_string()))
    }

    fn exists(&self, host_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.records.read().contains_key(host_id))
    }

    fn find(&self, filter: &HostConfigFilter) -> Result<Vec<HostConfigRecord>, RepositoryError> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }
}
