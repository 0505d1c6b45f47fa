use std::sync::Arc;

use tracing::{debug, info};

use crate::pool::{ConnectionFactory, DbConnection};
use crate::record::{HostConfigFilter, HostConfigRecord};
use crate::repository::{HostConfigRepository, RepositoryError};
use crate::{pg_repository, sqlite_repository};

pub struct SqlHostConfigRepository {
    factory: Arc<ConnectionFactory>,
}

impl SqlHostConfigRepository {
    pub fn new(factory: Arc<ConnectionFactory>) -> Self {
        Self { factory }
    }

    pub fn shared(factory: Arc<ConnectionFactory>) -> Arc<Self> {
        Arc::new(Self::new(factory))
    }

    pub fn factory(&self) -> &Arc<ConnectionFactory> {
        &self.factory
    }

    pub fn ensure_schema(&self) -> Result<(), RepositoryError> {
        self.dispatch(sqlite_repository::ensure_schema, pg_repository::ensure_schema)?;
        info!(vendor = ?self.factory.vendor(), "HOSTCONFIG schema ready");
        Ok(())
    }

    fn dispatch<T>(
        &self,
        sqlite: impl FnOnce(&rusqlite::Connection) -> Result<T, RepositoryError>,
        pg: impl FnOnce(&mut postgres::Client) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut conn = self.factory.get_connection()?;
        match &mut *conn {
            DbConnection::Sqlite(sqlite_conn) => sqlite(&*sqlite_conn),
            DbConnection::Postgres(client) => pg(client),
        }
    }
}

impl HostConfigRepository for SqlHostConfigRepository {
    fn insert(&self, record: &HostConfigRecord) -> Result<(), RepositoryError> {
        debug!(host_id = %record.host_id(), "inserting host configuration");
        self.dispatch(
            |conn| sqlite_repository::insert(conn, record),
            |client| pg_repository::insert(client, record),
        )
    }

    fn select(&self, host_id: &str) -> Result<HostConfigRecord, RepositoryError> {
        self.dispatch(
            |conn| sqlite_repository::select(conn, host_id),
            |client| pg_repository::select(client, host_id),
        )
    }

    fn update(&self, record: &HostConfigRecord) -> Result<(), RepositoryError> {
        debug!(host_id = %record.host_id(), "updating host configuration");
        self.dispatch(
            |conn| sqlite_repository::update(conn, record),
            |client| pg_repository::update(client, record),
        )
    }

    fn delete(&self, host_id: &str) -> Result<(), RepositoryError> {
        debug!(host_id = %host_id, "deleting host configuration");
        self.dispatch(
            |conn| sqlite_repository::delete(conn, host_id),
            |client| pg_repository::delete(client, host_id),
        )
    }

    fn exists(&self, host_id: &str) -> Result<bool, RepositoryError> {
        self.dispatch(
            |conn| sqlite_repository::exists(conn, host_id),
            |client| pg_repository::exists(client, host_id),
        )
    }

    fn find(&self, filter: &HostConfigFilter) -> Result<Vec<HostConfigRecord>, RepositoryError> {
        self.dispatch(
            |conn| sqlite_repository::find(conn, filter),
            |client| pg_repository::find(client, filter),
        )
    }
}
