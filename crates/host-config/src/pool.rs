use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use postgres::NoTls;
use rusqlite::Connection;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::vendor::{is_sqlite_memory, redact_url, sqlite_path_from_url, DbVendor, VendorProfile};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 50;
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_millis(5000);
const MIN_ACQUIRE_TIMEOUT: Duration = Duration::from_millis(1);

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("unsupported database for connection string: {0}")]
    UnsupportedVendor(String),
    #[error("no driver linked for {0} databases")]
    NoDriver(DbVendor),
    #[error("connection pool is not initialized")]
    Uninitialized,
    #[error("cannot access database: {0}")]
    ConnectionUnavailable(String),
}

pub enum DbConnection {
    Sqlite(Connection),
    Postgres(postgres::Client),
}

#[derive(Clone)]
struct ConnectionSettings {
    url: String,
    user: String,
    password: String,
}

impl DbConnection {
    fn open(vendor: DbVendor, settings: &ConnectionSettings) -> Result<Self, String> {
        match vendor {
            DbVendor::Sqlite => {
                let path = sqlite_path_from_url(&settings.url);
                let path = if path.is_empty() { ":memory:" } else { path };
                let conn = Connection::open(path).map_err(|err| err.to_string())?;
                conn.busy_timeout(Duration::from_secs(5))
                    .map_err(|err| err.to_string())?;
                Ok(DbConnection::Sqlite(conn))
            }
            DbVendor::PostgreSql => {
                let mut config: postgres::Config =
                    settings.url.parse().map_err(|err: postgres::Error| err.to_string())?;
                if !settings.user.is_empty() {
                    config.user(&settings.user);
                }
                if !settings.password.is_empty() {
                    config.password(&settings.password);
                }
                let client = config.connect(NoTls).map_err(|err| err.to_string())?;
                Ok(DbConnection::Postgres(client))
            }
            other => Err(format!("no driver linked for {other} databases")),
        }
    }

    fn validate(&mut self, validation_query: &str) -> Result<(), String> {
        match self {
            DbConnection::Sqlite(conn) => conn
                .query_row(validation_query, [], |_| Ok(()))
                .map_err(|err| err.to_string()),
            DbConnection::Postgres(client) => client
                .simple_query(validation_query)
                .map(|_| ())
                .map_err(|err| err.to_string()),
        }
    }

    fn query_max_connections(&mut self, query: &str) -> Result<u32, String> {
        match self {
            DbConnection::Sqlite(conn) => {
                let value: i64 = conn
                    .query_row(query, [], |row| row.get(0))
                    .map_err(|err| err.to_string())?;
                u32::try_from(value).map_err(|err| err.to_string())
            }
            DbConnection::Postgres(client) => {
                let row = client.query_one(query, &[]).map_err(|err| err.to_string())?;
                let value: String = row.try_get(0).map_err(|err| err.to_string())?;
                value.trim().parse::<u32>().map_err(|err| err.to_string())
            }
        }
    }
}

struct VendorConnectionManager {
    profile: &'static VendorProfile,
    settings: ConnectionSettings,
}

impl r2d2::ManageConnection for VendorConnectionManager {
    type Connection = DbConnection;
    type Error = PoolError;

    fn connect(&self) -> Result<DbConnection, PoolError> {
        DbConnection::open(self.profile.vendor, &self.settings)
            .map_err(PoolError::ConnectionUnavailable)
    }

    fn is_valid(&self, conn: &mut DbConnection) -> Result<(), PoolError> {
        conn.validate(self.profile.validation_query)
            .map_err(PoolError::ConnectionUnavailable)
    }

    fn has_broken(&self, conn: &mut DbConnection) -> bool {
        matches!(conn, DbConnection::Postgres(client) if client.is_closed())
    }
}

#[derive(Debug)]
struct TracingErrorHandler {
    vendor: DbVendor,
}

impl r2d2::HandleError<PoolError> for TracingErrorHandler {
    fn handle_error(&self, error: PoolError) {
        warn!(vendor = %self.vendor, error = %error, "pooled connection failed");
    }
}

pub struct PooledConnection {
    vendor: DbVendor,
    conn: r2d2::PooledConnection<VendorConnectionManager>,
}

impl PooledConnection {
    pub fn vendor(&self) -> DbVendor {
        self.vendor
    }
}

impl Deref for PooledConnection {
    type Target = DbConnection;

    fn deref(&self) -> &DbConnection {
        &self.conn
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut DbConnection {
        &mut self.conn
    }
}

#[derive(Clone)]
struct ActivePool {
    profile: &'static VendorProfile,
    max_connections: u32,
    pool: r2d2::Pool<VendorConnectionManager>,
}

pub struct ConnectionFactory {
    pool: RwLock<Option<ActivePool>>,
    acquire_timeout: Duration,
}

impl ConnectionFactory {
    pub fn new() -> Self {
        Self::with_acquire_timeout(DEFAULT_ACQUIRE_TIMEOUT)
    }

    pub fn with_acquire_timeout(acquire_timeout: Duration) -> Self {
        Self {
            pool: RwLock::new(None),
            acquire_timeout: acquire_timeout.max(MIN_ACQUIRE_TIMEOUT),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn initialize(&self, url: &str, user: &str, password: &str) -> Result<(), PoolError> {
        let mut slot = self.pool.write();
        if let Some(existing) = slot.as_ref() {
            debug!(
                vendor = %existing.profile.vendor,
                requested = %redact_url(url),
                "connection factory already initialized, ignoring"
            );
            return Ok(());
        }

        let profile = DbVendor::detect(url)?;
        if !profile.vendor.has_driver() {
            return Err(PoolError::NoDriver(profile.vendor));
        }
        let settings = ConnectionSettings {
            url: url.trim().to_string(),
            user: user.to_string(),
            password: password.to_string(),
        };

        let in_memory = profile.vendor == DbVendor::Sqlite
            && is_sqlite_memory(sqlite_path_from_url(&settings.url));
        let builder = r2d2::Pool::builder()
            .connection_timeout(self.acquire_timeout)
            .test_on_check_out(true)
            .error_handler(Box::new(TracingErrorHandler {
                vendor: profile.vendor,
            }));
        // every in-memory connection is a distinct database, so keep exactly one alive
        let (builder, max_connections) = if in_memory {
            let builder = builder
                .max_size(1)
                .min_idle(None)
                .idle_timeout(None)
                .max_lifetime(None);
            (builder, 1)
        } else {
            let max_connections = fetch_max_connections(profile, &settings);
            (builder.max_size(max_connections).min_idle(Some(0)), max_connections)
        };
        let pool = builder.build_unchecked(VendorConnectionManager { profile, settings });

        info!(
            url = %redact_url(url),
            user = %user,
            vendor = %profile.vendor,
            driver = profile.driver_name,
            max_connections,
            "connection pool initialized"
        );
        *slot = Some(ActivePool {
            profile,
            max_connections,
            pool,
        });
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.pool.read().is_some()
    }

    pub fn vendor(&self) -> Option<DbVendor> {
        self.pool.read().as_ref().map(|active| active.profile.vendor)
    }

    pub fn max_connections(&self) -> Option<u32> {
        self.pool.read().as_ref().map(|active| active.max_connections)
    }

    pub fn get_connection(&self) -> Result<PooledConnection, PoolError> {
        let active = self.pool.read().clone().ok_or(PoolError::Uninitialized)?;
        let conn = active
            .pool
            .get()
            .map_err(|err| PoolError::ConnectionUnavailable(err.to_string()))?;
        trace!(vendor = %active.profile.vendor, "connection checked out");
        Ok(PooledConnection {
            vendor: active.profile.vendor,
            conn,
        })
    }

    pub fn close(&self) {
        let Some(active) = self.pool.write().take() else {
            return;
        };
        let state = active.pool.state();
        info!(
            vendor = %active.profile.vendor,
            connections = state.connections,
            idle = state.idle_connections,
            "closing connection pool"
        );
    }
}

impl Default for ConnectionFactory {
    fn default() -> Self {
        Self::new()
    }
}

fn fetch_max_connections(profile: &'static VendorProfile, settings: &ConnectionSettings) -> u32 {
    let Some(query) = profile.max_connections_query else {
        return DEFAULT_MAX_CONNECTIONS;
    };
    let fetched = DbConnection::open(profile.vendor, settings)
        .and_then(|mut conn| conn.query_max_connections(query));
    match fetched {
        Ok(value) if value > 0 => value,
        Ok(_) => DEFAULT_MAX_CONNECTIONS,
        Err(err) => {
            warn!(
                vendor = %profile.vendor,
                error = %err,
                default = DEFAULT_MAX_CONNECTIONS,
                "cannot fetch maximum connections allowed from database"
            );
            DEFAULT_MAX_CONNECTIONS
        }
    }
}
