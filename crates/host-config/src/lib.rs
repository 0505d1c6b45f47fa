pub mod bootstrap;
pub mod codec;
pub mod config;
pub mod pg_repository;
pub mod policy;
pub mod pool;
pub mod reconcile;
pub mod record;
pub mod repository;
pub mod roles;
pub mod service;
pub mod snapshot;
pub mod sql_repository;
pub mod sqlite_repository;
pub mod static_config;
pub mod vendor;

pub use bootstrap::{load_from_repository, load_from_system_config, BootstrapError, PolicyBundle};
pub use codec::{canonicalize, CodecError, Extension, DEFAULT_VERSION};
pub use config::{ConfigError, StorageSettings, SystemConfig, SystemConfigLoader};
pub use policy::{PartnerPolicy, PolicyStore};
pub use pool::{ConnectionFactory, DbConnection, PoolError, PooledConnection};
pub use reconcile::{reconcile, Reconciled, Reconciliation};
pub use record::{HostConfigFilter, HostConfigRecord, RecordError, UpdatedInfo};
pub use repository::{HostConfigRepository, InMemoryHostConfigRepository, RepositoryError};
pub use roles::{Role, RoleSet};
pub use service::{HostPolicyService, UpdateStatus};
pub use snapshot::PolicySnapshot;
pub use sql_repository::SqlHostConfigRepository;
pub use vendor::{DbVendor, VendorProfile};
