use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::codec::{decode_extension, Extension, DEFAULT_VERSION};
use crate::policy::{PartnerPolicy, PolicyStore};
use crate::reconcile::{reconcile, Aliases, Business, PolicySection, Reconciliation, Roles};
use crate::record::{HostConfigFilter, HostConfigRecord, UpdatedInfo};
use crate::repository::{HostConfigRepository, RepositoryError};
use crate::snapshot::PolicySnapshot;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UpdateStatus {
    Applied,
    NoChange,
    Malformed,
}

struct WriterState {
    record: HostConfigRecord,
    persisted: bool,
}

pub struct HostPolicyService {
    host_id: String,
    repository: Arc<dyn HostConfigRepository>,
    store: Arc<PolicyStore>,
    writer: Mutex<WriterState>,
}

impl HostPolicyService {
    pub fn open(
        host_id: impl Into<String>,
        repository: Arc<dyn HostConfigRepository>,
    ) -> Result<Self, RepositoryError> {
        let host_id = host_id.into();
        let (record, persisted) = load_record(repository.as_ref(), &host_id)?;
        let store = PolicyStore::shared(PolicySnapshot::from_record(&record));
        info!(host_id = %host_id, persisted, "host policy loaded");
        Ok(Self {
            host_id,
            repository,
            store,
            writer: Mutex::new(WriterState { record, persisted }),
        })
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn store(&self) -> Arc<PolicyStore> {
        Arc::clone(&self.store)
    }

    pub fn policy(&self) -> Arc<dyn PartnerPolicy> {
        self.store.clone()
    }

    pub fn local_record(&self) -> HostConfigRecord {
        self.writer.lock().record.clone()
    }

    pub fn update_business(&self, delta: &str, purge: bool) -> Result<UpdateStatus, RepositoryError> {
        self.update_section::<Business>(
            delta,
            purge,
            HostConfigRecord::business,
            HostConfigRecord::set_business,
        )
    }

    pub fn update_alias(&self, delta: &str, purge: bool) -> Result<UpdateStatus, RepositoryError> {
        self.update_section::<Aliases>(
            delta,
            purge,
            HostConfigRecord::aliases,
            HostConfigRecord::set_aliases,
        )
    }

    pub fn update_roles(&self, delta: &str, purge: bool) -> Result<UpdateStatus, RepositoryError> {
        self.update_section::<Roles>(
            delta,
            purge,
            HostConfigRecord::roles,
            HostConfigRecord::set_roles,
        )
    }

    pub fn insert_record(&self, record: &HostConfigRecord) -> Result<(), RepositoryError> {
        let mut writer = self.writer.lock();
        self.repository.insert(record)?;
        if self.is_local(record.host_id()) {
            self.install(&mut writer, record.clone());
        }
        Ok(())
    }

    pub fn select_record(&self, host_id: &str) -> Result<HostConfigRecord, RepositoryError> {
        self.repository.select(host_id)
    }

    pub fn exists(&self, host_id: &str) -> Result<bool, RepositoryError> {
        self.repository.exists(host_id)
    }

    pub fn replace_record(&self, record: &HostConfigRecord) -> Result<(), RepositoryError> {
        let mut writer = self.writer.lock();
        persist(self.repository.as_ref(), record, true)?;
        if self.is_local(record.host_id()) {
            self.install(&mut writer, record.clone());
        }
        Ok(())
    }

    pub fn delete_record(&self, host_id: &str) -> Result<(), RepositoryError> {
        let mut writer = self.writer.lock();
        self.repository.delete(host_id)?;
        if self.is_local(host_id) {
            writer.record = HostConfigRecord::empty(host_id);
            writer.persisted = false;
            self.store.publish(PolicySnapshot::empty(host_id));
            info!(host_id = %host_id, "local host policy deleted");
        }
        Ok(())
    }

    pub fn query(
        &self,
        filter: &HostConfigFilter,
    ) -> Result<Vec<HostConfigRecord>, RepositoryError> {
        self.repository.find(filter)
    }

    pub fn record_version(&self, host_id: &str) -> Result<String, RepositoryError> {
        let record = match self.repository.select(host_id) {
            Ok(record) => record,
            Err(RepositoryError::NotFound(_)) => return Ok(DEFAULT_VERSION.to_string()),
            Err(err) => return Err(err),
        };
        let version = match decode_extension(record.others()) {
            Ok(extension) => extension.version().map(str::to_string),
            Err(err) => {
                warn!(host_id = %host_id, error = %err, "extension document unreadable");
                None
            }
        };
        Ok(version.unwrap_or_else(|| DEFAULT_VERSION.to_string()))
    }

    pub fn set_record_version(&self, host_id: &str, version: &str) -> Result<(), RepositoryError> {
        self.modify_record(host_id, true, |record| {
            let mut extension = decode_extension(record.others()).unwrap_or_else(|err| {
                warn!(
                    host_id = %record.host_id(),
                    error = %err,
                    "replacing unreadable extension document"
                );
                Extension::default()
            });
            extension.set_version(version);
            record.set_others(&extension.encode());
        })?;
        info!(host_id = %host_id, version = %version, "host version recorded");
        Ok(())
    }

    pub fn stamp_version(&self, host_id: &str) -> Result<(), RepositoryError> {
        self.set_record_version(host_id, env!("CARGO_PKG_VERSION"))
    }

    pub fn change_updated_info(
        &self,
        host_id: &str,
        info: UpdatedInfo,
    ) -> Result<(), RepositoryError> {
        self.modify_record(host_id, false, |record| record.set_updated_info(info))
    }

    pub fn pending_submissions(&self) -> Result<Vec<HostConfigRecord>, RepositoryError> {
        let filter = HostConfigFilter::all()
            .host_id(self.host_id.as_str())
            .updated_info(UpdatedInfo::ToSubmit);
        let mut records = self.repository.find(&filter)?;
        records.retain(|record| record.host_id() == self.host_id);
        Ok(records)
    }

    pub fn reload(&self) -> Result<(), RepositoryError> {
        let mut writer = self.writer.lock();
        let (record, persisted) = load_record(self.repository.as_ref(), &self.host_id)?;
        self.install(&mut writer, record);
        writer.persisted = persisted;
        Ok(())
    }

    fn update_section<S: PolicySection>(
        &self,
        delta: &str,
        purge: bool,
        current: fn(&HostConfigRecord) -> &str,
        apply: fn(&mut HostConfigRecord, &str),
    ) -> Result<UpdateStatus, RepositoryError> {
        let mut writer = self.writer.lock();
        let reconciled = match reconcile::<S>(current(&writer.record), delta, purge) {
            Reconciliation::Changed(reconciled) => reconciled,
            Reconciliation::Unchanged => return Ok(UpdateStatus::NoChange),
            Reconciliation::Malformed => return Ok(UpdateStatus::Malformed),
        };
        if writer.persisted && reconciled.text == current(&writer.record) {
            return Ok(UpdateStatus::NoChange);
        }

        let mut next = writer.record.clone();
        apply(&mut next, &reconciled.text);
        persist(self.repository.as_ref(), &next, writer.persisted)?;
        self.install(&mut writer, next);
        info!(host_id = %self.host_id, section = S::NAME, purge, "host policy updated");
        Ok(UpdateStatus::Applied)
    }

    fn modify_record(
        &self,
        host_id: &str,
        create_missing: bool,
        change: impl FnOnce(&mut HostConfigRecord),
    ) -> Result<(), RepositoryError> {
        let mut writer = self.writer.lock();
        let local = self.is_local(host_id);
        let (mut record, persisted) = if local && writer.persisted {
            (writer.record.clone(), true)
        } else {
            load_record(self.repository.as_ref(), host_id)?
        };
        if !persisted && !create_missing {
            return Err(RepositoryError::NotFound(host_id.to_string()));
        }
        change(&mut record);
        persist(self.repository.as_ref(), &record, persisted)?;
        if local {
            self.install(&mut writer, record);
        }
        Ok(())
    }

    fn is_local(&self, host_id: &str) -> bool {
        host_id == self.host_id
    }

    fn install(&self, writer: &mut WriterState, record: HostConfigRecord) {
        self.store.publish(PolicySnapshot::from_record(&record));
        writer.record = record;
        writer.persisted = true;
    }
}

fn load_record(
    repository: &dyn HostConfigRepository,
    host_id: &str,
) -> Result<(HostConfigRecord, bool), RepositoryError> {
    match repository.select(host_id) {
        Ok(record) => Ok((record, true)),
        Err(RepositoryError::NotFound(_)) => Ok((HostConfigRecord::empty(host_id), false)),
        Err(err) => Err(err),
    }
}

// Another process may have created or removed the row since it was read, so
// each statement falls back to the other one.
fn persist(
    repository: &dyn HostConfigRepository,
    record: &HostConfigRecord,
    persisted: bool,
) -> Result<(), RepositoryError> {
    let result = if persisted {
        repository.update(record)
    } else {
        repository.insert(record)
    };
    match result {
        Err(RepositoryError::NotFound(_)) => repository.insert(record),
        Err(RepositoryError::AlreadyExists(_)) => repository.update(record),
        other => other,
    }
}
