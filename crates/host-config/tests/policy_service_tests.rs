use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use host_config::{
    Extension, HostConfigFilter, HostConfigRecord, HostConfigRepository, HostPolicyService,
    InMemoryHostConfigRepository, PartnerPolicy, RepositoryError, Role, RoleSet, UpdateStatus,
    UpdatedInfo, DEFAULT_VERSION,
};

const LOCAL: &str = "hostA";

fn open_service() -> (Arc<InMemoryHostConfigRepository>, HostPolicyService) {
    let repo = InMemoryHostConfigRepository::shared();
    let service = HostPolicyService::open(LOCAL, repo.clone()).expect("service");
    (repo, service)
}

// delegates to an in-memory store until writes are switched off
struct FlakyRepository {
    inner: InMemoryHostConfigRepository,
    fail_writes: AtomicBool,
}

impl FlakyRepository {
    fn failing(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Store("disk full".to_string()));
        }
        Ok(())
    }
}

impl HostConfigRepository for FlakyRepository {
    fn insert(&self, record: &HostConfigRecord) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.insert(record)
    }

    fn select(&self, host_id: &str) -> Result<HostConfigRecord, RepositoryError> {
        self.inner.select(host_id)
    }

    fn update(&self, record: &HostConfigRecord) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.update(record)
    }

    fn delete(&self, host_id: &str) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.delete(host_id)
    }

    fn exists(&self, host_id: &str) -> Result<bool, RepositoryError> {
        self.inner.exists(host_id)
    }

    fn find(&self, filter: &HostConfigFilter) -> Result<Vec<HostConfigRecord>, RepositoryError> {
        self.inner.find(filter)
    }
}

#[test]
fn business_updates_merge_then_purge() {
    let (repo, service) = open_service();
    let policy = service.policy();

    let status = service
        .update_business(r#"{"business":["hostB","hostC"]}"#, false)
        .expect("update");
    assert_eq!(status, UpdateStatus::Applied);
    assert!(policy.is_business_partner("hostB"));
    assert!(policy.is_business_partner("hostC"));
    assert!(!policy.is_business_partner("hostD"));
    assert!(repo.exists(LOCAL).expect("exists"));

    service
        .update_business(r#"{"business":["hostD"]}"#, true)
        .expect("purge");
    assert!(!policy.is_business_partner("hostB"));
    assert!(!policy.is_business_partner("hostC"));
    assert!(policy.is_business_partner("hostD"));

    let stored = repo.select(LOCAL).expect("stored");
    assert_eq!(stored.business(), r#"{"business":["hostD"]}"#);
}

#[test]
fn noaccess_overrides_previous_roles() {
    let (_repo, service) = open_service();
    let policy = service.policy();

    service
        .update_roles(
            r#"{"roles":[{"roleid":"hostB","roleset":"readonly|transfer"}]}"#,
            false,
        )
        .expect("roles");
    assert_eq!(policy.permissions_of("hostB"), RoleSet::PARTNER);
    assert!(policy.permissions_of("hostB").has(Role::Transfer));

    service
        .update_roles(r#"{"roles":[{"roleid":"hostB","roleset":"NOACCESS"}]}"#, false)
        .expect("roles");
    assert_eq!(policy.permissions_of("hostB"), RoleSet::NOACCESS);
    assert!(policy.permissions_of("hostB").has(Role::NoAccess));
    assert_eq!(policy.permissions_of("unknown"), RoleSet::NOACCESS);
}

#[test]
fn aliases_accumulate_across_updates() {
    let (_repo, service) = open_service();
    let policy = service.policy();

    service
        .update_alias(r#"{"aliases":[{"realid":"hostB","aliasid":"b1 b2"}]}"#, false)
        .expect("aliases");
    service
        .update_alias(r#"{"aliases":[{"realid":"hostB","aliasid":"b3"}]}"#, false)
        .expect("aliases");

    assert_eq!(policy.canonical_of("b1"), "hostB");
    assert_eq!(policy.canonical_of("b3"), "hostB");
    assert_eq!(policy.canonical_of("hostZ"), "hostZ");
    assert_eq!(policy.aliases_of("hostB"), vec!["b1", "b2", "b3"]);
    assert!(policy.aliases_of("hostC").is_empty());
}

#[test]
fn alias_moves_to_the_host_that_claimed_it_last() {
    let (repo, service) = open_service();
    let policy = service.policy();

    service
        .update_alias(r#"{"aliases":[{"realid":"hostZ","aliasid":"x z1"}]}"#, false)
        .expect("first owner");
    assert_eq!(policy.canonical_of("x"), "hostZ");

    let status = service
        .update_alias(r#"{"aliases":[{"realid":"hostA","aliasid":"x"}]}"#, false)
        .expect("second owner");
    assert_eq!(status, UpdateStatus::Applied);
    assert_eq!(policy.canonical_of("x"), "hostA");
    assert_eq!(policy.aliases_of("hostA"), vec!["x"]);
    assert_eq!(policy.aliases_of("hostZ"), vec!["z1"]);

    let stored = repo.select(LOCAL).expect("stored");
    assert!(!stored.aliases().contains(r#""realid":"hostZ","aliasid":"x"#));

    service
        .update_alias(r#"{"aliases":[{"realid":"hostZ","aliasid":"x"}]}"#, false)
        .expect("back to first owner");
    assert_eq!(policy.canonical_of("x"), "hostZ");
    assert!(policy.aliases_of("hostA").is_empty());
}

#[test]
fn malformed_and_empty_updates_leave_policy_untouched() {
    let (repo, service) = open_service();
    service
        .update_business(r#"{"business":["hostB"]}"#, false)
        .expect("update");
    let before = repo.select(LOCAL).expect("stored");

    let status = service
        .update_business("{\"business\":[", false)
        .expect("malformed update is recovered");
    assert_eq!(status, UpdateStatus::Malformed);
    let status = service.update_business("", false).expect("empty update");
    assert_eq!(status, UpdateStatus::NoChange);
    let status = service
        .update_business(r#"{"business":["hostB"]}"#, false)
        .expect("repeat update");
    assert_eq!(status, UpdateStatus::NoChange);

    assert_eq!(repo.select(LOCAL).expect("stored"), before);
    assert!(service.policy().is_business_partner("hostB"));
}

#[test]
fn failed_persist_publishes_nothing() {
    let repo = Arc::new(FlakyRepository {
        inner: InMemoryHostConfigRepository::new(),
        fail_writes: AtomicBool::new(false),
    });
    let service = HostPolicyService::open(LOCAL, repo.clone()).expect("service");
    service
        .update_business(r#"{"business":["hostB"]}"#, false)
        .expect("update");
    let snapshot_before = service.policy().snapshot();

    repo.failing(true);
    let err = service
        .update_business(r#"{"business":["hostC"]}"#, false)
        .expect_err("persist failure");
    assert!(matches!(err, RepositoryError::Store(_)));

    let policy = service.policy();
    assert!(Arc::ptr_eq(&snapshot_before, &policy.snapshot()));
    assert!(!policy.is_business_partner("hostC"));
    assert!(!service.local_record().business().contains("hostC"));

    repo.failing(false);
    service
        .update_business(r#"{"business":["hostC"]}"#, false)
        .expect("retry");
    assert!(policy.is_business_partner("hostB"));
    assert!(policy.is_business_partner("hostC"));
}

#[test]
fn open_publishes_an_existing_record() {
    let record = HostConfigRecord::new(
        LOCAL,
        r#"{"business":["hostB"]}"#,
        r#"{"roles":[{"roleid":"hostB","roleset":"TRANSFER"}]}"#,
        r#"{"aliases":[{"realid":"hostB","aliasid":"bee"}]}"#,
        r#"{"version":"3.1.0","seeallid":"hostB"}"#,
    );
    let repo = Arc::new(InMemoryHostConfigRepository::with_records([record]));
    let service = HostPolicyService::open(LOCAL, repo).expect("service");
    let policy = service.policy();

    let snapshot = policy.snapshot();
    assert_eq!(snapshot.host_id(), LOCAL);
    assert!(snapshot.is_business_partner("hostB"));
    assert_eq!(snapshot.permissions_of("hostB"), RoleSet::TRANSFER);
    assert_eq!(snapshot.canonical_of("bee"), "hostB");
    assert!(policy.can_see_all("hostB"));
    assert!(!policy.can_see_all("hostC"));
    assert_eq!(policy.recorded_version(), "3.1.0");
}

#[test]
fn unreadable_stored_section_loads_as_empty() {
    let record = HostConfigRecord::new(LOCAL, "{oops", "", "", "");
    let repo = Arc::new(InMemoryHostConfigRepository::with_records([record]));
    let service = HostPolicyService::open(LOCAL, repo).expect("service");
    assert!(!service.policy().snapshot().has_business_whitelist());
    assert_eq!(
        service
            .update_business(r#"{"business":["hostB"]}"#, false)
            .expect("update"),
        UpdateStatus::Malformed
    );
}

#[test]
fn record_version_defaults_and_updates() {
    let (repo, service) = open_service();
    assert_eq!(service.record_version("hostZ").expect("version"), DEFAULT_VERSION);
    assert_eq!(service.policy().recorded_version(), DEFAULT_VERSION);

    service.set_record_version("hostZ", "3.4.0").expect("set version");
    assert_eq!(service.record_version("hostZ").expect("version"), "3.4.0");
    assert!(repo.exists("hostZ").expect("exists"));

    service.stamp_version(LOCAL).expect("stamp");
    assert_eq!(
        service.record_version(LOCAL).expect("version"),
        env!("CARGO_PKG_VERSION")
    );
    assert_eq!(service.policy().recorded_version(), env!("CARGO_PKG_VERSION"));
}

#[test]
fn see_all_list_written_through_the_extension() {
    let (_repo, service) = open_service();
    let mut extension = Extension::default();
    extension.set_version("3.2.0");
    extension.set_see_all_ids(["hostB", "hostC"]);
    let record = HostConfigRecord::new(LOCAL, "", "", "", &extension.encode());
    service.replace_record(&record).expect("replace");

    let policy = service.policy();
    assert!(policy.can_see_all("hostB"));
    assert!(policy.can_see_all("hostC"));
    assert!(!policy.can_see_all("hostD"));
    assert_eq!(policy.recorded_version(), "3.2.0");
}

#[test]
fn held_snapshot_survives_a_publish() {
    let (_repo, service) = open_service();
    let policy = service.policy();
    service
        .update_business(r#"{"business":["hostB"]}"#, false)
        .expect("first");
    let held = policy.snapshot();

    service
        .update_business(r#"{"business":["hostC"]}"#, true)
        .expect("purge");
    assert!(held.is_business_partner("hostB"));
    assert!(!held.is_business_partner("hostC"));
    assert!(policy.is_business_partner("hostC"));
    assert!(!policy.is_business_partner("hostB"));
    assert!(!Arc::ptr_eq(&held, &policy.snapshot()));
}

#[test]
fn version_update_keeps_other_extension_keys() {
    let record = HostConfigRecord::new("hostZ", "", "", "", r#"{"seeallid":"h1","owner":"ops"}"#);
    let repo = Arc::new(InMemoryHostConfigRepository::with_records([record]));
    let service = HostPolicyService::open(LOCAL, repo.clone()).expect("service");

    service.set_record_version("hostZ", "2.0.0").expect("set version");
    let stored = repo.select("hostZ").expect("stored");
    assert!(stored.is_see_all_id("h1"));
    assert!(stored.others().contains("\"owner\":\"ops\""));
    assert!(stored.others().contains("\"version\":\"2.0.0\""));
}

#[test]
fn replace_and_delete_records() {
    let (repo, service) = open_service();
    let remote = HostConfigRecord::new("hostB", r#"{"business":["hostA"]}"#, "", "", "");
    service.insert_record(&remote).expect("insert");
    let err = service.insert_record(&remote).expect_err("duplicate");
    assert!(matches!(err, RepositoryError::AlreadyExists(_)));

    let replacement = HostConfigRecord::new("hostB", r#"{"business":["hostC"]}"#, "", "", "");
    service.replace_record(&replacement).expect("replace");
    assert_eq!(service.select_record("hostB").expect("select"), replacement);

    let local = HostConfigRecord::new(LOCAL, r#"{"business":["hostE"]}"#, "", "", "");
    service.replace_record(&local).expect("replace creates");
    assert!(service.policy().is_business_partner("hostE"));

    service.delete_record(LOCAL).expect("delete");
    assert!(!service.exists(LOCAL).expect("exists"));
    assert!(!service.policy().is_business_partner("hostE"));
    assert!(service.select_record(LOCAL).expect_err("gone").is_not_found());
    assert!(service.delete_record(LOCAL).expect_err("gone").is_not_found());

    service
        .update_business(r#"{"business":["hostF"]}"#, false)
        .expect("recreate");
    assert!(repo.exists(LOCAL).expect("exists"));
}

#[test]
fn updated_info_and_pending_submissions() {
    let (_repo, service) = open_service();
    service
        .insert_record(&HostConfigRecord::empty("hostA2").with_updated_info(UpdatedInfo::ToSubmit))
        .expect("insert");
    assert!(service.pending_submissions().expect("pending").is_empty());

    let err = service
        .change_updated_info(LOCAL, UpdatedInfo::ToSubmit)
        .expect_err("no local record yet");
    assert!(err.is_not_found());

    service
        .update_business(r#"{"business":["hostB"]}"#, false)
        .expect("update");
    service
        .change_updated_info(LOCAL, UpdatedInfo::ToSubmit)
        .expect("change");
    let pending = service.pending_submissions().expect("pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].host_id(), LOCAL);
    assert_eq!(service.local_record().updated_info(), UpdatedInfo::ToSubmit);
}

#[test]
fn query_filters_are_combined() {
    let (_repo, service) = open_service();
    for (host, business) in [
        ("hostB", r#"{"business":["hostA"]}"#),
        ("hostC", r#"{"business":["hostA","hostB"]}"#),
        ("other", r#"{"business":["hostB"]}"#),
    ] {
        service
            .insert_record(&HostConfigRecord::new(host, business, "", "", ""))
            .expect("insert");
    }

    let hosts = |filter: HostConfigFilter| -> Vec<String> {
        service
            .query(&filter)
            .expect("query")
            .into_iter()
            .map(|record| record.host_id().to_string())
            .collect()
    };
    assert_eq!(hosts(HostConfigFilter::all()), vec!["hostB", "hostC", "other"]);
    assert_eq!(hosts(HostConfigFilter::all().host_id("host")), vec!["hostB", "hostC"]);
    assert_eq!(
        hosts(HostConfigFilter::all().host_id("host").business("hostB")),
        vec!["hostC"]
    );
    assert!(hosts(HostConfigFilter::all().host_id("HOST")).is_empty());
}

#[test]
fn reload_picks_up_external_changes() {
    let (repo, service) = open_service();
    repo.insert(&HostConfigRecord::new(LOCAL, r#"{"business":["hostX"]}"#, "", "", ""))
        .expect("external insert");
    assert!(!service.policy().is_business_partner("hostX"));
    service.reload().expect("reload");
    assert!(service.policy().is_business_partner("hostX"));
}

#[test]
fn readers_never_observe_a_mixed_snapshot() {
    let (_repo, service) = open_service();
    let service = Arc::new(service);
    let policy = service.policy();
    let stop = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let policy = Arc::clone(&policy);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut observed = 0usize;
                while !stop.load(Ordering::Relaxed) {
                    let snapshot = policy.snapshot();
                    let partners: Vec<&str> = snapshot.business_partners().collect();
                    if let Some(partner) = partners.first() {
                        assert_eq!(partners.len(), 1);
                        let generation = partner.trim_start_matches("peer");
                        let alias = format!("alias{generation}");
                        assert_eq!(snapshot.canonical_of(&alias), *partner);
                        assert_eq!(snapshot.permissions_of(partner), RoleSet::PARTNER);
                        observed += 1;
                    }
                }
                observed
            })
        })
        .collect();

    for generation in 0..200 {
        let peer = format!("peer{generation}");
        let record = HostConfigRecord::new(
            LOCAL,
            &format!(r#"{{"business":["{peer}"]}}"#),
            &format!(r#"{{"roles":[{{"roleid":"{peer}","roleset":"PARTNER"}}]}}"#),
            &format!(r#"{{"aliases":[{{"realid":"{peer}","aliasid":"alias{generation}"}}]}}"#),
            "",
        );
        service.replace_record(&record).expect("replace");
    }
    stop.store(true, Ordering::Relaxed);

    for reader in readers {
        reader.join().expect("reader panicked");
    }
    assert!(policy.is_business_partner("peer199"));
}
