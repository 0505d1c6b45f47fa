use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::debug;

use crate::roles::RoleSet;
use crate::snapshot::PolicySnapshot;

pub trait PartnerPolicy: Send + Sync {
    fn snapshot(&self) -> Arc<PolicySnapshot>;
    fn is_business_partner(&self, host_id: &str) -> bool;
    fn permissions_of(&self, host_id: &str) -> RoleSet;
    fn canonical_of(&self, id: &str) -> String;
    fn aliases_of(&self, host_id: &str) -> Vec<String>;
    fn can_see_all(&self, host_id: &str) -> bool;
    fn recorded_version(&self) -> String;
}

pub struct PolicyStore {
    current: ArcSwap<PolicySnapshot>,
}

impl PolicyStore {
    pub fn new(snapshot: PolicySnapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(snapshot),
        }
    }

    pub fn shared(snapshot: PolicySnapshot) -> Arc<Self> {
        Arc::new(Self::new(snapshot))
    }

    pub fn publish(&self, snapshot: PolicySnapshot) {
        let previous = self.current.swap(Arc::new(snapshot));
        debug!(host_id = %previous.host_id(), "policy snapshot replaced");
    }
}

impl PartnerPolicy for PolicyStore {
    fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.current.load_full()
    }

    fn is_business_partner(&self, host_id: &str) -> bool {
        self.current.load().is_business_partner(host_id)
    }

    fn permissions_of(&self, host_id: &str) -> RoleSet {
        self.current.load().permissions_of(host_id)
    }

    fn canonical_of(&self, id: &str) -> String {
        self.current.load().canonical_of(id).to_string()
    }

    fn aliases_of(&self, host_id: &str) -> Vec<String> {
        self.current.load().aliases_of(host_id).to_vec()
    }

    fn can_see_all(&self, host_id: &str) -> bool {
        self.current.load().can_see_all(host_id)
    }

    fn recorded_version(&self) -> String {
        self.current.load().recorded_version().to_string()
    }
}
