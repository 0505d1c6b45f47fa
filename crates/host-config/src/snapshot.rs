use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::codec::{decode_extension, Extension, DEFAULT_VERSION};
use crate::reconcile::{expand_aliases, expand_roles, Aliases, Business, PolicySection, Roles};
use crate::record::HostConfigRecord;
use crate::roles::RoleSet;

#[derive(Clone, Debug, Default)]
pub struct PolicySnapshot {
    host_id: String,
    business: HashSet<String>,
    roles: HashMap<String, RoleSet>,
    aliases: HashMap<String, String>,
    reverse_aliases: HashMap<String, Vec<String>>,
    see_all: HashSet<String>,
    version: Option<String>,
}

impl PolicySnapshot {
    pub fn empty(host_id: impl Into<String>) -> Self {
        Self {
            host_id: host_id.into(),
            ..Self::default()
        }
    }

    pub fn from_record(record: &HostConfigRecord) -> Self {
        let host_id = record.host_id();
        let business = decode_or_empty::<Business>(host_id, record.business());
        let alias_groups = decode_or_empty::<Aliases>(host_id, record.aliases());
        let role_groups = decode_or_empty::<Roles>(host_id, record.roles());
        let extension = decode_extension(record.others()).unwrap_or_else(|err| {
            warn!(host_id = %host_id, error = %err, "extension document unreadable");
            Extension::default()
        });

        let alias_index = expand_aliases(&alias_groups);
        Self {
            host_id: host_id.to_string(),
            business: business.into_iter().collect(),
            roles: expand_roles(&role_groups),
            aliases: alias_index.forward,
            reverse_aliases: alias_index.reverse,
            see_all: extension.see_all_ids().into_iter().collect(),
            version: extension.version().map(str::to_string),
        }
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn is_business_partner(&self, host_id: &str) -> bool {
        self.business.contains(host_id)
    }

    pub fn business_partners(&self) -> impl Iterator<Item = &str> {
        self.business.iter().map(String::as_str)
    }

    pub fn has_business_whitelist(&self) -> bool {
        !self.business.is_empty()
    }

    pub fn permissions_of(&self, host_id: &str) -> RoleSet {
        self.roles.get(host_id).copied().unwrap_or(RoleSet::NOACCESS)
    }

    pub fn canonical_of<'a>(&'a self, id: &'a str) -> &'a str {
        self.aliases.get(id).map(String::as_str).unwrap_or(id)
    }

    pub fn aliases_of(&self, host_id: &str) -> &[String] {
        self.reverse_aliases
            .get(host_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn can_see_all(&self, host_id: &str) -> bool {
        self.see_all.contains(host_id)
    }

    pub fn recorded_version(&self) -> &str {
        self.version.as_deref().unwrap_or(DEFAULT_VERSION)
    }
}

fn decode_or_empty<S: PolicySection>(host_id: &str, text: &str) -> S::State {
    S::decode(text).unwrap_or_else(|err| {
        warn!(host_id = %host_id, section = S::NAME, error = %err, "stored document unreadable");
        S::State::default()
    })
}
