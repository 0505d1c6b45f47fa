use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::roles::Role;

pub const DEFAULT_VERSION: &str = "1.1.0";

pub const EXT_VERSION: &str = "version";
pub const EXT_SEE_ALL: &str = "seeallid";

static WHITESPACES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

pub type BusinessSet = BTreeSet<String>;

pub type GroupMap = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed {kind} document: {reason}")]
    Malformed { kind: &'static str, reason: String },
}

pub fn canonicalize(input: &str) -> String {
    WHITESPACES.replace_all(input, " ").into_owned()
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct BusinessDocument {
    #[serde(default)]
    business: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AliasEntry {
    #[serde(default)]
    realid: String,
    #[serde(default)]
    aliasid: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AliasDocument {
    #[serde(default)]
    aliases: Vec<AliasEntry>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RoleEntry {
    #[serde(default)]
    roleid: String,
    #[serde(default)]
    roleset: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RoleDocument {
    #[serde(default)]
    roles: Vec<RoleEntry>,
}

fn parse_document<T>(kind: &'static str, text: &str) -> Result<T, CodecError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if text.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(text).map_err(|err| CodecError::Malformed {
        kind,
        reason: err.to_string(),
    })
}

pub fn split_items(list: &str) -> impl Iterator<Item = &str> {
    list.split(|ch: char| ch == ' ' || ch == '|')
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

fn push_unique(items: &mut Vec<String>, item: String) {
    if !items.contains(&item) {
        items.push(item);
    }
}

pub fn decode_business(text: &str) -> Result<BusinessSet, CodecError> {
    let document: BusinessDocument = parse_document("business", text)?;
    Ok(document
        .business
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect())
}

pub fn encode_business(ids: &BusinessSet) -> String {
    let document = BusinessDocument {
        business: ids.iter().cloned().collect(),
    };
    serde_json::to_string(&document).unwrap_or_default()
}

pub fn decode_aliases(text: &str) -> Result<GroupMap, CodecError> {
    let document: AliasDocument = parse_document("aliases", text)?;
    let mut groups = GroupMap::new();
    for entry in document.aliases {
        let real_id = entry.realid.trim();
        if real_id.is_empty() {
            continue;
        }
        let aliases: Vec<String> = split_items(&entry.aliasid).map(str::to_string).collect();
        if aliases.is_empty() {
            continue;
        }
        release_aliases(&mut groups, real_id, &aliases);
        let group = groups.entry(real_id.to_string()).or_default();
        for alias in aliases {
            push_unique(group, alias);
        }
    }
    Ok(groups)
}

// An alias belongs to one canonical id: the most recent mapping takes it away
// from every other group, and groups left empty are dropped.
pub fn release_aliases(groups: &mut GroupMap, owner: &str, aliases: &[String]) {
    for (real_id, group) in groups.iter_mut() {
        if real_id != owner {
            group.retain(|alias| !aliases.contains(alias));
        }
    }
    groups.retain(|_, group| !group.is_empty());
}

pub fn encode_aliases(groups: &GroupMap) -> String {
    let document = AliasDocument {
        aliases: groups
            .iter()
            .filter(|(_, aliases)| !aliases.is_empty())
            .map(|(real_id, aliases)| AliasEntry {
                realid: real_id.clone(),
                aliasid: aliases.join(" "),
            })
            .collect(),
    };
    serde_json::to_string(&document).unwrap_or_default()
}

pub fn decode_roles(text: &str) -> Result<GroupMap, CodecError> {
    let document: RoleDocument = parse_document("roles", text)?;
    let mut groups = GroupMap::new();
    for entry in document.roles {
        let host_id = entry.roleid.trim();
        if host_id.is_empty() {
            continue;
        }
        let tokens: Vec<String> = split_items(&entry.roleset)
            .map(str::to_uppercase)
            .collect();
        if tokens.is_empty() {
            continue;
        }
        let group = groups.entry(host_id.to_string()).or_default();
        for token in tokens {
            push_unique(group, token);
        }
    }
    Ok(groups)
}

pub fn encode_roles(groups: &GroupMap) -> String {
    let mut entries = Vec::new();
    for (host_id, tokens) in groups {
        let mut recognized: Vec<&'static str> = Vec::new();
        if tokens.iter().any(|token| Role::parse(token) == Some(Role::NoAccess)) {
            recognized.push(Role::NoAccess.name());
        }
        for role in tokens.iter().filter_map(|token| Role::parse(token)) {
            if role != Role::NoAccess && !recognized.contains(&role.name()) {
                recognized.push(role.name());
            }
        }
        if recognized.is_empty() {
            continue;
        }
        entries.push(RoleEntry {
            roleid: host_id.clone(),
            roleset: recognized.join(" "),
        });
    }
    serde_json::to_string(&RoleDocument { roles: entries }).unwrap_or_default()
}

// keys other than `version` and `seeallid` are carried through untouched
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Extension {
    fields: Map<String, Value>,
}

impl Extension {
    pub fn version(&self) -> Option<&str> {
        self.fields
            .get(EXT_VERSION)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|version| !version.is_empty())
    }

    pub fn set_version(&mut self, version: &str) {
        self.fields
            .insert(EXT_VERSION.to_string(), Value::String(version.to_string()));
    }

    pub fn see_all_ids(&self) -> BTreeSet<String> {
        self.fields
            .get(EXT_SEE_ALL)
            .and_then(Value::as_str)
            .map(|ids| {
                ids.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_see_all_ids<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) {
        let joined = ids.into_iter().collect::<Vec<_>>().join(",");
        self.fields
            .insert(EXT_SEE_ALL.to_string(), Value::String(joined));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn encode(&self) -> String {
        if self.fields.is_empty() {
            return String::new();
        }
        serde_json::to_string(&self.fields).unwrap_or_default()
    }
}

pub fn decode_extension(text: &str) -> Result<Extension, CodecError> {
    let fields: Map<String, Value> = parse_document("extension", text)?;
    Ok(Extension { fields })
}
