use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{canonicalize, decode_extension};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum UpdatedInfo {
    #[default]
    Unknown,
    NotUpdated,
    Interrupted,
    ToSubmit,
    InError,
    Running,
    Done,
}

impl UpdatedInfo {
    pub fn ordinal(self) -> i32 {
        match self {
            UpdatedInfo::Unknown => 0,
            UpdatedInfo::NotUpdated => 1,
            UpdatedInfo::Interrupted => 2,
            UpdatedInfo::ToSubmit => 3,
            UpdatedInfo::InError => 4,
            UpdatedInfo::Running => 5,
            UpdatedInfo::Done => 6,
        }
    }

    pub fn from_ordinal(value: i64) -> Self {
        match value {
            1 => UpdatedInfo::NotUpdated,
            2 => UpdatedInfo::Interrupted,
            3 => UpdatedInfo::ToSubmit,
            4 => UpdatedInfo::InError,
            5 => UpdatedInfo::Running,
            6 => UpdatedInfo::Done,
            _ => UpdatedInfo::Unknown,
        }
    }
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("host configuration requires a non-empty HOSTID")]
    MissingHostId,
    #[error("invalid host configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct RecordFields {
    #[serde(rename = "HOSTID", default)]
    host_id: String,
    #[serde(rename = "BUSINESS", default)]
    business: Option<String>,
    #[serde(rename = "ROLES", default)]
    roles: Option<String>,
    #[serde(rename = "ALIASES", default)]
    aliases: Option<String>,
    #[serde(rename = "OTHERS", default)]
    others: Option<String>,
    #[serde(rename = "UPDATEDINFO", default)]
    updated_info: i64,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RecordFields", into = "RecordFields")]
pub struct HostConfigRecord {
    host_id: String,
    business: String,
    roles: String,
    aliases: String,
    others: String,
    updated_info: UpdatedInfo,
}

impl HostConfigRecord {
    pub fn new(
        host_id: impl Into<String>,
        business: &str,
        roles: &str,
        aliases: &str,
        others: &str,
    ) -> Self {
        Self {
            host_id: host_id.into(),
            business: canonicalize(business),
            roles: canonicalize(roles),
            aliases: canonicalize(aliases),
            others: canonicalize(others),
            updated_info: UpdatedInfo::Unknown,
        }
    }

    pub fn empty(host_id: impl Into<String>) -> Self {
        Self::new(host_id, "", "", "", "")
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, RecordError> {
        serde_json::from_value(value).map_err(|err| RecordError::Invalid(err.to_string()))
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn business(&self) -> &str {
        &self.business
    }

    pub fn roles(&self) -> &str {
        &self.roles
    }

    pub fn aliases(&self) -> &str {
        &self.aliases
    }

    pub fn others(&self) -> &str {
        &self.others
    }

    pub fn updated_info(&self) -> UpdatedInfo {
        self.updated_info
    }

    pub fn set_business(&mut self, business: &str) {
        self.business = canonicalize(business);
    }

    pub fn set_roles(&mut self, roles: &str) {
        self.roles = canonicalize(roles);
    }

    pub fn set_aliases(&mut self, aliases: &str) {
        self.aliases = canonicalize(aliases);
    }

    pub fn set_others(&mut self, others: &str) {
        self.others = canonicalize(others);
    }

    pub fn set_updated_info(&mut self, info: UpdatedInfo) {
        self.updated_info = info;
    }

    pub fn with_updated_info(mut self, info: UpdatedInfo) -> Self {
        self.updated_info = info;
        self
    }

    pub fn is_see_all_id(&self, id: &str) -> bool {
        decode_extension(&self.others)
            .map(|extension| extension.see_all_ids().contains(id))
            .unwrap_or(false)
    }
}

impl TryFrom<RecordFields> for HostConfigRecord {
    type Error = RecordError;

    fn try_from(fields: RecordFields) -> Result<Self, Self::Error> {
        if fields.host_id.trim().is_empty() {
            return Err(RecordError::MissingHostId);
        }
        let record = HostConfigRecord::new(
            fields.host_id,
            fields.business.as_deref().unwrap_or_default(),
            fields.roles.as_deref().unwrap_or_default(),
            fields.aliases.as_deref().unwrap_or_default(),
            fields.others.as_deref().unwrap_or_default(),
        );
        Ok(record.with_updated_info(UpdatedInfo::from_ordinal(fields.updated_info)))
    }
}

impl From<HostConfigRecord> for RecordFields {
    fn from(record: HostConfigRecord) -> Self {
        Self {
            host_id: record.host_id,
            business: Some(record.business),
            roles: Some(record.roles),
            aliases: Some(record.aliases),
            others: Some(record.others),
            updated_info: i64::from(record.updated_info.ordinal()),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HostConfigFilter {
    pub host_id: Option<String>,
    pub business: Option<String>,
    pub roles: Option<String>,
    pub aliases: Option<String>,
    pub others: Option<String>,
    pub updated_info: Option<UpdatedInfo>,
}

impl HostConfigFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn host_id(mut self, pattern: impl Into<String>) -> Self {
        self.host_id = Some(pattern.into());
        self
    }

    pub fn business(mut self, pattern: impl Into<String>) -> Self {
        self.business = Some(pattern.into());
        self
    }

    pub fn roles(mut self, pattern: impl Into<String>) -> Self {
        self.roles = Some(pattern.into());
        self
    }

    pub fn aliases(mut self, pattern: impl Into<String>) -> Self {
        self.aliases = Some(pattern.into());
        self
    }

    pub fn others(mut self, pattern: impl Into<String>) -> Self {
        self.others = Some(pattern.into());
        self
    }

    pub fn updated_info(mut self, info: UpdatedInfo) -> Self {
        self.updated_info = Some(info);
        self
    }

    pub fn text_conditions(&self) -> Vec<(&'static str, &str)> {
        [
            ("HOSTID", self.host_id.as_deref()),
            ("BUSINESS", self.business.as_deref()),
            ("ROLES", self.roles.as_deref()),
            ("ALIASES", self.aliases.as_deref()),
            ("OTHERS", self.others.as_deref()),
        ]
        .into_iter()
        .filter_map(|(column, pattern)| pattern.map(|pattern| (column, pattern)))
        .collect()
    }

    pub fn matches(&self, record: &HostConfigRecord) -> bool {
        let columns_match = self.text_conditions().into_iter().all(|(column, pattern)| {
            let value = match column {
                "HOSTID" => record.host_id(),
                "BUSINESS" => record.business(),
                "ROLES" => record.roles(),
                "ALIASES" => record.aliases(),
                _ => record.others(),
            };
            value.contains(pattern)
        });
        columns_match
            && self
                .updated_info
                .map_or(true, |info| record.updated_info() == info)
    }
}
