use std::fmt;

use crate::pool::PoolError;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum DbVendor {
    H2,
    MariaDb,
    MySql,
    Oracle,
    PostgreSql,
    Sqlite,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VendorProfile {
    pub vendor: DbVendor,
    pub protocol_id: &'static str,
    pub driver_name: &'static str,
    pub validation_query: &'static str,
    pub max_connections_query: Option<&'static str>,
}

// Detection walks this table in order; mariadb must be tested before mysql.
pub static VENDOR_REGISTRY: &[VendorProfile] = &[
    VendorProfile {
        vendor: DbVendor::H2,
        protocol_id: "h2:",
        driver_name: "org.h2.Driver",
        validation_query: "SELECT 1",
        max_connections_query: Some(
            "SELECT VALUE FROM INFORMATION_SCHEMA.SETTINGS WHERE NAME = 'info.MAX_CONNECTIONS'",
        ),
    },
    VendorProfile {
        vendor: DbVendor::MariaDb,
        protocol_id: "mariadb:",
        driver_name: "org.mariadb.jdbc.Driver",
        validation_query: "SELECT 1",
        max_connections_query: Some("SELECT @@max_connections"),
    },
    VendorProfile {
        vendor: DbVendor::MySql,
        protocol_id: "mysql:",
        driver_name: "com.mysql.jdbc.Driver",
        validation_query: "SELECT 1",
        max_connections_query: Some("SELECT @@max_connections"),
    },
    VendorProfile {
        vendor: DbVendor::Oracle,
        protocol_id: "oracle:",
        driver_name: "oracle.jdbc.OracleDriver",
        validation_query: "SELECT 1 FROM DUAL",
        max_connections_query: Some("SELECT value FROM v$parameter WHERE name = 'sessions'"),
    },
    VendorProfile {
        vendor: DbVendor::PostgreSql,
        protocol_id: "postgres",
        driver_name: "postgres",
        validation_query: "SELECT 1",
        max_connections_query: Some("SELECT current_setting('max_connections')"),
    },
    VendorProfile {
        vendor: DbVendor::Sqlite,
        protocol_id: "sqlite:",
        driver_name: "rusqlite",
        validation_query: "SELECT 1",
        max_connections_query: None,
    },
];

impl DbVendor {
    pub fn detect(url: &str) -> Result<&'static VendorProfile, PoolError> {
        let lowered = url.trim().to_lowercase();
        VENDOR_REGISTRY
            .iter()
            .find(|profile| lowered.contains(profile.protocol_id))
            .ok_or_else(|| PoolError::UnsupportedVendor(redact_url(url)))
    }

    pub fn profile(self) -> &'static VendorProfile {
        VENDOR_REGISTRY
            .iter()
            .find(|profile| profile.vendor == self)
            .unwrap_or(&VENDOR_REGISTRY[0])
    }

    pub fn has_driver(self) -> bool {
        matches!(self, DbVendor::PostgreSql | DbVendor::Sqlite)
    }

    pub fn name(self) -> &'static str {
        match self {
            DbVendor::H2 => "h2",
            DbVendor::MariaDb => "mariadb",
            DbVendor::MySql => "mysql",
            DbVendor::Oracle => "oracle",
            DbVendor::PostgreSql => "postgresql",
            DbVendor::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for DbVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn sqlite_path_from_url(url: &str) -> &str {
    let trimmed = url.trim();
    trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed)
}

pub fn is_sqlite_memory(path: &str) -> bool {
    path.is_empty() || path == ":memory:"
}

// Strips `user:password@` so connection strings can be logged or reported.
pub fn redact_url(url: &str) -> String {
    let trimmed = url.trim();
    let Some((scheme, rest)) = trimmed.split_once("://") else {
        return trimmed.to_string();
    };
    match rest.rsplit_once('@') {
        Some((_, host)) => format!("{scheme}://***@{host}"),
        None => trimmed.to_string(),
    }
}
