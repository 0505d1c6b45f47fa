#[derive(Clone, Debug)]
pub struct StaticConfigItem {
    pub key: &'static str,
    pub description: &'static str,
    pub value_type: &'static str,
    pub default_value: &'static str,
}

pub const HOST_ID: &str = "node.host_id";
pub const STORAGE_URL: &str = "storage.url";
pub const STORAGE_SQLITE_PATH: &str = "storage.sqlite_path";
pub const STORAGE_USER: &str = "storage.user";
pub const STORAGE_PASSWORD: &str = "storage.password";
pub const STORAGE_ACQUIRE_TIMEOUT_MS: &str = "storage.acquire_timeout_ms";
pub const BOOTSTRAP_CREATE_SCHEMA: &str = "bootstrap.create_schema";
pub const BOOTSTRAP_STAMP_VERSION: &str = "bootstrap.stamp_version";

pub static STATIC_CONFIG_TABLE: &[StaticConfigItem] = &[
    StaticConfigItem {
        key: HOST_ID,
        description: "Identifier of the local host whose policy is served",
        value_type: "string",
        default_value: "",
    },
    StaticConfigItem {
        key: STORAGE_URL,
        description: "Database connection url; the vendor is inferred from it",
        value_type: "string",
        default_value: "",
    },
    StaticConfigItem {
        key: STORAGE_SQLITE_PATH,
        description: "SQLite database path (used when storage.url is empty)",
        value_type: "string",
        default_value: "hostconfig.sqlite",
    },
    StaticConfigItem {
        key: STORAGE_USER,
        description: "Database user",
        value_type: "string",
        default_value: "",
    },
    StaticConfigItem {
        key: STORAGE_PASSWORD,
        description: "Database password",
        value_type: "string",
        default_value: "",
    },
    StaticConfigItem {
        key: STORAGE_ACQUIRE_TIMEOUT_MS,
        description: "Maximum wait for a pooled connection in milliseconds",
        value_type: "number",
        default_value: "5000",
    },
    StaticConfigItem {
        key: BOOTSTRAP_CREATE_SCHEMA,
        description: "Create the HOSTCONFIG table on start when missing",
        value_type: "boolean",
        default_value: "true",
    },
    StaticConfigItem {
        key: BOOTSTRAP_STAMP_VERSION,
        description: "Record the running version in the local host configuration on start",
        value_type: "boolean",
        default_value: "false",
    },
];
