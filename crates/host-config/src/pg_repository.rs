use postgres::error::SqlState;
use postgres::types::ToSql;
use postgres::{Client, Row};

use crate::record::{HostConfigFilter, HostConfigRecord, UpdatedInfo};
use crate::repository::RepositoryError;

const SELECT_ALL_FIELDS: &str =
    "SELECT BUSINESS, ROLES, ALIASES, OTHERS, UPDATEDINFO, HOSTID FROM HOSTCONFIG";

fn store_err(err: postgres::Error) -> RepositoryError {
    RepositoryError::Store(err.to_string())
}

fn record_from_row(row: &Row) -> Result<HostConfigRecord, RepositoryError> {
    let get = |idx: usize| -> Result<String, RepositoryError> {
        row.try_get::<_, Option<String>>(idx)
            .map(Option::unwrap_or_default)
            .map_err(|err| RepositoryError::Serialization(err.to_string()))
    };
    let updated_info: i32 = row
        .try_get(4)
        .map_err(|err| RepositoryError::Serialization(err.to_string()))?;
    Ok(
        HostConfigRecord::new(get(5)?, &get(0)?, &get(1)?, &get(2)?, &get(3)?)
            .with_updated_info(UpdatedInfo::from_ordinal(i64::from(updated_info))),
    )
}

pub fn ensure_schema(client: &mut Client) -> Result<(), RepositoryError> {
    client
        .batch_execute(
            "CREATE TABLE IF NOT EXISTS HOSTCONFIG (
                BUSINESS TEXT NOT NULL DEFAULT '',
                ROLES TEXT NOT NULL DEFAULT '',
                ALIASES TEXT NOT NULL DEFAULT '',
                OTHERS TEXT NOT NULL DEFAULT '',
                UPDATEDINFO INTEGER NOT NULL DEFAULT 0,
                HOSTID VARCHAR(255) NOT NULL PRIMARY KEY
            );",
        )
        .map_err(store_err)
}

pub fn insert(client: &mut Client, record: &HostConfigRecord) -> Result<(), RepositoryError> {
    let result = client.execute(
        "INSERT INTO HOSTCONFIG (BUSINESS, ROLES, ALIASES, OTHERS, UPDATEDINFO, HOSTID)
         VALUES ($1, $2, $3, $4, $5, $6)",
        &[
            &record.business(),
            &record.roles(),
            &record.aliases(),
            &record.others(),
            &record.updated_info().ordinal(),
            &record.host_id(),
        ],
    );
    match result {
        Ok(_) => Ok(()),
        Err(err) if err.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
            Err(RepositoryError::AlreadyExists(record.host_id().to_string()))
        }
        Err(err) => Err(store_err(err)),
    }
}

pub fn select(client: &mut Client, host_id: &str) -> Result<HostConfigRecord, RepositoryError> {
    let row = client
        .query_opt(&format!("{SELECT_ALL_FIELDS} WHERE HOSTID = $1"), &[&host_id])
        .map_err(store_err)?;
    let Some(row) = row else {
        return Err(RepositoryError::NotFound(host_id.to_string()));
    };
    record_from_row(&row)
}

pub fn update(client: &mut Client, record: &HostConfigRecord) -> Result<(), RepositoryError> {
    let changed = client
        .execute(
            "UPDATE HOSTCONFIG
             SET BUSINESS = $1, ROLES = $2, ALIASES = $3, OTHERS = $4, UPDATEDINFO = $5
             WHERE HOSTID = $6",
            &[
                &record.business(),
                &record.roles(),
                &record.aliases(),
                &record.others(),
                &record.updated_info().ordinal(),
                &record.host_id(),
            ],
        )
        .map_err(store_err)?;
    if changed == 0 {
        return Err(RepositoryError::NotFound(record.host_id().to_string()));
    }
    Ok(())
}

pub fn delete(client: &mut Client, host_id: &str) -> Result<(), RepositoryError> {
    let changed = client
        .execute("DELETE FROM HOSTCONFIG WHERE HOSTID = $1", &[&host_id])
        .map_err(store_err)?;
    if changed == 0 {
        return Err(RepositoryError::NotFound(host_id.to_string()));
    }
    Ok(())
}

pub fn exists(client: &mut Client, host_id: &str) -> Result<bool, RepositoryError> {
    let row = client
        .query_opt("SELECT 1 FROM HOSTCONFIG WHERE HOSTID = $1", &[&host_id])
        .map_err(store_err)?;
    Ok(row.is_some())
}

pub fn find(
    client: &mut Client,
    filter: &HostConfigFilter,
) -> Result<Vec<HostConfigRecord>, RepositoryError> {
    let text_conditions = filter.text_conditions();
    let updated_info = filter.updated_info.map(UpdatedInfo::ordinal);

    let mut conditions = Vec::new();
    let mut values: Vec<&(dyn ToSql + Sync)> = Vec::new();
    for (column, pattern) in &text_conditions {
        values.push(pattern);
        conditions.push(format!("strpos({column}, ${}) > 0", values.len()));
    }
    if let Some(info) = updated_info.as_ref() {
        values.push(info);
        conditions.push(format!("UPDATEDINFO = ${}", values.len()));
    }
    let mut sql = SELECT_ALL_FIELDS.to_string();
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY HOSTID ASC");

    let rows = client.query(sql.as_str(), &values).map_err(store_err)?;
    rows.iter().map(record_from_row).collect()
}
