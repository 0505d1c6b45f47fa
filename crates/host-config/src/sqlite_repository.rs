use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};

use crate::record::{HostConfigFilter, HostConfigRecord, UpdatedInfo};
use crate::repository::RepositoryError;

const SELECT_ALL_FIELDS: &str =
    "SELECT BUSINESS, ROLES, ALIASES, OTHERS, UPDATEDINFO, HOSTID FROM HOSTCONFIG";

fn store_err(err: rusqlite::Error) -> RepositoryError {
    RepositoryError::Store(err.to_string())
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<HostConfigRecord> {
    let business: String = row.get(0)?;
    let roles: String = row.get(1)?;
    let aliases: String = row.get(2)?;
    let others: String = row.get(3)?;
    let updated_info: i64 = row.get(4)?;
    let host_id: String = row.get(5)?;
    Ok(
        HostConfigRecord::new(host_id, &business, &roles, &aliases, &others)
            .with_updated_info(UpdatedInfo::from_ordinal(updated_info)),
    )
}

pub fn ensure_schema(conn: &Connection) -> Result<(), RepositoryError> {
    conn.execute_batch(
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

pub fn insert(conn: &Connection, record: &HostConfigRecord) -> Result<(), RepositoryError> {
    let result = conn.execute(
        "INSERT INTO HOSTCONFIG (BUSINESS, ROLES, ALIASES, OTHERS, UPDATEDINFO, HOSTID)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.business(),
            record.roles(),
            record.aliases(),
            record.others(),
            record.updated_info().ordinal(),
            record.host_id(),
        ],
    );
    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
            Err(RepositoryError::AlreadyExists(record.host_id().to_string()))
        }
        Err(err) => Err(store_err(err)),
    }
}

pub fn select(conn: &Connection, host_id: &str) -> Result<HostConfigRecord, RepositoryError> {
    conn.query_row(
        &format!("{SELECT_ALL_FIELDS} WHERE HOSTID = ?1"),
        params![host_id],
        record_from_row,
    )
    .optional()
    .map_err(store_err)?
    .ok_or_else(|| RepositoryError::NotFound(host_id.to_string()))
}

pub fn update(conn: &Connection, record: &HostConfigRecord) -> Result<(), RepositoryError> {
    let changed = conn
        .execute(
            "UPDATE HOSTCONFIG
             SET BUSINESS = ?1, ROLES = ?2, ALIASES = ?3, OTHERS = ?4, UPDATEDINFO = ?5
             WHERE HOSTID = ?6",
            params![
                record.business(),
                record.roles(),
                record.aliases(),
                record.others(),
                record.updated_info().ordinal(),
                record.host_id(),
            ],
        )
        .map_err(store_err)?;
    if changed == 0 {
        return Err(RepositoryError::NotFound(record.host_id().to_string()));
    }
    Ok(())
}

pub fn delete(conn: &Connection, host_id: &str) -> Result<(), RepositoryError> {
    let changed = conn
        .execute("DELETE FROM HOSTCONFIG WHERE HOSTID = ?1", params![host_id])
        .map_err(store_err)?;
    if changed == 0 {
        return Err(RepositoryError::NotFound(host_id.to_string()));
    }
    Ok(())
}

pub fn exists(conn: &Connection, host_id: &str) -> Result<bool, RepositoryError> {
    conn.query_row(
        "SELECT 1 FROM HOSTCONFIG WHERE HOSTID = ?1",
        params![host_id],
        |_| Ok(()),
    )
    .optional()
    .map(|row| row.is_some())
    .map_err(store_err)
}

// instr() keeps the match case-sensitive; LIKE would fold ASCII case.
pub fn find(
    conn: &Connection,
    filter: &HostConfigFilter,
) -> Result<Vec<HostConfigRecord>, RepositoryError> {
    let mut conditions = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();
    for (column, pattern) in filter.text_conditions() {
        values.push(Box::new(pattern.to_string()));
        conditions.push(format!("instr({column}, ?{}) > 0", values.len()));
    }
    if let Some(info) = filter.updated_info {
        values.push(Box::new(info.ordinal()));
        conditions.push(format!("UPDATEDINFO = ?{}", values.len()));
    }
    let mut sql = SELECT_ALL_FIELDS.to_string();
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY HOSTID ASC");

    let mut stmt = conn.prepare(&sql).map_err(store_err)?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), record_from_row)
        .map_err(store_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(store_err)
}
