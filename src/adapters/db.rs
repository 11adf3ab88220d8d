use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use crate::domain::models::EnergyTotalRecord;

pub const LATEST_SCHEMA_VERSION: u32 = 1;

const ENTRY_ID_KEY: &str = "entry_id";

const MIGRATIONS: &[(u32, &str)] = &[(
    1,
    r#"
CREATE TABLE IF NOT EXISTS energy_totals (
    sensor_key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#,
)];

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unsupported schema version {current}; latest supported is {latest}")]
    UnsupportedSchemaVersion { current: u32, latest: u32 },
}

pub fn open_connection(path: &str) -> Result<Connection, DbError> {
    Connection::open(path).map_err(DbError::from)
}

pub fn run_migrations(connection: &mut Connection) -> Result<(), DbError> {
    let current_version = schema_version(connection)?;

    if current_version > LATEST_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            current: current_version,
            latest: LATEST_SCHEMA_VERSION,
        });
    }

    let transaction = connection.transaction()?;

    for (version, sql) in MIGRATIONS {
        if *version > current_version {
            transaction.execute_batch(sql)?;
            transaction.pragma_update(None, "user_version", version)?;
        }
    }

    transaction.commit()?;

    Ok(())
}

pub fn schema_version(connection: &Connection) -> Result<u32, DbError> {
    let version = connection.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Raw persisted values keyed by sensor key. Values are returned as stored;
/// parsing them is the caller's concern.
pub fn load_energy_totals(connection: &Connection) -> Result<HashMap<String, String>, DbError> {
    let mut statement = connection.prepare("SELECT sensor_key, value FROM energy_totals")?;

    let rows = statement.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut totals = HashMap::new();
    for row in rows {
        let (key, value) = row?;
        totals.insert(key, value);
    }

    Ok(totals)
}

pub fn upsert_energy_totals(
    connection: &mut Connection,
    records: &[EnergyTotalRecord],
) -> Result<usize, DbError> {
    let transaction = connection.transaction()?;

    {
        let mut statement = transaction.prepare(
            "INSERT INTO energy_totals (sensor_key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(sensor_key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )?;

        for record in records {
            statement.execute(params![record.sensor_key, record.value, record.updated_at])?;
        }
    }

    transaction.commit()?;

    Ok(records.len())
}

/// Returns the stored entry id, creating one on first use.
pub fn get_or_create_entry_id(connection: &Connection) -> Result<String, DbError> {
    let existing: Option<String> = connection
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            params![ENTRY_ID_KEY],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(entry_id) = existing {
        return Ok(entry_id);
    }

    let entry_id = uuid::Uuid::new_v4().simple().to_string();
    connection.execute(
        "INSERT INTO metadata (key, value) VALUES (?1, ?2)",
        params![ENTRY_ID_KEY, entry_id],
    )?;

    Ok(entry_id)
}
