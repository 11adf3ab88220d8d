use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use thiserror::Error;

use crate::adapters::db;
use crate::adapters::db::DbError;
use crate::domain::models::EnergyTotalRecord;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("database lock poisoned")]
    DbLockPoisoned,
    #[error("database operation failed: {0}")]
    Database(#[from] DbError),
}

/// Durable per-sensor slots for energy totals.
pub trait EnergyStore {
    fn load_totals(&self) -> Result<HashMap<String, String>, ServiceError>;
    fn save_totals(&self, records: &[EnergyTotalRecord]) -> Result<usize, ServiceError>;
    fn entry_id(&self) -> Result<String, ServiceError>;
}

#[derive(Clone)]
pub struct SqliteEnergyStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteEnergyStore {
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> Result<T, DbError>,
    ) -> Result<T, ServiceError> {
        let mut connection = self
            .connection
            .lock()
            .map_err(|_| ServiceError::DbLockPoisoned)?;
        op(&mut connection).map_err(ServiceError::from)
    }
}

impl EnergyStore for SqliteEnergyStore {
    fn load_totals(&self) -> Result<HashMap<String, String>, ServiceError> {
        self.with_connection(|connection| db::load_energy_totals(connection))
    }

    fn save_totals(&self, records: &[EnergyTotalRecord]) -> Result<usize, ServiceError> {
        self.with_connection(|connection| db::upsert_energy_totals(connection, records))
    }

    fn entry_id(&self) -> Result<String, ServiceError> {
        self.with_connection(|connection| db::get_or_create_entry_id(connection))
    }
}
