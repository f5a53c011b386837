// attest-core/src/infrastructure/adapters/duckdb.rs

use async_trait::async_trait;
use duckdb::{Config, Connection};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

// Imports Hexagonaux
use crate::error::AttestError;
use crate::infrastructure::config::DirectoryConfig;
use crate::infrastructure::error::{DatabaseError, InfrastructureError};
use crate::ports::directory::{Candidate, Directory};

/// Tenant directory served by an embedded DuckDB database — either a
/// database file or a CSV registered as a view.
pub struct DuckDbDirectory {
    conn: Arc<Mutex<Connection>>,
    table: String,
    id_column: String,
    display_column: String,
    /// Lookup field name -> directory column.
    fields: HashMap<String, String>,
}

impl DuckDbDirectory {
    /// Builds the adapter from the project's directory block. `source_csv`
    /// takes an in-memory engine with a read_csv_auto view; otherwise
    /// `db_path` (or `:memory:`) is opened directly.
    pub fn from_config(
        config: &DirectoryConfig,
        project_dir: &std::path::Path,
    ) -> Result<Self, InfrastructureError> {
        if let Some(csv) = &config.source_csv {
            let csv_path = project_dir.join(csv);
            if !csv_path.exists() {
                return Err(InfrastructureError::ConfigError(format!(
                    "Directory CSV not found at {:?}",
                    csv_path
                )));
            }
            let adapter = Self::open(":memory:", config)?;
            adapter.register_csv(&config.table, &csv_path.to_string_lossy())?;
            return Ok(adapter);
        }

        let db_path = config.db_path.as_deref().unwrap_or(":memory:");
        Self::open(db_path, config)
    }

    pub fn open(db_path: &str, config: &DirectoryConfig) -> Result<Self, InfrastructureError> {
        let db_config = Config::default();

        let conn = if db_path == ":memory:" {
            Connection::open_in_memory_with_flags(db_config)?
        } else {
            Connection::open_with_flags(db_path, db_config)?
        };

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            table: config.table.clone(),
            id_column: config.id_column.clone(),
            display_column: config.display_column.clone(),
            fields: config.fields.clone(),
        })
    }

    /// Expose le CSV du tenant comme une vue requêtable.
    fn register_csv(&self, name: &str, path: &str) -> Result<(), InfrastructureError> {
        let conn = self.lock()?;
        let sql = format!(
            "CREATE OR REPLACE VIEW \"{}\" AS SELECT * FROM read_csv_auto('{}')",
            name,
            path.replace('\'', "''")
        );
        conn.execute(&sql, []).map(|_| ()).map_err(|e| {
            InfrastructureError::Database(DatabaseError::DuckDB(e))
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, InfrastructureError> {
        self.conn
            .lock()
            .map_err(|_| InfrastructureError::Io(std::io::Error::other("DuckDB Mutex Poisoned")))
    }
}

#[async_trait]
impl Directory for DuckDbDirectory {
    async fn query(&self, field: &str, value: &str) -> Result<Vec<Candidate>, AttestError> {
        // An unmapped lookup field is a tenant configuration gap: logged,
        // zero candidates, never a crash.
        let Some(column) = self.fields.get(field) else {
            error!(field, "Lookup field has no directory column mapping");
            return Ok(vec![]);
        };

        let conn = self.lock().map_err(AttestError::Infrastructure)?;

        let sql = format!(
            "SELECT CAST(\"{}\" AS VARCHAR), CAST(\"{}\" AS VARCHAR) FROM \"{}\" WHERE CAST(\"{}\" AS VARCHAR) = ?",
            self.id_column, self.display_column, self.table, column
        );
        debug!(field, column, "Directory query");

        let mut stmt = conn.prepare(&sql).map_err(|e| {
            AttestError::Infrastructure(InfrastructureError::Database(DatabaseError::DuckDB(e)))
        })?;

        let rows = stmt
            .query_map(duckdb::params![value], |row| {
                Ok(Candidate {
                    identifier: row.get(0)?,
                    display: row.get(1)?,
                })
            })
            .map_err(|e| {
                AttestError::Infrastructure(InfrastructureError::Database(DatabaseError::DuckDB(e)))
            })?;

        let mut candidates = Vec::new();
        for row in rows {
            candidates.push(row.map_err(|e| {
                AttestError::Infrastructure(InfrastructureError::Database(DatabaseError::DuckDB(e)))
            })?);
        }

        Ok(candidates)
    }
}
