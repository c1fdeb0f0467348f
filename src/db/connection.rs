use std::path::Path;

use libsql::{Builder, Connection};

use crate::errors::{LinkError, Result};

/// The embedded SQL schema applied when initializing a new database.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// libsql database holding components and relationships.
pub struct Database {
    _db: libsql::Database,
    conn: Connection,
}

impl Database {
    /// Creates a new database at `db_path`, creating parent directories if needed.
    ///
    /// Opens a local libsql connection, applies pragmas, and executes the
    /// schema.
    pub async fn initialize(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LinkError::database("initialize", format!("failed to create database directory: {e}"))
            })?;
        }

        let db = Self::connect(db_path, "initialize").await?;

        db.conn
            .execute_batch(SCHEMA_SQL)
            .await
            .map_err(|e| LinkError::database("initialize", format!("failed to apply schema: {e}")))?;

        Ok(db)
    }

    /// Opens an existing database at `db_path`.
    pub async fn open(db_path: &Path) -> Result<Self> {
        if !db_path.exists() {
            return Err(LinkError::database(
                "open",
                format!("database not found at '{}'", db_path.display()),
            ));
        }
        Self::connect(db_path, "open").await
    }

    async fn connect(db_path: &Path, operation: &str) -> Result<Self> {
        let db = Builder::new_local(db_path)
            .build()
            .await
            .map_err(|e| LinkError::database(operation, format!("failed to open database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| LinkError::database(operation, format!("failed to connect: {e}")))?;

        Self::apply_pragmas(&conn).await?;

        Ok(Self { _db: db, conn })
    }

    /// Returns a reference to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn apply_pragmas(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 120000;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;",
        )
        .await
        .map_err(|e| LinkError::database("apply_pragmas", format!("failed to apply pragmas: {e}")))?;
        Ok(())
    }
}
