//! Database management and migrations
//!
//! Provides the SQLite connection pool, embedded migrations, and the write
//! transaction guard used for every validate-then-write and
//! re-read-then-write sequence.

use crate::error::{AcadflowError, Result};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
};
use sqlx::Sqlite;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Type alias for the database connection pool
pub type DatabasePool = SqlitePool;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Database connection wrapper
#[derive(Clone, Debug)]
pub struct Database {
    pub(crate) pool: Arc<DatabasePool>,

    /// Idle connection that keeps a shared in-memory database alive while
    /// pool connections come and go
    memory_anchor: Option<Arc<DatabasePool>>,
}

impl Database {
    /// Open (creating if needed) the database file at `database_path`
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        Self::with_max_connections(database_path, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Open the database file with a custom pool size
    pub async fn with_max_connections<P: AsRef<Path>>(
        database_path: P,
        max_connections: u32,
    ) -> Result<Self> {
        let path = database_path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AcadflowError::Database(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        debug!(path = %path.display(), "Connecting to database");

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| AcadflowError::Database(format!("Failed to connect to database: {}", e)))?;

        info!(path = %path.display(), "Database connection established");

        Ok(Self {
            pool: Arc::new(pool),
            memory_anchor: None,
        })
    }

    /// Private in-memory database, migrated and ready to use
    ///
    /// The database is a uniquely named shared-cache memory database. An
    /// anchor connection holds it open, so a connection discarded by an
    /// unfinished [`WriteTransaction`] does not take the data with it. The
    /// working pool has a single connection because shared-cache writers
    /// do not honour the busy timeout.
    pub async fn in_memory() -> Result<Self> {
        let url = format!("sqlite://acadflow-{}?mode=memory&cache=shared", Uuid::new_v4());
        let options = SqliteConnectOptions::from_str(&url)?.foreign_keys(true);

        let anchor = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options.clone())
            .await
            .map_err(|e| AcadflowError::Database(format!("Failed to open in-memory database: {}", e)))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| AcadflowError::Database(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self {
            pool: Arc::new(pool),
            memory_anchor: Some(Arc::new(anchor)),
        };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Run embedded migrations from ./migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(self.pool.as_ref())
            .await
            .map_err(|e| AcadflowError::Database(format!("Migration failed: {}", e)))?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Open a database file and run all migrations
    pub async fn initialize<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let db = Self::new(database_path).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Start a transaction that holds the write lock from its first statement
    ///
    /// Readers are never blocked; other writers wait up to the busy timeout.
    pub async fn begin_write(&self) -> Result<WriteTransaction> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AcadflowError::Database(format!("Failed to acquire connection: {}", e)))?;

        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(|e| AcadflowError::Database(format!("Failed to begin transaction: {}", e)))?;

        Ok(WriteTransaction { conn: Some(conn) })
    }

    /// Perform a health check by running a simple query
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await
            .map_err(|e| AcadflowError::Database(format!("Health check failed: {}", e)))?;

        Ok(())
    }

    /// Close the database connection
    pub async fn close(&self) {
        self.pool.close().await;
        if let Some(anchor) = &self.memory_anchor {
            anchor.close().await;
        }
        info!("Database connection closed");
    }
}

/// Exclusive write transaction
///
/// Dropping the guard without [`WriteTransaction::commit`] discards the
/// connection, which rolls the transaction back.
pub struct WriteTransaction {
    conn: Option<PoolConnection<Sqlite>>,
}

impl WriteTransaction {
    pub async fn commit(mut self) -> Result<()> {
        self.finish("COMMIT").await
    }

    pub async fn rollback(mut self) -> Result<()> {
        self.finish("ROLLBACK").await
    }

    async fn finish(&mut self, statement: &'static str) -> Result<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        if let Err(e) = sqlx::query(statement).execute(&mut *conn).await {
            // The connection state is unknown; keep it out of the pool
            drop(conn.detach());
            return Err(AcadflowError::Database(format!("{} failed: {}", statement, e)));
        }
        Ok(())
    }
}

impl Deref for WriteTransaction {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        match self.conn.as_deref() {
            Some(conn) => conn,
            None => unreachable!("write transaction used after it finished"),
        }
    }
}

impl DerefMut for WriteTransaction {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        match self.conn.as_deref_mut() {
            Some(conn) => conn,
            None => unreachable!("write transaction used after it finished"),
        }
    }
}

impl Drop for WriteTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!("Write transaction dropped without commit; discarding connection");
            drop(conn.detach());
        }
    }
}
