//! SQLite database shared by the yield stores

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

use crate::shared::errors::StorageError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS yield_pools (
    slug TEXT PRIMARY KEY,
    chain TEXT NOT NULL,
    pool_type TEXT NOT NULL,
    info TEXT NOT NULL,
    stats TEXT,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_yield_pools_chain ON yield_pools(chain);

CREATE TABLE IF NOT EXISTS yield_positions (
    slug TEXT NOT NULL,
    address TEXT NOT NULL,
    chain TEXT NOT NULL,
    data TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (slug, address)
);
CREATE INDEX IF NOT EXISTS idx_yield_positions_address ON yield_positions(address);
"#;

/// Handle to the yield database. Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct YieldDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl YieldDatabase {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(std::time::Duration::from_millis(30_000))?;

        let db = Self::init(conn)?;
        info!("💾 Yield database initialized at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

/// `?, ?, ?` for an `IN (...)` clause
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
