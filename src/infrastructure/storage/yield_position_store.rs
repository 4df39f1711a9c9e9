use chrono::Utc;
use rusqlite::{params, params_from_iter};

use super::database::{placeholders, YieldDatabase};
use crate::domain::position::PositionInfo;
use crate::shared::errors::StorageError;

/// Latest position per (pool slug, address)
#[derive(Clone)]
pub struct YieldPositionStore {
    db: YieldDatabase,
}

impl YieldPositionStore {
    pub fn new(db: YieldDatabase) -> Self {
        Self { db }
    }

    pub fn upsert(&self, position: &PositionInfo) -> Result<(), StorageError> {
        let data = serde_json::to_string(position)?;
        self.db.conn()?.execute(
            "INSERT INTO yield_positions (slug, address, chain, data, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(slug, address) DO UPDATE SET
                chain = excluded.chain,
                data = excluded.data,
                updated_at = excluded.updated_at",
            params![position.slug, position.address, position.chain, data, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn select(&self, column: &str, value: &str) -> Result<Vec<PositionInfo>, StorageError> {
        let sql = format!("SELECT data FROM yield_positions WHERE {} = ?1 ORDER BY slug, address", column);
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([value], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.iter()
            .map(|raw| serde_json::from_str(raw).map_err(StorageError::from))
            .collect()
    }

    pub fn get_by_address(&self, address: &str) -> Result<Vec<PositionInfo>, StorageError> {
        self.select("address", address)
    }

    pub fn get_by_slug(&self, slug: &str) -> Result<Vec<PositionInfo>, StorageError> {
        self.select("slug", slug)
    }

    pub fn bulk_delete_by_slugs(&self, slugs: &[String]) -> Result<usize, StorageError> {
        if slugs.is_empty() {
            return Ok(0);
        }
        let sql = format!("DELETE FROM yield_positions WHERE slug IN ({})", placeholders(slugs.len()));
        Ok(self.db.conn()?.execute(&sql, params_from_iter(slugs.iter()))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_by_address_and_slug() {
        let store = YieldPositionStore::new(YieldDatabase::open_in_memory().unwrap());
        store.upsert(&PositionInfo::single("pool-a", "parallel", "5Alice", "sDOT", 10)).unwrap();
        store.upsert(&PositionInfo::single("pool-a", "parallel", "5Alice", "sDOT", 25)).unwrap();
        store.upsert(&PositionInfo::single("pool-b", "polkadot", "5Alice", "DOT", 7)).unwrap();
        store.upsert(&PositionInfo::single("pool-a", "parallel", "5Bob", "sDOT", 3)).unwrap();

        let alice = store.get_by_address("5Alice").unwrap();
        assert_eq!(alice.len(), 2);
        assert_eq!(alice[0].total_balance(), 25);

        assert_eq!(store.get_by_slug("pool-a").unwrap().len(), 2);

        assert_eq!(store.bulk_delete_by_slugs(&["pool-a".to_string()]).unwrap(), 2);
        assert_eq!(store.get_by_address("5Alice").unwrap().len(), 1);
    }
}
