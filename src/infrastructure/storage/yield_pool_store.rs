//! Pool metadata and last known stats

use chrono::Utc;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use std::sync::Arc;

use super::database::{placeholders, YieldDatabase};
use crate::domain::pool::{PoolInfo, PoolStats, PoolType, YieldPoolInfo};
use crate::shared::errors::StorageError;

#[derive(Clone)]
pub struct YieldPoolStore {
    db: YieldDatabase,
}

impl YieldPoolStore {
    pub fn new(db: YieldDatabase) -> Self {
        Self { db }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<(String, Option<String>)> {
        Ok((row.get(0)?, row.get(1)?))
    }

    fn decode(raw: (String, Option<String>)) -> Result<YieldPoolInfo, StorageError> {
        let (info, stats) = raw;
        let pool: PoolInfo = serde_json::from_str(&info)?;
        let stats: Option<PoolStats> = stats.map(|s| serde_json::from_str(&s)).transpose()?;
        Ok(YieldPoolInfo {
            pool: Arc::new(pool),
            stats,
        })
    }

    /// Insert or replace by slug
    pub fn upsert(&self, item: &YieldPoolInfo) -> Result<(), StorageError> {
        let info = serde_json::to_string(item.pool.as_ref())?;
        let stats = item.stats.as_ref().map(serde_json::to_string).transpose()?;

        self.db.conn()?.execute(
            "INSERT INTO yield_pools (slug, chain, pool_type, info, stats, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(slug) DO UPDATE SET
                chain = excluded.chain,
                pool_type = excluded.pool_type,
                info = excluded.info,
                stats = excluded.stats,
                updated_at = excluded.updated_at",
            params![
                item.pool.slug,
                item.pool.chain,
                item.pool.pool_type.as_str(),
                info,
                stats,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn get_all(&self) -> Result<Vec<YieldPoolInfo>, StorageError> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare("SELECT info, stats FROM yield_pools ORDER BY slug")?;
        let rows = stmt.query_map([], Self::from_row)?.collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(Self::decode).collect()
    }

    /// Pools on any of `chains`, compared case-insensitively. An empty list returns every pool.
    pub fn get_by_chains(&self, chains: &[String]) -> Result<Vec<YieldPoolInfo>, StorageError> {
        if chains.is_empty() {
            return self.get_all();
        }

        let sql = format!(
            "SELECT info, stats FROM yield_pools WHERE lower(chain) IN ({}) ORDER BY slug",
            placeholders(chains.len())
        );
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(chains.iter().map(|c| c.to_lowercase())), Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(Self::decode).collect()
    }

    /// First pool of `pool_type` on `chain`
    pub fn get_by_chain_and_type(&self, chain: &str, pool_type: PoolType) -> Result<Option<YieldPoolInfo>, StorageError> {
        let raw = self
            .db
            .conn()?
            .query_row(
                "SELECT info, stats FROM yield_pools WHERE chain = ?1 AND pool_type = ?2 ORDER BY slug LIMIT 1",
                params![chain, pool_type.as_str()],
                Self::from_row,
            )
            .optional()?;
        raw.map(Self::decode).transpose()
    }

    /// Returns the number of rows removed
    pub fn bulk_delete(&self, slugs: &[String]) -> Result<usize, StorageError> {
        if slugs.is_empty() {
            return Ok(0);
        }
        let sql = format!("DELETE FROM yield_pools WHERE slug IN ({})", placeholders(slugs.len()));
        Ok(self.db.conn()?.execute(&sql, params_from_iter(slugs.iter()))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{parallel_pool, simple_pool};

    fn store() -> YieldPoolStore {
        YieldPoolStore::new(YieldDatabase::open_in_memory().unwrap())
    }

    fn moonwell() -> YieldPoolInfo {
        let pool = simple_pool("xcDOT___lending___moonwell", "moonbeam", PoolType::Lending, "moonbeam-LOCAL-xcDOT");
        let stats = PoolStats::unavailable(PoolType::Lending, "moonbeam-LOCAL-xcDOT", 50);
        YieldPoolInfo::with_stats(Arc::new(pool), stats)
    }

    #[test]
    fn test_upsert_replaces_stats() {
        let store = store();
        let (pool, _) = parallel_pool();
        let pool = Arc::new(pool);

        store.upsert(&YieldPoolInfo::new(pool.clone())).unwrap();
        let mut stats = PoolStats::unavailable(PoolType::LiquidStaking, "parallel-LOCAL-DOT", 10);
        stats.tvl = 42;
        store.upsert(&YieldPoolInfo::with_stats(pool, stats.clone())).unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].stats, Some(stats));
    }

    #[test]
    fn test_get_by_chains_is_case_insensitive() {
        let store = store();
        let (pool, _) = parallel_pool();
        store.upsert(&YieldPoolInfo::new(Arc::new(pool))).unwrap();
        store.upsert(&moonwell()).unwrap();

        let found = store.get_by_chains(&["MoonBeam".to_string()]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].slug(), "xcDOT___lending___moonwell");

        assert_eq!(store.get_by_chains(&[]).unwrap().len(), 2);
    }

    #[test]
    fn test_get_by_chain_and_type() {
        let store = store();
        store.upsert(&moonwell()).unwrap();

        assert!(store.get_by_chain_and_type("moonbeam", PoolType::Lending).unwrap().is_some());
        assert!(store.get_by_chain_and_type("moonbeam", PoolType::NativeStaking).unwrap().is_none());
    }

    #[test]
    fn test_bulk_delete() {
        let store = store();
        store.upsert(&moonwell()).unwrap();

        assert_eq!(store.bulk_delete(&["xcDOT___lending___moonwell".to_string(), "missing".to_string()]).unwrap(), 1);
        assert!(store.get_all().unwrap().is_empty());
        assert_eq!(store.bulk_delete(&[]).unwrap(), 0);
    }
}
