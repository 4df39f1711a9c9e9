//! Local persistence for pools and positions

pub mod database;
pub mod yield_pool_store;
pub mod yield_position_store;

pub use database::YieldDatabase;
pub use yield_pool_store::YieldPoolStore;
pub use yield_position_store::YieldPositionStore;
