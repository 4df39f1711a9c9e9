//! Yieldpools - earning subsystem of a multi-chain wallet
//! Built with Domain-Driven Design principles

pub mod app;
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod math;
pub mod shared;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for convenience
pub use app::App;
pub use application::{CronManager, StepExecutor, SubscriptionManager};
pub use domain::pool::{PoolInfo, PoolStats, PoolType};
pub use infrastructure::yield_adapters::{AdapterFactory, YieldProtocolAdapter};
