//! Domain layer - core business logic and entities

pub mod execution;
pub mod path;
pub mod pool;
pub mod position;
pub mod wallet;
