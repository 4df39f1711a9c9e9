//! Shared components - common types, errors, and utilities

pub mod config;
pub mod errors;
pub mod subscription;
pub mod types;
pub mod utils;
