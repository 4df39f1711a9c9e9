//! Application layer - use cases and services

pub mod commands;
pub mod cron;
pub mod enable;
pub mod jobs;
pub mod poller;
pub mod sources;
pub mod state;
pub mod step_executor;
pub mod subscription_manager;

pub use commands::{Cli, CommandExecutor, Commands};
pub use cron::{CronContext, CronManager, CronSources, CronStatusMap};
pub use enable::{Capability, EnableTracker};
pub use poller::{Poller, PollerHandle};
pub use state::WalletState;
pub use step_executor::StepExecutor;
pub use subscription_manager::{ServiceStatusMap, SubscriptionManager, SubscriptionServices};
