//! Yield path domain - ordered steps for entering a position

mod yield_path;

pub use yield_path::{plan_join_path, transfer_amount_for, JoinPathRequest, OptimalYieldPath, YieldFee, YieldStep, YieldStepType};
