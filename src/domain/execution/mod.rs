//! Execution domain - submittable operations and their validation

mod execution_plan;
mod extrinsic;
mod transaction_validator;

pub use execution_plan::{
    ActionRequest, ExecutionPlan, OptimalYieldPathParams, RequestCrossChainTransfer, StepSubmitData,
    TxData,
};
pub use extrinsic::{ChainCall, ExtrinsicType};
pub use transaction_validator::TransactionValidator;
