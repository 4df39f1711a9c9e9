//! Error handling for the application

use thiserror::Error;

/// Chain connection and storage query errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    #[error("No connection registered for chain: {0}")]
    ChainNotFound(String),

    #[error("Connection not ready: {0}")]
    NotReady(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Unexpected value for {item}: {value}")]
    Decode { item: String, value: String },

    #[error("Block not found: {0}")]
    BlockNotFound(u64),
}

/// Protocol adapter errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    #[error("Pool type not supported: {0}")]
    UnsupportedPool(String),

    #[error("Action {action} is not supported by pool {pool}")]
    UnsupportedAction { pool: String, action: String },

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Invalid pool configuration: {0}")]
    InvalidPool(String),

    #[error("Invalid step index: {0}")]
    InvalidStep(usize),

    #[error("Inconsistent pool stats: {0}")]
    InconsistentStats(String),

    #[error("Collaborator failed: {0}")]
    Collaborator(String),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Validation errors returned to the caller as a list
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Amount {amount} is below the pool minimum of {minimum}")]
    BelowMinimum { amount: u128, minimum: u128 },

    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: u128, required: u128 },

    #[error("Pool {0} is not available")]
    PoolUnavailable(String),

    #[error("Step {0} is out of range")]
    InvalidStep(usize),

    #[error("A transaction for this step is already in flight")]
    StepInFlight,

    #[error("Unable to build yield path: {0}")]
    PathConstruction(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// Step execution errors
#[derive(Error, Debug, Clone)]
pub enum ExecutionError {
    #[error("Validation failed: {0:?}")]
    Validation(Vec<ValidationError>),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

/// Local store errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Cron orchestrator errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CronError {
    #[error("Service {service} requires a {source_name} source")]
    MissingSource {
        service: String,
        source_name: String,
    },

    #[error("Unknown cron service: {0}")]
    UnknownService(String),
}

/// Wallet enablement failed for every capability
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Failed to enable wallet (substrate: {substrate}, evm: {evm})")]
pub struct EnableError {
    pub substrate: String,
    pub evm: String,
}

/// General application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Blockchain error: {0}")]
    BlockchainError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<ChainError> for AppError {
    fn from(err: ChainError) -> Self {
        AppError::BlockchainError(err.to_string())
    }
}

impl From<AdapterError> for AppError {
    fn from(err: AdapterError) -> Self {
        AppError::BlockchainError(err.to_string())
    }
}

impl From<ExecutionError> for AppError {
    fn from(err: ExecutionError) -> Self {
        AppError::ExecutionError(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<CronError> for AppError {
    fn from(err: CronError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<EnableError> for AppError {
    fn from(err: EnableError) -> Self {
        AppError::BlockchainError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ApiError(err.to_string())
    }
}
