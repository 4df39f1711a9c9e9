//! Chain access - storage queries, connection liveness and collaborators

pub mod connection;
pub mod services;
pub mod substrate_api;

pub use connection::{ChainConnection, ConnectionRegistry, JsonRpcConnection};
pub use services::{
    BalanceService, ChainBalanceService, FreeBalance, PalletXcmBuilder, TransactionResponse,
    TransactionService, XcmBuilder, XcmRequest,
};
pub use substrate_api::{BlockHeader, ChainApiRegistry, StorageSubscription, SubstrateApi};
