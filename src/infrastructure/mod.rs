pub mod api_clients;
pub mod chain;
pub mod storage;
pub mod yield_adapters;
