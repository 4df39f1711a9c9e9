//! Liveness and reconnect handling for chain RPC endpoints

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::shared::types::{ChainInfo, ChainKind};

#[async_trait]
pub trait ChainConnection: Send + Sync {
    fn slug(&self) -> &str;

    fn kind(&self) -> ChainKind;

    /// Last known connection state
    fn is_connected(&self) -> bool;

    /// Re-establish a dropped substrate connection
    async fn recover_connect(&self);

    /// Probe the endpoint; updates the connection state
    async fn is_listening(&self) -> bool;

    /// Replace a failing EVM provider
    async fn refresh(&self);
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<serde_json::Value>,
    error: Option<serde_json::Value>,
}

/// HTTP JSON-RPC endpoint probed with `system_health` (substrate) or
/// `net_listening` (EVM)
pub struct JsonRpcConnection {
    slug: String,
    kind: ChainKind,
    url: String,
    http_client: Client,
    connected: AtomicBool,
}

impl JsonRpcConnection {
    pub fn new(chain: &ChainInfo, timeout: Duration) -> Self {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            slug: chain.slug.clone(),
            kind: chain.kind,
            url: chain.rpc_url.clone(),
            http_client,
            connected: AtomicBool::new(false),
        }
    }

    fn probe_method(&self) -> &'static str {
        match self.kind {
            ChainKind::Substrate => "system_health",
            ChainKind::Evm => "net_listening",
        }
    }

    async fn probe(&self) -> bool {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": self.probe_method(),
            "params": []
        });

        let response = match self.http_client.post(&self.url).json(&body).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!("⚠️ {} RPC returned status: {}", self.slug, response.status());
                return false;
            }
            Err(e) => {
                warn!("⚠️ {} RPC is not reachable: {}", self.slug, e);
                return false;
            }
        };

        match response.json::<RpcResponse>().await {
            Ok(RpcResponse { error: Some(error), .. }) => {
                warn!("⚠️ {} RPC error: {}", self.slug, error);
                false
            }
            Ok(RpcResponse { result: Some(result), .. }) => match self.kind {
                ChainKind::Evm => result.as_bool().unwrap_or(false),
                ChainKind::Substrate => true,
            },
            Ok(_) => false,
            Err(e) => {
                warn!("⚠️ {} RPC response could not be parsed: {}", self.slug, e);
                false
            }
        }
    }
}

#[async_trait]
impl ChainConnection for JsonRpcConnection {
    fn slug(&self) -> &str {
        &self.slug
    }

    fn kind(&self) -> ChainKind {
        self.kind
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn recover_connect(&self) {
        info!("🔄 Recovering connection to {}", self.slug);
        let alive = self.probe().await;
        self.connected.store(alive, Ordering::SeqCst);
    }

    async fn is_listening(&self) -> bool {
        let alive = self.probe().await;
        self.connected.store(alive, Ordering::SeqCst);
        alive
    }

    async fn refresh(&self) {
        info!("🔄 Refreshing provider for {}", self.slug);
        self.connected.store(false, Ordering::SeqCst);
        let alive = self.probe().await;
        self.connected.store(alive, Ordering::SeqCst);
        debug!("{} provider refreshed, alive: {}", self.slug, alive);
    }
}

/// Every configured connection, split by family
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    substrate: HashMap<String, Arc<dyn ChainConnection>>,
    evm: HashMap<String, Arc<dyn ChainConnection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_chains<'a>(chains: impl IntoIterator<Item = &'a ChainInfo>, timeout: Duration) -> Self {
        let mut registry = Self::new();
        for chain in chains.into_iter().filter(|c| c.active) {
            registry.register(Arc::new(JsonRpcConnection::new(chain, timeout)));
        }
        registry
    }

    pub fn register(&mut self, connection: Arc<dyn ChainConnection>) {
        let slug = connection.slug().to_string();
        match connection.kind() {
            ChainKind::Substrate => self.substrate.insert(slug, connection),
            ChainKind::Evm => self.evm.insert(slug, connection),
        };
    }

    pub fn substrate(&self) -> impl Iterator<Item = &Arc<dyn ChainConnection>> {
        self.substrate.values()
    }

    pub fn evm(&self) -> impl Iterator<Item = &Arc<dyn ChainConnection>> {
        self.evm.values()
    }

    pub fn len(&self) -> usize {
        self.substrate.len() + self.evm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
