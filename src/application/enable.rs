//! Wallet enablement across the substrate and EVM capabilities

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::shared::errors::EnableError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Substrate,
    Evm,
}

impl Capability {
    fn other(&self) -> Capability {
        match self {
            Capability::Substrate => Capability::Evm,
            Capability::Evm => Capability::Substrate,
        }
    }
}

/// Tracks per-capability enable failures. A single failed capability is
/// kept as state only; the error surfaces once both have failed.
pub struct EnableTracker {
    enabled: watch::Sender<bool>,
    successes: Mutex<usize>,
    errors: Mutex<HashMap<Capability, String>>,
}

impl Default for EnableTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl EnableTracker {
    pub fn new() -> Self {
        let (enabled, _) = watch::channel(false);
        Self {
            enabled,
            successes: Mutex::new(0),
            errors: Mutex::new(HashMap::new()),
        }
    }

    pub fn subscribe_enabled(&self) -> watch::Receiver<bool> {
        self.enabled.subscribe()
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    pub fn successes(&self) -> usize {
        *self.successes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn error(&self, capability: Capability) -> Option<String> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&capability)
            .cloned()
    }

    /// Returns the success count so far
    pub fn record_success(&self, capability: Capability) -> usize {
        let count = {
            let mut successes = self.successes.lock().unwrap_or_else(PoisonError::into_inner);
            *successes += 1;
            *successes
        };
        self.enabled.send_replace(true);
        info!("✅ {:?} enabled", capability);
        count
    }

    pub fn record_failure(&self, capability: Capability, error: impl std::fmt::Display) -> Result<(), EnableError> {
        let mut errors = self.errors.lock().unwrap_or_else(PoisonError::into_inner);
        errors.insert(capability, error.to_string());
        warn!("⚠️ Failed to enable {:?}: {}", capability, error);

        if !errors.contains_key(&capability.other()) {
            return Ok(());
        }

        let take = |c: Capability| errors.get(&c).cloned().unwrap_or_default();
        Err(EnableError {
            substrate: take(Capability::Substrate),
            evm: take(Capability::Evm),
        })
    }

    /// Run both enable attempts concurrently. Succeeds when at least one does.
    pub async fn enable<S, E>(&self, substrate: S, evm: E) -> Result<usize, EnableError>
    where
        S: Future<Output = anyhow::Result<()>>,
        E: Future<Output = anyhow::Result<()>>,
    {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner).clear();
        *self.successes.lock().unwrap_or_else(PoisonError::into_inner) = 0;

        let (substrate, evm) = tokio::join!(substrate, evm);

        let mut outcome = Ok(());
        for (capability, result) in [(Capability::Substrate, substrate), (Capability::Evm, evm)] {
            match result {
                Ok(()) => {
                    self.record_success(capability);
                }
                Err(e) => outcome = self.record_failure(capability, e),
            }
        }

        outcome.map(|_| self.successes())
    }

    pub fn disable(&self) {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner).clear();
        *self.successes.lock().unwrap_or_else(PoisonError::into_inner) = 0;
        self.enabled.send_replace(false);
    }
}
