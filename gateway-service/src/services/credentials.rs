//! Upstream API credential pool.
//!
//! Rotation is pure load spreading over equivalent keys; there is no
//! per-credential health tracking or failover.

use super::completion::ProviderError;
use rand::Rng;
use std::sync::Arc;

/// An immutable, process-wide set of upstream bearer credentials.
#[derive(Clone)]
pub struct CredentialPool {
    keys: Arc<Vec<String>>,
}

impl CredentialPool {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys: Arc::new(keys),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Pick one credential uniformly at random.
    ///
    /// An empty pool errors here, before any upstream call is attempted.
    /// Startup configuration validation normally rules this out.
    pub fn select(&self) -> Result<&str, ProviderError> {
        if self.keys.is_empty() {
            return Err(ProviderError::NoCredentials);
        }
        let idx = rand::thread_rng().gen_range(0..self.keys.len());
        Ok(&self.keys[idx])
    }
}
