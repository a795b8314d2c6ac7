//! Decipher engine contract

use crate::error::EngineError;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Capability that turns obfuscated signatures and n-tokens into cleartext
#[async_trait::async_trait]
pub trait DecipherEngine: Send + Sync {
    /// Decode the `s` field of a signature cipher
    async fn decode_signature(&self, cipher_text: &str) -> Result<String, EngineError>;

    /// Decode the rotating `n` query parameter
    async fn decode_token(&self, token: &str) -> Result<String, EngineError>;
}

#[async_trait::async_trait]
impl<T: DecipherEngine + ?Sized> DecipherEngine for Arc<T> {
    async fn decode_signature(&self, cipher_text: &str) -> Result<String, EngineError> {
        (**self).decode_signature(cipher_text).await
    }

    async fn decode_token(&self, token: &str) -> Result<String, EngineError> {
        (**self).decode_token(token).await
    }
}

/// Engine slot that reports `NotReady` until a real engine is installed.
///
/// Lets rendering start before the engine has finished loading; resolvers
/// that hit the slot early simply retry. If loading fails, [`fail`] turns
/// every later call into a permanent `Unavailable` error.
///
/// [`fail`]: DeferredEngine::fail
#[derive(Default)]
pub struct DeferredEngine {
    slot: OnceCell<Result<Arc<dyn DecipherEngine>, String>>,
}

impl DeferredEngine {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the engine; returns it back if the slot was already settled
    pub fn install(&self, engine: Arc<dyn DecipherEngine>) -> Result<(), Arc<dyn DecipherEngine>> {
        if self.slot.set(Ok(engine.clone())).is_err() {
            return Err(engine);
        }
        info!("Decipher engine installed");
        Ok(())
    }

    /// Mark the engine as permanently unavailable; false if the slot was already settled
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        warn!("Decipher engine unavailable: {}", reason);
        self.slot.set(Err(reason)).is_ok()
    }

    /// Check if a working engine has been installed
    pub fn is_ready(&self) -> bool {
        matches!(self.slot.get(), Some(Ok(_)))
    }

    /// Check if loading the engine failed
    pub fn is_failed(&self) -> bool {
        matches!(self.slot.get(), Some(Err(_)))
    }

    fn engine(&self) -> Result<&Arc<dyn DecipherEngine>, EngineError> {
        match self.slot.get() {
            Some(Ok(engine)) => Ok(engine),
            Some(Err(reason)) => Err(EngineError::Unavailable(reason.clone())),
            None => {
                debug!("Decipher engine requested before it was installed");
                Err(EngineError::NotReady("decipher engine is still loading".to_string()))
            }
        }
    }
}

#[async_trait::async_trait]
impl DecipherEngine for DeferredEngine {
    async fn decode_signature(&self, cipher_text: &str) -> Result<String, EngineError> {
        self.engine()?.decode_signature(cipher_text).await
    }

    async fn decode_token(&self, token: &str) -> Result<String, EngineError> {
        self.engine()?.decode_token(token).await
    }
}
