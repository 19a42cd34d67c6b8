use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{EngineFactory, EngineHandle};
use crate::error::ConfigError;

/// Holds at most one live engine, keyed by (model, credential).
///
/// Callers receive an `Arc` snapshot, so a later swap never changes the
/// engine an in-flight turn is using. The slot itself is last-writer-wins.
pub struct EngineCache {
    factory: Arc<dyn EngineFactory>,
    slot: Mutex<Option<Arc<EngineHandle>>>,
    constructions: AtomicU64,
}

impl EngineCache {
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            factory,
            slot: Mutex::new(None),
            constructions: AtomicU64::new(0),
        }
    }

    /// Return the cached engine for this key, rebuilding when the key changed.
    ///
    /// A failed rebuild keeps serving the previous engine if there is one.
    pub async fn acquire(
        &self,
        model_name: &str,
        credential: Option<&str>,
    ) -> Result<Arc<EngineHandle>, ConfigError> {
        let credential = credential.ok_or(ConfigError::MissingCredential)?;

        let mut slot = self.slot.lock().await;
        if let Some(handle) = slot.as_ref() {
            if handle.matches(model_name, credential) {
                return Ok(handle.clone());
            }
        }

        tracing::info!(
            model = %model_name,
            replacing = slot.is_some(),
            "Initializing generation engine"
        );

        match self.factory.build(model_name, credential).await {
            Ok(bindings) => {
                let handle = Arc::new(EngineHandle::new(
                    model_name.to_string(),
                    credential.to_string(),
                    bindings,
                ));
                self.constructions.fetch_add(1, Ordering::Relaxed);
                *slot = Some(handle.clone());
                Ok(handle)
            }
            Err(e) => match slot.as_ref() {
                Some(previous) => {
                    tracing::warn!(
                        error = %format!("{:#}", e),
                        requested_model = %model_name,
                        serving_model = %previous.model_name(),
                        "Engine rebuild failed, keeping previous engine"
                    );
                    Ok(previous.clone())
                }
                None => {
                    tracing::error!(error = %format!("{:#}", e), "Engine initialization failed");
                    Err(ConfigError::EngineInit(format!("{:#}", e)))
                }
            },
        }
    }

    /// Drop the cached engine; the next `acquire` rebuilds.
    pub async fn invalidate(&self) {
        if self.slot.lock().await.take().is_some() {
            tracing::debug!("Engine cache invalidated");
        }
    }

    /// Currently cached engine, if any.
    pub async fn current(&self) -> Option<Arc<EngineHandle>> {
        self.slot.lock().await.clone()
    }

    /// Number of successful constructions since creation.
    pub fn constructions(&self) -> u64 {
        self.constructions.load(Ordering::Relaxed)
    }
}
