//! Write engine
//!
//! Appends entries as one atomic store pipeline per call, requesting the
//! configured length trim with every write.

use bytes::Bytes;
use tidelog_core::{AppendRequest, Metadata, Position, SharedStore, WritePosition};
use tracing::{debug, instrument};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// Batched appender over a shared store
#[derive(Clone)]
pub struct WriteEngine {
    store: SharedStore,
    config: EngineConfig,
}

impl std::fmt::Debug for WriteEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl WriteEngine {
    /// Create a writer over the given store
    pub fn new(store: SharedStore, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Get the engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Append one entry and return its position
    pub async fn append(
        &self,
        log: &str,
        payload: impl Into<Bytes>,
        position: WritePosition,
        metadata: Metadata,
    ) -> EngineResult<Position> {
        let request = AppendRequest::new(log, payload)
            .at(position)
            .with_metadata(metadata);
        let mut positions = self.append_batch(&[request]).await?;
        positions.pop().ok_or(EngineError::ResultCountMismatch {
            expected: 1,
            actual: 0,
        })
    }

    /// Append every request atomically, returning one position per request
    #[instrument(skip(self, requests), fields(entries = requests.len()))]
    pub async fn append_batch(&self, requests: &[AppendRequest]) -> EngineResult<Vec<Position>> {
        if let Some(request) = requests.iter().find(|r| r.log.is_empty()) {
            return Err(tidelog_core::StoreError::UnknownLog(request.log.clone()).into());
        }

        let positions = self
            .store
            .append_batch(requests, self.config.trim_policy())
            .await?;
        if positions.len() != requests.len() {
            return Err(EngineError::ResultCountMismatch {
                expected: requests.len(),
                actual: positions.len(),
            });
        }

        debug!(entries = positions.len(), "Appended batch");
        Ok(positions)
    }
}
