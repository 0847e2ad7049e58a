use std::sync::Arc;

use tokio::sync::Mutex;

use crate::destination::DestinationReader;
use crate::error::HarvestError;
use crate::identifier::SinkIdentifier;
use crate::record::Record;

/// A [`DestinationReader`] shared between async tasks.
///
/// The mutex is held for the whole pop, and the blocking poll loop runs on the blocking pool
/// so the runtime's worker threads stay free.
#[derive(Clone)]
pub struct SharedDestinationReader {
    inner: Arc<Mutex<DestinationReader>>,
}

impl SharedDestinationReader {
    pub fn new(reader: DestinationReader) -> Self {
        Self {
            inner: Arc::new(Mutex::new(reader)),
        }
    }

    pub async fn read_logs(
        &self,
        identifier: SinkIdentifier,
        counter: usize,
    ) -> Result<Vec<Record>, HarvestError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.blocking_lock().read_logs(&identifier, counter))
            .await
            .map_err(|err| HarvestError::Join(err.to_string()))?
    }

    pub async fn read_log(&self, identifier: SinkIdentifier) -> Result<Record, HarvestError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.blocking_lock().read_log(&identifier))
            .await
            .map_err(|err| HarvestError::Join(err.to_string()))?
    }

    pub async fn exists(&self, identifier: SinkIdentifier) -> Result<bool, HarvestError> {
        self.inner.lock().await.exists(&identifier)
    }

    pub async fn reset(&self) {
        self.inner.lock().await.reset();
    }
}
