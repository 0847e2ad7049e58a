use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::clock::Clock;
use crate::config::{HarvestConfig, PollSettings};
use crate::error::HarvestError;
use crate::identifier::SinkIdentifier;
use crate::resource::{poll_for_creation, HandleState, ResourceFactory, SinkResource};

#[derive(Debug, Default)]
struct MemoryState {
    created: bool,
    generation: u64,
    data: Vec<u8>,
}

/// Writer side of an in-memory sink, shared with whoever plays the emitter.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the sink as existing. No-op when it already exists.
    pub fn create(&self) {
        let mut state = self.lock();
        if !state.created {
            state.created = true;
            state.generation += 1;
        }
    }

    /// Appends bytes, creating the sink first if needed.
    pub fn write(&self, bytes: impl AsRef<[u8]>) {
        self.create();
        self.lock().data.extend_from_slice(bytes.as_ref());
    }

    pub fn remove(&self) {
        let mut state = self.lock();
        state.created = false;
        state.data.clear();
    }

    pub fn truncate(&self) {
        self.lock().data.clear();
    }

    pub fn exists(&self) -> bool {
        self.lock().created
    }

    pub fn contents(&self) -> Vec<u8> {
        self.lock().data.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct MemoryResource {
    identifier: SinkIdentifier,
    sink: MemorySink,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    state: HandleState,
    cursor: usize,
    generation: Option<u64>,
}

impl MemoryResource {
    pub fn new(
        identifier: SinkIdentifier,
        sink: MemorySink,
        config: &HarvestConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            identifier,
            sink,
            clock,
            poll_interval: config.creation.interval,
            state: HandleState::Unbound,
            cursor: 0,
            generation: None,
        }
    }
}

impl SinkResource for MemoryResource {
    fn identifier(&self) -> &SinkIdentifier {
        &self.identifier
    }

    fn state(&self) -> HandleState {
        self.state
    }

    fn exists(&mut self) -> bool {
        self.sink.exists()
    }

    fn wait_for_creation(&mut self, timeout: Duration) -> Result<(), HarvestError> {
        if self.state != HandleState::Unbound {
            return Ok(());
        }
        let settings = PollSettings::new(timeout, self.poll_interval);
        let sink = self.sink.clone();
        poll_for_creation(self.clock.as_ref(), &self.identifier, settings, || {
            sink.exists()
        })?;
        self.state = HandleState::Created;
        Ok(())
    }

    fn read(&mut self) -> Result<Vec<u8>, HarvestError> {
        let state = self.sink.lock();
        if !state.created {
            if self.state == HandleState::Unbound {
                return Ok(Vec::new());
            }
            return Err(HarvestError::unavailable(&self.identifier, "sink was removed"));
        }
        match self.generation {
            None => self.generation = Some(state.generation),
            Some(seen) if seen != state.generation => {
                return Err(HarvestError::unavailable(&self.identifier, "sink was recreated"));
            }
            Some(_) => {}
        }
        if state.data.len() < self.cursor {
            return Err(HarvestError::unavailable(&self.identifier, "sink was truncated"));
        }
        let out = state.data[self.cursor..].to_vec();
        self.cursor = state.data.len();
        self.state = HandleState::Readable;
        Ok(out)
    }
}

/// Named in-memory sinks; also the factory that binds identifiers to them.
#[derive(Debug, Clone, Default)]
pub struct MemorySinkRegistry {
    sinks: Arc<Mutex<HashMap<SinkIdentifier, MemorySink>>>,
}

impl MemorySinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the sink registered under `identifier`, registering a not-yet-created one.
    pub fn sink(&self, identifier: impl Into<SinkIdentifier>) -> MemorySink {
        let mut sinks = self.sinks.lock().unwrap_or_else(PoisonError::into_inner);
        sinks.entry(identifier.into()).or_default().clone()
    }
}

impl ResourceFactory for MemorySinkRegistry {
    fn open(
        &self,
        identifier: &SinkIdentifier,
        config: &HarvestConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Box<dyn SinkResource>, HarvestError> {
        let sink = self.sink(identifier.clone());
        Ok(Box::new(MemoryResource::new(
            identifier.clone(),
            sink,
            config,
            clock,
        )))
    }
}
