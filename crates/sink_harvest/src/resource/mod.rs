//! Sink resource backends.
//!
//! Every backend exposes the same capability set: a non-blocking existence probe, a bounded
//! wait for creation and an incremental `read` that returns only the bytes that arrived since
//! the previous call. The binding layer picks a backend through a [`ResourceFactory`].

mod file;
mod memory;
mod socket;

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::clock::Clock;
use crate::config::{HarvestConfig, PollSettings};
use crate::error::HarvestError;
use crate::identifier::SinkIdentifier;
use crate::retry::{BoundedRetry, RetryStep};

pub use file::{FileResource, FileResourceFactory};
pub use memory::{MemoryResource, MemorySink, MemorySinkRegistry};
pub use socket::{SocketResource, SocketResourceFactory};

/// Lifecycle of a resource handle.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum HandleState {
    /// Existence not confirmed yet.
    Unbound,
    /// The resource exists; nothing has been read.
    Created,
    /// At least one read succeeded.
    Readable,
}

pub trait SinkResource: Send {
    fn identifier(&self) -> &SinkIdentifier;

    fn state(&self) -> HandleState;

    /// Non-blocking existence probe.
    fn exists(&mut self) -> bool;

    /// Polls [`exists`](Self::exists) until it reports `true` or `timeout` elapses.
    ///
    /// Returns immediately once the handle has left [`HandleState::Unbound`].
    fn wait_for_creation(&mut self, timeout: Duration) -> Result<(), HarvestError>;

    /// Returns the bytes appended since the previous call, possibly none.
    ///
    /// Fails with [`HarvestError::ResourceUnavailable`] when the resource was removed, replaced
    /// or truncated behind the read cursor.
    fn read(&mut self) -> Result<Vec<u8>, HarvestError>;
}

pub trait ResourceFactory: Send + Sync {
    fn open(
        &self,
        identifier: &SinkIdentifier,
        config: &HarvestConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Box<dyn SinkResource>, HarvestError>;
}

impl<F> ResourceFactory for F
where
    F: Fn(&SinkIdentifier, &HarvestConfig, Arc<dyn Clock>) -> Result<Box<dyn SinkResource>, HarvestError>
        + Send
        + Sync,
{
    fn open(
        &self,
        identifier: &SinkIdentifier,
        config: &HarvestConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Box<dyn SinkResource>, HarvestError> {
        self(identifier, config, clock)
    }
}

/// Shared creation wait used by the backends.
pub(crate) fn poll_for_creation(
    clock: &dyn Clock,
    identifier: &SinkIdentifier,
    settings: PollSettings,
    mut probe: impl FnMut() -> bool,
) -> Result<(), HarvestError> {
    debug!(
        identifier = %identifier,
        timeout = ?settings.timeout,
        "waiting for sink resource creation"
    );
    let mut retry = BoundedRetry::new(clock, settings);
    while retry.step() == RetryStep::Attempt {
        if probe() {
            debug!(
                identifier = %identifier,
                attempts = retry.attempts(),
                elapsed = ?retry.elapsed(),
                "sink resource exists"
            );
            return Ok(());
        }
    }
    Err(HarvestError::ResourceNotFound {
        identifier: identifier.clone(),
        waited: retry.elapsed(),
    })
}
