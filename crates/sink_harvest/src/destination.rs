use std::sync::Arc;

use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::config::HarvestConfig;
use crate::error::HarvestError;
use crate::identifier::SinkIdentifier;
use crate::message_reader::MessageReader;
use crate::record::Record;
use crate::resource::{ResourceFactory, SinkResource};

struct Bound {
    identifier: SinkIdentifier,
    /// Handle whose creation has not been confirmed yet.
    pending: Option<Box<dyn SinkResource>>,
    reader: Option<MessageReader>,
}

/// Lazily binds a sink identifier to a [`MessageReader`].
///
/// The handle is built on the first operation naming an identifier and kept across calls for
/// that identifier. Naming a different identifier discards the old handle together with its
/// buffered records and carry.
pub struct DestinationReader {
    factory: Arc<dyn ResourceFactory>,
    config: HarvestConfig,
    clock: Arc<dyn Clock>,
    bound: Option<Bound>,
}

impl DestinationReader {
    pub fn new(factory: Arc<dyn ResourceFactory>, config: HarvestConfig) -> Self {
        Self::with_clock(factory, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        factory: Arc<dyn ResourceFactory>,
        config: HarvestConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            factory,
            config,
            clock,
            bound: None,
        }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn bound_identifier(&self) -> Option<&SinkIdentifier> {
        self.bound.as_ref().map(|bound| &bound.identifier)
    }

    /// Binds `identifier`, replacing any handle bound to a different one.
    pub fn init_driver_io(&mut self, identifier: &SinkIdentifier) -> Result<(), HarvestError> {
        if self.bound_identifier() == Some(identifier) {
            return Ok(());
        }
        if let Some(previous) = self.bound.take() {
            debug!(
                previous = %previous.identifier,
                next = %identifier,
                "rebinding destination reader"
            );
        }
        let resource = self
            .factory
            .open(identifier, &self.config, Arc::clone(&self.clock))?;
        self.bound = Some(Bound {
            identifier: identifier.clone(),
            pending: Some(resource),
            reader: None,
        });
        Ok(())
    }

    /// Drops the current binding; the next operation builds a fresh handle.
    pub fn reset(&mut self) {
        self.bound = None;
    }

    /// Reader for `identifier`, waiting for the resource to appear on first use.
    pub fn message_reader(
        &mut self,
        identifier: &SinkIdentifier,
    ) -> Result<&mut MessageReader, HarvestError> {
        self.init_driver_io(identifier)?;
        let bound = self.bound.as_mut().ok_or(HarvestError::Unbound)?;
        if bound.reader.is_none() {
            let resource = bound.pending.as_mut().ok_or(HarvestError::Unbound)?;
            resource.wait_for_creation(self.config.creation.timeout)?;
            if let Some(resource) = bound.pending.take() {
                bound.reader = Some(MessageReader::new(
                    resource,
                    &self.config,
                    Arc::clone(&self.clock),
                ));
            }
        }
        bound.reader.as_mut().ok_or(HarvestError::Unbound)
    }

    pub fn read_logs(
        &mut self,
        identifier: &SinkIdentifier,
        counter: usize,
    ) -> Result<Vec<Record>, HarvestError> {
        let messages = self.message_reader(identifier)?.pop_messages(counter)?;
        info!(
            resource = %identifier,
            content = ?messages.iter().map(Record::as_str).collect::<Vec<_>>(),
            "content has been read"
        );
        Ok(messages)
    }

    pub fn read_log(&mut self, identifier: &SinkIdentifier) -> Result<Record, HarvestError> {
        let message = self.message_reader(identifier)?.pop_message()?;
        info!(resource = %identifier, content = message.as_str(), "content has been read");
        Ok(message)
    }

    /// Non-blocking existence check, for callers asserting that nothing was written.
    pub fn exists(&mut self, identifier: &SinkIdentifier) -> Result<bool, HarvestError> {
        self.init_driver_io(identifier)?;
        let Some(bound) = self.bound.as_mut() else {
            return Ok(false);
        };
        if let Some(reader) = bound.reader.as_mut() {
            return Ok(reader.resource_mut().exists());
        }
        Ok(bound
            .pending
            .as_mut()
            .map(|resource| resource.exists())
            .unwrap_or(false))
    }
}

/// A destination statement's view of its sink.
///
/// The first positional parameter names the sink. Without one, or without an IO backend, the
/// driver has nothing to read and every read fails with [`HarvestError::Unbound`].
pub struct DestinationDriver {
    positional_parameters: Vec<String>,
    destination_reader: Option<DestinationReader>,
}

impl DestinationDriver {
    pub const GROUP_TYPE: &'static str = "destination";

    pub fn new(positional_parameters: Vec<String>, reader: Option<DestinationReader>) -> Self {
        let destination_reader = if positional_parameters.is_empty() {
            None
        } else {
            reader
        };
        Self {
            positional_parameters,
            destination_reader,
        }
    }

    pub fn group_type(&self) -> &'static str {
        Self::GROUP_TYPE
    }

    pub fn positional_parameters(&self) -> &[String] {
        &self.positional_parameters
    }

    pub fn identifier(&self) -> Option<SinkIdentifier> {
        self.positional_parameters
            .first()
            .map(|raw| SinkIdentifier::from(raw.as_str()))
    }

    fn bound(&mut self) -> Result<(SinkIdentifier, &mut DestinationReader), HarvestError> {
        let identifier = self.identifier().ok_or(HarvestError::Unbound)?;
        let reader = self
            .destination_reader
            .as_mut()
            .ok_or(HarvestError::Unbound)?;
        Ok((identifier, reader))
    }

    pub fn read_log(&mut self) -> Result<Record, HarvestError> {
        let (identifier, reader) = self.bound()?;
        reader.read_log(&identifier)
    }

    pub fn read_logs(&mut self, counter: usize) -> Result<Vec<Record>, HarvestError> {
        let (identifier, reader) = self.bound()?;
        reader.read_logs(&identifier, counter)
    }

    pub fn exists(&mut self) -> Result<bool, HarvestError> {
        let (identifier, reader) = self.bound()?;
        reader.exists(&identifier)
    }
}
