use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use crate::clock::Clock;
use crate::config::{HarvestConfig, PollSettings};
use crate::error::HarvestError;
use crate::record::Record;
use crate::resource::SinkResource;
use crate::retry::{BoundedRetry, RetryStep};
use crate::splitter::{CarryFragment, LineSplitter};

/// Buffers records read from one sink resource and hands them out in exact counts.
///
/// All reads happen synchronously inside [`pop_messages`](Self::pop_messages) or
/// [`fill`](Self::fill); nothing reads in the background. Taking `&mut self` keeps a single
/// caller in charge of the read cursor and the buffer.
pub struct MessageReader {
    resource: Box<dyn SinkResource>,
    splitter: LineSplitter,
    carry: CarryFragment,
    buffer: VecDeque<Record>,
    line_number: usize,
    clock: Arc<dyn Clock>,
    pop: PollSettings,
}

impl MessageReader {
    pub fn new(
        resource: Box<dyn SinkResource>,
        config: &HarvestConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            resource,
            splitter: LineSplitter::new(config.splitter),
            carry: CarryFragment::new(),
            buffer: VecDeque::new(),
            line_number: 0,
            clock,
            pop: config.pop,
        }
    }

    /// Runs one read/split cycle and returns how many records were appended.
    pub fn fill(&mut self) -> Result<usize, HarvestError> {
        let chunk = self.resource.read()?;
        if chunk.is_empty() {
            return Ok(0);
        }
        let carry = std::mem::take(&mut self.carry);
        let (records, carry) = self.splitter.split(&chunk, carry);
        self.carry = carry;

        let appended = records.len();
        for bytes in records {
            self.line_number += 1;
            self.buffer.push_back(Record::decode(self.line_number, bytes));
        }
        Ok(appended)
    }

    /// Blocks until `count` records are buffered and returns them oldest first.
    ///
    /// On timeout nothing is consumed: the error carries a copy of what was buffered and a
    /// later call continues from the same cursor, carry and buffer.
    pub fn pop_messages(&mut self, count: usize) -> Result<Vec<Record>, HarvestError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.pop_with(count, |buffer| {
            (buffer.len() >= count).then(|| buffer.drain(..count).collect())
        })
    }

    /// Blocks until one record is buffered and returns it.
    pub fn pop_message(&mut self) -> Result<Record, HarvestError> {
        self.pop_with(1, VecDeque::pop_front)
    }

    fn pop_with<T>(
        &mut self,
        count: usize,
        mut take: impl FnMut(&mut VecDeque<Record>) -> Option<T>,
    ) -> Result<T, HarvestError> {
        let clock = Arc::clone(&self.clock);
        let mut retry = BoundedRetry::new(clock.as_ref(), self.pop);
        while retry.step() == RetryStep::Attempt {
            self.fill()?;
            if let Some(taken) = take(&mut self.buffer) {
                debug!(
                    identifier = %self.resource.identifier(),
                    count,
                    attempts = retry.attempts(),
                    "popped records"
                );
                return Ok(taken);
            }
        }

        let buffered: Vec<String> = self.buffer.iter().map(|r| r.text.clone()).collect();
        debug!(
            identifier = %self.resource.identifier(),
            requested = count,
            buffered = buffered.len(),
            pending_fragment_bytes = self.carry.len(),
            "timed out waiting for records"
        );
        Err(HarvestError::Timeout {
            identifier: self.resource.identifier().clone(),
            requested: count,
            buffered,
            waited: retry.elapsed(),
        })
    }

    pub fn buffered(&self) -> impl ExactSizeIterator<Item = &Record> {
        self.buffer.iter()
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes seen after the last terminator.
    pub fn pending_fragment(&self) -> &[u8] {
        self.carry.as_bytes()
    }

    pub fn resource(&self) -> &dyn SinkResource {
        self.resource.as_ref()
    }

    pub(crate) fn resource_mut(&mut self) -> &mut dyn SinkResource {
        self.resource.as_mut()
    }

    pub fn into_resource(self) -> Box<dyn SinkResource> {
        self.resource
    }
}
