#![forbid(unsafe_code)]
//! Poll-based harvesting of line-delimited records written by an external emitter.
//!
//! The emitter writes to a sink (file, socket, ...) on its own schedule. This crate:
//! - waits for the sink to appear, bounded by a timeout;
//! - reads newly appended bytes on every poll and splits them into records, carrying partial
//!   lines over to the next read;
//! - hands out exactly `n` records per request, or fails with a timeout that leaves the
//!   buffered records in place for a retry.
//!
//! Time is injected through [`Clock`], so every bounded wait can be driven deterministically
//! with [`ManualClock`].

mod clock;
mod config;
mod destination;
mod error;
mod identifier;
mod message_reader;
mod record;
mod resource;
mod retry;
mod splitter;

#[cfg(feature = "tokio")]
mod shared;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{HarvestConfig, PollSettings, SplitterConfig, DEFAULT_READ_CHUNK_BYTES};
pub use destination::{DestinationDriver, DestinationReader};
pub use error::HarvestError;
pub use identifier::SinkIdentifier;
pub use message_reader::MessageReader;
pub use record::Record;
pub use resource::{
    FileResource, FileResourceFactory, HandleState, MemoryResource, MemorySink,
    MemorySinkRegistry, ResourceFactory, SinkResource, SocketResource, SocketResourceFactory,
};
pub use retry::{BoundedRetry, RetryStep, MIN_POLL_INTERVAL};
pub use splitter::{CarryFragment, LineSplitter};

#[cfg(feature = "tokio")]
pub use shared::SharedDestinationReader;
