use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_READ_CHUNK_BYTES: usize = 8192;

/// Deadline and poll interval for one bounded wait.
///
/// Intervals below [`MIN_POLL_INTERVAL`](crate::MIN_POLL_INTERVAL) are raised to it; a timeout
/// of `Duration::MAX` waits without a deadline.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    #[serde(rename = "timeout_ms", with = "duration_millis")]
    pub timeout: Duration,
    #[serde(rename = "interval_ms", with = "duration_millis")]
    pub interval: Duration,
}

impl PollSettings {
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_millis(50))
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    pub terminator: u8,
    pub strip_carriage_return: bool,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            terminator: b'\n',
            strip_carriage_return: false,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Bounds `wait_for_creation`.
    pub creation: PollSettings,
    /// Bounds `pop_messages`.
    pub pop: PollSettings,
    pub splitter: SplitterConfig,
    pub read_chunk_bytes: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            creation: PollSettings::new(Duration::from_secs(10), Duration::from_millis(100)),
            pop: PollSettings::default(),
            splitter: SplitterConfig::default(),
            read_chunk_bytes: DEFAULT_READ_CHUNK_BYTES,
        }
    }
}

impl HarvestConfig {
    pub fn with_creation_timeout(mut self, timeout: Duration) -> Self {
        self.creation.timeout = timeout;
        self
    }

    pub fn with_creation_interval(mut self, interval: Duration) -> Self {
        self.creation.interval = interval;
        self
    }

    pub fn with_pop_timeout(mut self, timeout: Duration) -> Self {
        self.pop.timeout = timeout;
        self
    }

    pub fn with_pop_interval(mut self, interval: Duration) -> Self {
        self.pop.interval = interval;
        self
    }

    pub fn with_terminator(mut self, terminator: u8) -> Self {
        self.splitter.terminator = terminator;
        self
    }

    pub fn with_strip_carriage_return(mut self, strip: bool) -> Self {
        self.splitter.strip_carriage_return = strip;
        self
    }

    pub fn with_read_chunk_bytes(mut self, bytes: usize) -> Self {
        self.read_chunk_bytes = bytes.max(1);
        self
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
