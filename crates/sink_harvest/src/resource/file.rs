use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::{HarvestConfig, PollSettings};
use crate::error::HarvestError;
use crate::identifier::SinkIdentifier;
use crate::resource::{poll_for_creation, HandleState, ResourceFactory, SinkResource};

/// Tails a file or named pipe from the start, remembering the byte offset between reads.
///
/// On unix the path is opened with `O_NONBLOCK`, so neither opening a pipe without a writer nor
/// reading a pipe with an idle writer blocks; both simply yield no new bytes.
pub struct FileResource {
    identifier: SinkIdentifier,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    buffer: Vec<u8>,
    state: HandleState,
    file: Option<File>,
    offset: u64,
    identity: Option<FileIdentity>,
    regular: bool,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    fn of(metadata: &std::fs::Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    fn of(_metadata: &std::fs::Metadata) -> Option<Self> {
        None
    }
}

impl FileResource {
    pub fn new(identifier: SinkIdentifier, config: &HarvestConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            identifier,
            clock,
            poll_interval: config.creation.interval,
            buffer: vec![0u8; config.read_chunk_bytes.max(1)],
            state: HandleState::Unbound,
            file: None,
            offset: 0,
            identity: None,
            regular: true,
        }
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn open(&mut self) -> Result<bool, HarvestError> {
        if self.file.is_some() {
            return Ok(true);
        }
        match open_nonblocking(self.identifier.as_path()) {
            Ok(file) => {
                let metadata = file
                    .metadata()
                    .map_err(|err| HarvestError::unavailable_io(&self.identifier, &err))?;
                self.identity = FileIdentity::of(&metadata);
                self.regular = metadata.is_file();
                self.file = Some(file);
                if self.state == HandleState::Unbound {
                    self.state = HandleState::Created;
                }
                debug!(
                    identifier = %self.identifier,
                    regular = self.regular,
                    "opened sink file"
                );
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound && self.state == HandleState::Unbound => {
                Ok(false)
            }
            Err(err) => Err(HarvestError::unavailable_io(&self.identifier, &err)),
        }
    }

    /// Detects deletion, replacement and truncation of the tailed file.
    fn check_still_same(&self, file: &File) -> Result<(), HarvestError> {
        let on_disk = match std::fs::metadata(self.identifier.as_path()) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(identifier = %self.identifier, "sink file was deleted");
                return Err(HarvestError::unavailable(&self.identifier, "file was deleted"));
            }
            Err(err) => return Err(HarvestError::unavailable_io(&self.identifier, &err)),
        };
        if let (Some(opened), Some(current)) = (self.identity, FileIdentity::of(&on_disk)) {
            if opened != current {
                warn!(identifier = %self.identifier, "sink file was rotated");
                return Err(HarvestError::unavailable(&self.identifier, "file was replaced"));
            }
        }
        // Pipes report no meaningful length.
        if !self.regular {
            return Ok(());
        }
        let len = file
            .metadata()
            .map_err(|err| HarvestError::unavailable_io(&self.identifier, &err))?
            .len();
        if len < self.offset {
            warn!(
                identifier = %self.identifier,
                len,
                offset = self.offset,
                "sink file was truncated"
            );
            return Err(HarvestError::unavailable(
                &self.identifier,
                format!("file truncated to {len} bytes below read offset {}", self.offset),
            ));
        }
        Ok(())
    }
}

impl SinkResource for FileResource {
    fn identifier(&self) -> &SinkIdentifier {
        &self.identifier
    }

    fn state(&self) -> HandleState {
        self.state
    }

    fn exists(&mut self) -> bool {
        self.identifier.as_path().exists()
    }

    fn wait_for_creation(&mut self, timeout: Duration) -> Result<(), HarvestError> {
        if self.state != HandleState::Unbound {
            return Ok(());
        }
        let settings = PollSettings::new(timeout, self.poll_interval);
        let path = self.identifier.as_path().to_path_buf();
        poll_for_creation(self.clock.as_ref(), &self.identifier, settings, || {
            path.exists()
        })?;
        self.state = HandleState::Created;
        Ok(())
    }

    fn read(&mut self) -> Result<Vec<u8>, HarvestError> {
        if !self.open()? {
            return Ok(Vec::new());
        }
        let Some(mut file) = self.file.take() else {
            return Ok(Vec::new());
        };
        if let Err(err) = self.check_still_same(&file) {
            self.file = Some(file);
            return Err(err);
        }

        let mut out = Vec::new();
        let result = loop {
            match file.read(&mut self.buffer) {
                Ok(0) => break Ok(()),
                Ok(n) => out.extend_from_slice(&self.buffer[..n]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(err) => break Err(HarvestError::unavailable_io(&self.identifier, &err)),
            }
        };
        self.file = Some(file);
        result?;

        self.offset += out.len() as u64;
        self.state = HandleState::Readable;
        Ok(out)
    }
}

#[cfg(unix)]
fn open_nonblocking(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    use nix::fcntl::OFlag;

    OpenOptions::new()
        .read(true)
        .custom_flags(OFlag::O_NONBLOCK.bits())
        .open(path)
}

#[cfg(not(unix))]
fn open_nonblocking(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().read(true).open(path)
}

/// Opens every identifier as a file path.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileResourceFactory;

impl ResourceFactory for FileResourceFactory {
    fn open(
        &self,
        identifier: &SinkIdentifier,
        config: &HarvestConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Box<dyn SinkResource>, HarvestError> {
        Ok(Box::new(FileResource::new(identifier.clone(), config, clock)))
    }
}
