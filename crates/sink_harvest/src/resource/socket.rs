use std::io::{ErrorKind, Read};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::{HarvestConfig, PollSettings};
use crate::error::HarvestError;
use crate::identifier::SinkIdentifier;
use crate::resource::{poll_for_creation, HandleState, ResourceFactory, SinkResource};

/// Listens on a TCP address and harvests whatever connected emitters send.
///
/// The resource "exists" once a peer has connected. Connections are drained one at a time in
/// accept order, so records from a later connection never interleave with an earlier one.
pub struct SocketResource {
    identifier: SinkIdentifier,
    listener: TcpListener,
    active: Option<TcpStream>,
    connected_once: bool,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    buffer: Vec<u8>,
    state: HandleState,
}

impl SocketResource {
    /// Binds a non-blocking listener on the address named by `identifier`.
    pub fn bind(
        identifier: SinkIdentifier,
        config: &HarvestConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, HarvestError> {
        let bind_err = |source| HarvestError::Bind {
            identifier: identifier.clone(),
            source,
        };
        let listener = TcpListener::bind(identifier.as_str()).map_err(bind_err)?;
        listener.set_nonblocking(true).map_err(bind_err)?;
        debug!(identifier = %identifier, "sink listener bound");
        Ok(Self {
            identifier,
            listener,
            active: None,
            connected_once: false,
            clock,
            poll_interval: config.creation.interval,
            buffer: vec![0u8; config.read_chunk_bytes.max(1)],
            state: HandleState::Unbound,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, HarvestError> {
        self.listener
            .local_addr()
            .map_err(|err| HarvestError::unavailable_io(&self.identifier, &err))
    }

    fn accept_next(&mut self) -> Result<bool, HarvestError> {
        if self.active.is_some() {
            return Ok(true);
        }
        match self.listener.accept() {
            Ok((stream, peer)) => {
                stream
                    .set_nonblocking(true)
                    .map_err(|err| HarvestError::unavailable_io(&self.identifier, &err))?;
                debug!(identifier = %self.identifier, %peer, "emitter connected");
                self.active = Some(stream);
                self.connected_once = true;
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(false),
            Err(err) => Err(HarvestError::unavailable_io(&self.identifier, &err)),
        }
    }
}

impl SinkResource for SocketResource {
    fn identifier(&self) -> &SinkIdentifier {
        &self.identifier
    }

    fn state(&self) -> HandleState {
        self.state
    }

    fn exists(&mut self) -> bool {
        if let Err(err) = self.accept_next() {
            warn!(identifier = %self.identifier, error = %err, "accepting emitter failed");
        }
        self.connected_once
    }

    fn wait_for_creation(&mut self, timeout: Duration) -> Result<(), HarvestError> {
        if self.state != HandleState::Unbound {
            return Ok(());
        }
        let settings = PollSettings::new(timeout, self.poll_interval);
        let clock = Arc::clone(&self.clock);
        let identifier = self.identifier.clone();
        poll_for_creation(clock.as_ref(), &identifier, settings, || self.exists())?;
        self.state = HandleState::Created;
        Ok(())
    }

    fn read(&mut self) -> Result<Vec<u8>, HarvestError> {
        let mut out = Vec::new();
        while self.accept_next()? {
            let Some(stream) = self.active.as_mut() else {
                break;
            };
            match stream.read(&mut self.buffer) {
                Ok(0) => {
                    debug!(identifier = %self.identifier, "emitter disconnected");
                    self.active = None;
                }
                Ok(n) => out.extend_from_slice(&self.buffer[..n]),
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.active = None;
                    return Err(HarvestError::unavailable_io(&self.identifier, &err));
                }
            }
        }
        if self.connected_once {
            self.state = HandleState::Readable;
        }
        Ok(out)
    }
}

/// Binds every identifier as a `host:port` listen address.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketResourceFactory;

impl ResourceFactory for SocketResourceFactory {
    fn open(
        &self,
        identifier: &SinkIdentifier,
        config: &HarvestConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Box<dyn SinkResource>, HarvestError> {
        Ok(Box::new(SocketResource::bind(
            identifier.clone(),
            config,
            clock,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::clock::SystemClock;

    fn bind() -> SocketResource {
        let config = HarvestConfig::default().with_creation_interval(Duration::from_millis(5));
        SocketResource::bind(
            SinkIdentifier::from("127.0.0.1:0"),
            &config,
            Arc::new(SystemClock),
        )
        .unwrap()
    }

    fn read_until(res: &mut SocketResource, expected: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for _ in 0..200 {
            out.extend(res.read().unwrap());
            if out.len() >= expected.len() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        out
    }

    #[test]
    fn exists_only_after_a_peer_connects() {
        let mut res = bind();
        assert!(!res.exists());
        assert!(res.read().unwrap().is_empty());

        let addr = res.local_addr().unwrap();
        let _peer = TcpStream::connect(addr).unwrap();
        res.wait_for_creation(Duration::from_secs(2)).unwrap();
        assert_eq!(res.state(), HandleState::Created);
    }

    #[test]
    fn existence_sticks_after_the_peer_leaves() {
        let mut res = bind();
        let addr = res.local_addr().unwrap();
        drop(TcpStream::connect(addr).unwrap());
        res.wait_for_creation(Duration::from_secs(2)).unwrap();
        for _ in 0..3 {
            assert!(res.exists());
        }
    }

    #[test]
    fn drains_connections_in_accept_order() {
        let mut res = bind();
        let addr = res.local_addr().unwrap();

        let mut first = TcpStream::connect(addr).unwrap();
        res.wait_for_creation(Duration::from_secs(2)).unwrap();
        first.write_all(b"one\ntw").unwrap();
        first.write_all(b"o\n").unwrap();
        drop(first);

        let mut second = TcpStream::connect(addr).unwrap();
        second.write_all(b"three\n").unwrap();
        drop(second);

        let expected = b"one\ntwo\nthree\n";
        assert_eq!(read_until(&mut res, expected), expected);
    }

    #[test]
    fn bind_failure_is_reported() {
        let err = SocketResource::bind(
            SinkIdentifier::from("not an address"),
            &HarvestConfig::default(),
            Arc::new(SystemClock),
        )
        .err()
        .unwrap();
        assert!(matches!(err, HarvestError::Bind { .. }));
    }
}
