//! Shared test doubles and helpers
//!
//! - Scripted stream and datagram primitives that record every OS call
//! - Condition-based waiting for non-blocking sockets (no hardcoded sleeps)

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use wirepack_transport::{DatagramIo, StreamIo};

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Route transport logs to the test output, honouring RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Stream Double
// ============================================================================

/// Stream primitive that records writes and replays scripted results
///
/// Each scripted send result caps how many bytes the call accepts. Once the
/// script runs out every send accepts everything.
#[derive(Default)]
pub struct MockStream {
    pub send_script: VecDeque<io::Result<usize>>,
    pub recv_script: VecDeque<io::Result<Vec<u8>>>,
    /// Bytes passed to each send call, whether accepted or not
    pub send_calls: Vec<Vec<u8>>,
    /// Bytes actually accepted, in order
    pub written: Vec<u8>,
}

impl MockStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(mut self, n: usize) -> Self {
        self.send_script.push_back(Ok(n));
        self
    }

    pub fn fail_send(mut self, kind: io::ErrorKind) -> Self {
        self.send_script.push_back(Err(kind.into()));
        self
    }

    pub fn incoming(mut self, bytes: &[u8]) -> Self {
        self.recv_script.push_back(Ok(bytes.to_vec()));
        self
    }

    pub fn fail_recv(mut self, kind: io::ErrorKind) -> Self {
        self.recv_script.push_back(Err(kind.into()));
        self
    }
}

impl StreamIo for MockStream {
    fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        self.send_calls.push(data.to_vec());
        let accepted = match self.send_script.pop_front() {
            Some(Ok(n)) => n.min(data.len()),
            Some(Err(e)) => return Err(e),
            None => data.len(),
        };
        self.written.extend_from_slice(&data[..accepted]);
        Ok(accepted)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.recv_script.pop_front() {
            Some(Ok(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    self.recv_script.push_front(Ok(bytes.split_off(n)));
                }
                Ok(n)
            }
            Some(Err(e)) => Err(e),
            None => Ok(0),
        }
    }
}

// ============================================================================
// Datagram Double
// ============================================================================

/// Datagram primitive that records sends and replays scripted arrivals
#[derive(Default)]
pub struct MockDatagram {
    pub sent: Vec<(Vec<u8>, SocketAddr)>,
    /// Fail the send with this index (0-based) and every one after it
    pub fail_from: Option<usize>,
    pub inbound: VecDeque<io::Result<(Vec<u8>, SocketAddr)>>,
}

impl MockDatagram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arrive(mut self, bytes: &[u8], from: SocketAddr) -> Self {
        self.inbound.push_back(Ok((bytes.to_vec(), from)));
        self
    }

    pub fn fail_recv(mut self, kind: io::ErrorKind) -> Self {
        self.inbound.push_back(Err(kind.into()));
        self
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.sent.iter().map(|(bytes, _)| bytes.len()).collect()
    }
}

impl DatagramIo for MockDatagram {
    fn send_to(&mut self, data: &[u8], target: SocketAddr) -> io::Result<usize> {
        if self.fail_from.is_some_and(|from| self.sent.len() >= from) {
            return Err(io::ErrorKind::PermissionDenied.into());
        }
        self.sent.push((data.to_vec(), target));
        Ok(data.len())
    }

    fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        match self.inbound.pop_front() {
            Some(Ok((bytes, from))) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok((n, from))
            }
            Some(Err(e)) => Err(e),
            None => Err(io::ErrorKind::WouldBlock.into()),
        }
    }
}

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Retry `op` until it stops reporting `NotReady`, or the timeout passes
pub fn retry_until_ready<T>(
    mut op: impl FnMut() -> wirepack_transport::Result<T>,
) -> wirepack_transport::Result<T> {
    let start = Instant::now();
    loop {
        match op() {
            Err(wirepack_transport::Error::NotReady) if start.elapsed() < DEFAULT_TIMEOUT => {
                std::thread::sleep(Duration::from_millis(1));
            }
            other => return other,
        }
    }
}
