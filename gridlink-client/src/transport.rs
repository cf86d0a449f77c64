//! Byte-stream transports.
//!
//! The session talks to the backend through the [`Transport`] trait. A
//! transport call that transfers zero bytes or fails is fatal to the framer;
//! transports must not report transient conditions as errors they expect to
//! be retried.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// A blocking, connection-oriented byte stream.
pub trait Transport {
    /// Opens the connection to `host:port`.
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()>;

    /// Writes a prefix of `buf`, returning the number of bytes written.
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Reads into a prefix of `buf`, returning the number of bytes read.
    /// `Ok(0)` means the peer closed the stream.
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Closes the connection. Must be safe to call repeatedly.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Bounds the time `connect` may take. Ignored by transports without
    /// a notion of connect time.
    fn set_connect_timeout(&mut self, _timeout: Option<Duration>) {}
}

/// TCP transport over a blocking [`TcpStream`].
#[derive(Debug, Default)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    connect_timeout: Option<Duration>,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds the time spent establishing the TCP connection.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn open(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        let Some(timeout) = self.connect_timeout else {
            return TcpStream::connect((host, port));
        };

        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no addresses resolved for {}:{}", host, port),
            )
        }))
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        self.close();

        let stream = self.open(host, port)?;
        stream.set_nodelay(true).ok();

        tracing::debug!("TCP connected to {}:{}", host, port);
        self.stream = Some(stream);
        Ok(())
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        let stream = self.stream.as_mut().ok_or(io::ErrorKind::NotConnected)?;
        loop {
            match stream.write(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let stream = self.stream.as_mut().ok_or(io::ErrorKind::NotConnected)?;
        loop {
            match stream.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            tracing::debug!("Closing TCP connection");
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn set_connect_timeout(&mut self, timeout: Option<Duration>) {
        self.connect_timeout = timeout;
    }
}

/// In-memory transport.
///
/// Bytes queued with [`push_inbound`](Self::push_inbound) are handed out by
/// `receive`; bytes passed to `send` are recorded in
/// [`sent`](Self::sent). In loopback mode sent bytes are also queued for
/// receiving. Transfers can be limited to small chunks and failures can be
/// injected to exercise partial I/O.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    inbound: VecDeque<u8>,
    sent: Vec<u8>,
    open: bool,
    loopback: bool,
    refuse_connect: bool,
    max_chunk: Option<usize>,
    send_budget: Option<usize>,
    connect_timeout: Option<Duration>,
    connect_calls: usize,
    send_calls: usize,
    receive_calls: usize,
    close_calls: usize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport whose sent bytes come back on `receive`.
    pub fn loopback() -> Self {
        Self {
            loopback: true,
            ..Self::default()
        }
    }

    /// Limits every `send`/`receive` call to at most `max` bytes.
    pub fn with_max_chunk(mut self, max: usize) -> Self {
        self.max_chunk = Some(max.max(1));
        self
    }

    /// Makes `connect` fail with `ConnectionRefused`.
    pub fn refusing_connections(mut self) -> Self {
        self.refuse_connect = true;
        self
    }

    /// Accepts only `bytes` more bytes; `send` returns `Ok(0)` afterwards.
    pub fn with_send_budget(mut self, bytes: usize) -> Self {
        self.send_budget = Some(bytes);
        self
    }

    /// Queues bytes to be returned by `receive`.
    pub fn push_inbound(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes);
    }

    /// Bytes accepted by `send` so far.
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    /// Forgets the bytes recorded by `send`.
    pub fn clear_sent(&mut self) {
        self.sent.clear();
    }

    /// Number of queued bytes not yet received.
    pub fn pending_inbound(&self) -> usize {
        self.inbound.len()
    }

    /// Timeout last passed to `set_connect_timeout`.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls
    }

    pub fn send_calls(&self) -> usize {
        self.send_calls
    }

    pub fn receive_calls(&self) -> usize {
        self.receive_calls
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls
    }

    fn chunk(&self, requested: usize) -> usize {
        match self.max_chunk {
            Some(max) => requested.min(max),
            None => requested,
        }
    }
}

impl Transport for MemoryTransport {
    fn connect(&mut self, _host: &str, _port: u16) -> io::Result<()> {
        self.connect_calls += 1;
        if self.refuse_connect {
            return Err(io::ErrorKind::ConnectionRefused.into());
        }
        self.open = true;
        Ok(())
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send_calls += 1;
        if !self.open {
            return Err(io::ErrorKind::NotConnected.into());
        }

        let mut n = self.chunk(buf.len());
        if let Some(budget) = self.send_budget.as_mut() {
            n = n.min(*budget);
            *budget -= n;
        }

        self.sent.extend_from_slice(&buf[..n]);
        if self.loopback {
            self.inbound.extend(&buf[..n]);
        }
        Ok(n)
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.receive_calls += 1;
        if !self.open {
            return Err(io::ErrorKind::NotConnected.into());
        }

        let n = self.chunk(buf.len()).min(self.inbound.len());
        for (dst, src) in buf.iter_mut().zip(self.inbound.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn close(&mut self) {
        self.close_calls += 1;
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn set_connect_timeout(&mut self, timeout: Option<Duration>) {
        self.connect_timeout = timeout;
    }
}
