//! # Connection Management
//!
//! Purpose: Own the single agent connection, hide TCP/Unix stream
//! differences, and recover from broken connections by failing over across
//! the endpoint registry.
//!
//! ## Design Principles
//! 1. **Explicit Outcomes**: `send`/`receive` report failure as a value,
//!    never as a panic or an ambient error; the exchange loop turns those
//!    values into budget charges.
//! 2. **Bounded Retries**: The retry loop spends endpoint budget on every
//!    pass, so it provably terminates.
//! 3. **Lazy Connect**: Nothing touches the network before the first
//!    request.

use std::io::{self, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::time::Duration;

use redir_common::protocol::{encode_command, read_frame};

use crate::client::Error;
use crate::endpoint::{EndpointAddr, EndpointRegistry};

/// Timeout for the transport-level connect. Connections are persistent, so
/// this path is cold and the exact value is not load-bearing.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Outcome of writing one frame.
pub(crate) enum SendOutcome {
    Sent,
    BrokenPipe,
}

/// Outcome of reading one frame.
pub(crate) enum RecvOutcome {
    Frame(Vec<u8>),
    /// EOF, a frame cut short, or a read timeout: the connection is dead
    /// weight either way and must be discarded.
    Stale,
}

#[derive(Debug)]
enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Stream::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Stream::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Stream::Unix(stream) => stream.flush(),
        }
    }
}

/// One live agent connection with reusable frame buffers.
#[derive(Debug)]
pub(crate) struct Connection {
    // Buffered reader for frame scanning; writes go through `get_mut`.
    reader: BufReader<Stream>,
    frame_buf: Vec<u8>,
    write_buf: Vec<u8>,
}

impl Connection {
    fn connect(addr: &EndpointAddr, io_timeout: Duration) -> io::Result<Self> {
        let stream = match addr {
            EndpointAddr::Tcp { host, port } => {
                let stream = connect_tcp(host, *port)?;
                // Frames are tiny; do not let Nagle delay them.
                stream.set_nodelay(true)?;
                let timeout = (!io_timeout.is_zero()).then_some(io_timeout);
                stream.set_read_timeout(timeout)?;
                stream.set_write_timeout(timeout)?;
                Stream::Tcp(stream)
            }
            #[cfg(unix)]
            EndpointAddr::Unix { path } => {
                let stream = UnixStream::connect(path)?;
                let timeout = (!io_timeout.is_zero()).then_some(io_timeout);
                stream.set_read_timeout(timeout)?;
                stream.set_write_timeout(timeout)?;
                Stream::Unix(stream)
            }
        };

        Ok(Connection {
            reader: BufReader::new(stream),
            frame_buf: Vec::with_capacity(256),
            write_buf: Vec::with_capacity(256),
        })
    }

    /// Writes one command frame to the agent.
    fn send(&mut self, name: &str, payload: &[u8]) -> SendOutcome {
        self.write_buf.clear();
        encode_command(name, payload, &mut self.write_buf);

        let stream = self.reader.get_mut();
        let mut written = 0;
        let mut zero_writes = 0u32;
        while written < self.write_buf.len() {
            match stream.write(&self.write_buf[written..]) {
                // A zero-length write can be a transient would-block rather
                // than a dead pipe; allow one immediate retry before giving
                // up on the connection.
                Ok(0) => {
                    zero_writes += 1;
                    if zero_writes > 1 {
                        return SendOutcome::BrokenPipe;
                    }
                }
                Ok(count) => {
                    written += count;
                    zero_writes = 0;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => return SendOutcome::BrokenPipe,
            }
        }

        if stream.flush().is_err() {
            return SendOutcome::BrokenPipe;
        }
        SendOutcome::Sent
    }

    /// Reads one response frame from the agent.
    fn receive(&mut self) -> RecvOutcome {
        match read_frame(&mut self.reader, &mut self.frame_buf) {
            Ok(true) => RecvOutcome::Frame(self.frame_buf.clone()),
            Ok(false) | Err(_) => RecvOutcome::Stale,
        }
    }
}

fn connect_tcp(host: &str, port: u16) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::AddrNotAvailable, "no address resolved")
    }))
}

#[derive(Debug)]
struct ActiveConnection {
    index: usize,
    conn: Connection,
}

/// Owns the active connection and runs requests with endpoint failover.
#[derive(Debug)]
pub(crate) struct ConnectionManager {
    registry: EndpointRegistry,
    timeout: Duration,
    active: Option<ActiveConnection>,
}

impl ConnectionManager {
    pub fn new(registry: EndpointRegistry, timeout: Duration) -> Self {
        ConnectionManager {
            registry,
            timeout,
            active: None,
        }
    }

    /// Sends one command and reads its reply when one is expected.
    ///
    /// Every failed pass either zeroes a connect-refusing endpoint or
    /// charges a retry to the endpoint whose connection broke, then runs
    /// the whole request again. The pass count is bounded by the remaining
    /// budget, so exhaustion always surfaces as `AgentNotFound`.
    pub fn exchange(
        &mut self,
        name: &str,
        payload: &[u8],
        expects_response: bool,
    ) -> Result<Option<Vec<u8>>, Error> {
        let max_passes = self.registry.total_budget() as usize + self.registry.len() + 1;
        for _ in 0..max_passes {
            let active = self.obtain()?;
            let endpoint_index = active.index;

            match active.conn.send(name, payload) {
                SendOutcome::Sent => {}
                SendOutcome::BrokenPipe => {
                    self.discard(endpoint_index, "write failed");
                    continue;
                }
            }

            if !expects_response {
                return Ok(None);
            }

            let outcome = match self.active.as_mut() {
                Some(active) => active.conn.receive(),
                None => continue,
            };
            match outcome {
                RecvOutcome::Frame(frame) => return Ok(Some(frame)),
                RecvOutcome::Stale => self.discard(endpoint_index, "stale read"),
            }
        }

        Err(Error::AgentNotFound)
    }

    /// Returns the cached connection, or connects to the first endpoint
    /// that still has budget.
    fn obtain(&mut self) -> Result<&mut ActiveConnection, Error> {
        if self.active.is_none() {
            self.active = Some(self.select()?);
        }
        self.active.as_mut().ok_or(Error::AgentNotFound)
    }

    fn select(&mut self) -> Result<ActiveConnection, Error> {
        for index in 0..self.registry.len() {
            let endpoint = self.registry.get(index);
            if endpoint.retries == 0 {
                continue;
            }
            let (name, addr) = (endpoint.name.clone(), endpoint.addr.clone());

            tracing::debug!(endpoint = %name, address = %addr, "trying endpoint");
            match Connection::connect(&addr, self.timeout) {
                Ok(conn) => {
                    tracing::debug!(endpoint = %name, "connected");
                    return Ok(ActiveConnection { index, conn });
                }
                Err(err) => {
                    tracing::debug!(endpoint = %name, error = %err, "connect failed, giving up on endpoint");
                    self.registry.exhaust(index);
                }
            }
        }

        tracing::error!("no configured agent endpoint is reachable");
        Err(Error::AgentNotFound)
    }

    /// Drops the active connection and charges the failure to its endpoint.
    /// Dropping the stream closes the socket.
    fn discard(&mut self, index: usize, reason: &'static str) {
        self.active = None;
        self.registry.decrement(index);
        let endpoint = self.registry.get(index);
        tracing::debug!(
            endpoint = %endpoint.name,
            remaining = endpoint.retries,
            reason,
            "discarding connection"
        );
    }
}
