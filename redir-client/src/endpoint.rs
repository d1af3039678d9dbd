//! # Endpoint Registry
//!
//! Purpose: Hold the ordered set of configured agent endpoints and the
//! per-endpoint retry budget that bounds failover.
//!
//! Endpoints are tried in configuration order; the first healthy one wins.
//! Budgets only ever decrease within the life of a client: a send or
//! receive failure costs one retry, a failed connect zeroes the budget and
//! removes the endpoint from rotation for good.

use std::fmt;
#[cfg(unix)]
use std::path::PathBuf;

use crate::client::Error;

/// Retry budget granted to every endpoint at construction.
pub(crate) const RETRY_BUDGET: u32 = 2;

/// One configured way to reach an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointSpec {
    /// Explicit TCP host and port.
    HostPort { host: String, port: u16 },
    /// `host:port`, a bare Unix socket path, or a full connection string
    /// (`tcp://host:port` / `unix:///run/agent.sock`). A string without a
    /// port segment is taken as a socket path.
    Address(String),
}

impl From<&str> for EndpointSpec {
    fn from(value: &str) -> Self {
        EndpointSpec::Address(value.to_string())
    }
}

impl From<String> for EndpointSpec {
    fn from(value: String) -> Self {
        EndpointSpec::Address(value)
    }
}

impl From<(&str, u16)> for EndpointSpec {
    fn from((host, port): (&str, u16)) -> Self {
        EndpointSpec::HostPort {
            host: host.to_string(),
            port,
        }
    }
}

impl EndpointSpec {
    /// Resolves the descriptor into a connectable address.
    pub(crate) fn resolve(&self) -> Result<EndpointAddr, Error> {
        match self {
            EndpointSpec::HostPort { host, port } => {
                if host.is_empty() {
                    return Err(Error::Configuration(
                        "endpoint host must not be empty".to_string(),
                    ));
                }
                Ok(EndpointAddr::Tcp {
                    host: host.clone(),
                    port: *port,
                })
            }
            EndpointSpec::Address(address) => resolve_address(address.trim()),
        }
    }
}

fn resolve_address(address: &str) -> Result<EndpointAddr, Error> {
    if let Some(rest) = address.strip_prefix("tcp://") {
        let (host, port) = rest.rsplit_once(':').ok_or_else(|| {
            Error::Configuration(format!("endpoint \"{address}\" is missing a port"))
        })?;
        let port = port.parse::<u16>().map_err(|_| {
            Error::Configuration(format!("endpoint \"{address}\" has an invalid port"))
        })?;
        return tcp_addr(address, host, port);
    }

    if let Some(rest) = address.strip_prefix("unix://") {
        if rest.is_empty() {
            return Err(Error::Configuration(format!(
                "endpoint \"{address}\" is missing a socket path"
            )));
        }
        return unix_addr(rest);
    }

    if address.is_empty() {
        return Err(Error::Configuration(
            "endpoint needs a host and port or a socket path".to_string(),
        ));
    }

    if let Some((host, port)) = address.rsplit_once(':') {
        if let Ok(port) = port.parse::<u16>() {
            return tcp_addr(address, host, port);
        }
    }

    // No port segment: a bare Unix socket path.
    unix_addr(address)
}

fn tcp_addr(address: &str, host: &str, port: u16) -> Result<EndpointAddr, Error> {
    // Accept bracketed IPv6 hosts like `[::1]:3100`.
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(Error::Configuration(format!(
            "endpoint \"{address}\" is missing a host"
        )));
    }
    Ok(EndpointAddr::Tcp {
        host: host.to_string(),
        port,
    })
}

#[cfg(unix)]
fn unix_addr(path: &str) -> Result<EndpointAddr, Error> {
    Ok(EndpointAddr::Unix {
        path: PathBuf::from(path),
    })
}

#[cfg(not(unix))]
fn unix_addr(path: &str) -> Result<EndpointAddr, Error> {
    Err(Error::Configuration(format!(
        "unix socket endpoint \"{path}\" is not supported on this platform"
    )))
}

/// Resolved connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EndpointAddr {
    Tcp { host: String, port: u16 },
    #[cfg(unix)]
    Unix { path: PathBuf },
}

impl fmt::Display for EndpointAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointAddr::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            #[cfg(unix)]
            EndpointAddr::Unix { path } => write!(f, "unix://{}", path.display()),
        }
    }
}

/// One named endpoint with its remaining retry budget.
#[derive(Debug)]
pub(crate) struct Endpoint {
    pub name: String,
    pub addr: EndpointAddr,
    pub retries: u32,
}

/// Insertion-ordered set of endpoints.
#[derive(Debug)]
pub(crate) struct EndpointRegistry {
    endpoints: Vec<Endpoint>,
}

impl EndpointRegistry {
    /// Builds the registry, resolving every descriptor up front so a bad
    /// configuration fails at construction and never at first use.
    pub fn new(connections: Vec<(String, EndpointSpec)>) -> Result<Self, Error> {
        if connections.is_empty() {
            return Err(Error::Configuration(
                "at least one connection is required".to_string(),
            ));
        }

        let mut endpoints = Vec::with_capacity(connections.len());
        for (name, spec) in connections {
            let addr = spec
                .resolve()
                .map_err(|err| match err {
                    Error::Configuration(message) => {
                        Error::Configuration(format!("connection \"{name}\": {message}"))
                    }
                    other => other,
                })?;
            endpoints.push(Endpoint {
                name,
                addr,
                retries: RETRY_BUDGET,
            });
        }

        Ok(EndpointRegistry { endpoints })
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn get(&self, index: usize) -> &Endpoint {
        &self.endpoints[index]
    }

    /// Charges one retry to the endpoint at `index`.
    pub fn decrement(&mut self, index: usize) {
        let endpoint = &mut self.endpoints[index];
        endpoint.retries = endpoint.retries.saturating_sub(1);
    }

    /// Removes the endpoint at `index` from rotation for good.
    pub fn exhaust(&mut self, index: usize) {
        self.endpoints[index].retries = 0;
    }

    /// Sum of the remaining budgets, used to bound the request retry loop.
    pub fn total_budget(&self) -> u32 {
        self.endpoints.iter().map(|endpoint| endpoint.retries).sum()
    }
}
