//! # Client Facade
//!
//! Purpose: Expose a compact, blocking API for querying a redirection agent
//! and logging served responses over a persistent connection.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `Client` hides endpoint failover and framing.
//! 2. **Fail Fast on Config**: A bad endpoint set is rejected at
//!    construction, never at first use.
//! 3. **Fail Soft at Runtime**: Outside debug mode a broken agent costs
//!    the caller nothing but a missed redirect.

use std::time::Duration;

use redir_common::{Request, Response};

use crate::command::{Command, LogCommand, MatchCommand};
use crate::conn::ConnectionManager;
use crate::endpoint::{EndpointRegistry, EndpointSpec};

/// Result type for the client.
pub type ClientResult<T> = Result<T, Error>;

/// Errors surfaced by the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid endpoint configuration, raised at construction time.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// Every configured endpoint exhausted its retry budget.
    #[error("agent not found")]
    AgentNotFound,
    /// The agent answered with a payload that could not be decoded.
    #[error("invalid agent response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Configuration for the client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Project key identifying the tenant on multi-project agents.
    pub project_key: Option<String>,
    /// Ordered endpoint list; the first healthy endpoint wins.
    pub connections: Vec<(String, EndpointSpec)>,
    /// Read/write timeout applied to every agent exchange. A zero value
    /// disables the timeout.
    pub timeout: Duration,
    /// When set, transport and protocol errors are returned to the caller
    /// instead of degrading to "no result".
    pub debug: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            project_key: None,
            connections: Vec::new(),
            // The agent is expected next door; 10ms mirrors its answer SLA.
            timeout: Duration::from_millis(10),
            debug: false,
        }
    }
}

/// Synchronous client owning one connection to a redirection agent.
///
/// Each call sends one command and, when the command expects it, reads one
/// reply. Broken connections are replaced transparently within the
/// per-endpoint retry budget. A client is single-caller by construction
/// (`&mut self`); concurrent callers each need their own instance.
#[derive(Debug)]
pub struct Client {
    manager: ConnectionManager,
    project_key: Option<String>,
    debug: bool,
}

impl Client {
    /// Creates a client for a single endpoint with default configuration.
    pub fn connect(addr: impl Into<String>) -> ClientResult<Self> {
        Self::with_config(ClientConfig {
            connections: vec![("default".to_string(), EndpointSpec::Address(addr.into()))],
            ..ClientConfig::default()
        })
    }

    /// Creates a client from a full configuration.
    pub fn with_config(config: ClientConfig) -> ClientResult<Self> {
        let registry = EndpointRegistry::new(config.connections)?;
        Ok(Client {
            manager: ConnectionManager::new(registry, config.timeout),
            project_key: config.project_key,
            debug: config.debug,
        })
    }

    /// Runs one command against the agent.
    ///
    /// In debug mode every failure is returned to the caller. Otherwise
    /// failures are logged and collapse to the command's "no result" value:
    /// `None` for a match, `false` for a log.
    pub fn request<C: Command>(&mut self, command: &C) -> ClientResult<C::Output> {
        match self.execute(command) {
            Ok(output) => Ok(output),
            Err(err) if self.debug => Err(err),
            Err(err) => {
                tracing::warn!(command = command.name(), error = %err, "agent request failed");
                Ok(C::Output::default())
            }
        }
    }

    /// Asks the agent for a redirect rule matching `request`.
    ///
    /// Returns `Ok(None)` when no rule matches.
    pub fn find_redirect(&mut self, request: &Request) -> ClientResult<Option<Response>> {
        self.request(&MatchCommand::new(request))
    }

    /// Records a served request/response pair for analytics.
    pub fn log(&mut self, request: &Request, response: &Response) -> ClientResult<bool> {
        self.request(&LogCommand::new(request, response))
    }

    fn execute<C: Command>(&mut self, command: &C) -> ClientResult<C::Output> {
        let payload = command.request_body(self.project_key.as_deref())?;
        let reply = self
            .manager
            .exchange(command.name(), &payload, command.expects_response())?;
        command.parse_response(reply.as_deref().unwrap_or_default())
    }
}
