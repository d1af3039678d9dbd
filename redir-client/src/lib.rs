//! # Redir Sync Client
//!
//! Purpose: Provide a lightweight, synchronous client for a redirection
//! agent, with ordered endpoint failover and one persistent connection.
//!
//! ## Design Principles
//! 1. **One Connection**: A client owns at most one agent connection and
//!    replaces it only when it breaks.
//! 2. **Ordered Failover**: Endpoints are tried in configuration order,
//!    bounded by a small per-endpoint retry budget.
//! 3. **Fail Soft**: Outside debug mode, transport and protocol errors
//!    degrade to "no result" instead of reaching the caller.
//! 4. **Protocol Clarity**: Commands own their serialization and parsing;
//!    the transport only moves frames.

mod client;
mod command;
mod conn;
mod endpoint;

pub use client::{Client, ClientConfig, ClientResult, Error};
pub use command::{Command, LogCommand, MatchCommand};
pub use endpoint::EndpointSpec;
pub use redir_common::{Request, Response};
