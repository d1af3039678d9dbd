// redir-common - Shared types and wire protocol for the Redir SDK
//
// This crate defines the agent frame format and the HTTP value objects

pub mod http;
pub mod protocol;

// Re-export for convenience
pub use http::*;
pub use protocol::*;
