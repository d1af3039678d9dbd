//! # Agent Commands
//!
//! The operations the agent understands. Each command bundles its wire
//! name, its payload serialization, and the parsing of the agent's reply.

use redir_common::{Request, Response};
use serde::{Deserialize, Serialize};

use crate::client::Error;

/// SDK identification tag included in analytics payloads.
const PROXY_TOKEN: &str = concat!("redir-client-rust:", env!("CARGO_PKG_VERSION"));

/// One request the agent knows how to answer.
///
/// `Output::default()` is the command's "no result" value; the client
/// returns it when a suppressed error occurs outside debug mode.
pub trait Command {
    /// Parsed result of the command.
    type Output: Default;

    /// Command name on the wire.
    fn name(&self) -> &'static str;

    /// Serializes the payload, embedding `project_key` when configured.
    fn request_body(&self, project_key: Option<&str>) -> Result<Vec<u8>, Error>;

    /// Whether the agent answers this command at all. Commands that return
    /// `false` here never read from the socket.
    fn expects_response(&self) -> bool;

    /// Parses the agent's reply. Called with an empty slice for
    /// fire-and-forget commands.
    fn parse_response(&self, raw: &[u8]) -> Result<Self::Output, Error>;
}

/// Asks the agent whether a request matches a redirect rule.
#[derive(Debug, Clone)]
pub struct MatchCommand<'a> {
    request: &'a Request,
}

impl<'a> MatchCommand<'a> {
    pub fn new(request: &'a Request) -> Self {
        MatchCommand { request }
    }
}

#[derive(Serialize)]
struct MatchPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<&'a str>,
    host: &'a str,
    request_uri: &'a str,
    user_agent: &'a str,
    referer: &'a str,
    scheme: &'a str,
    method: &'a str,
}

#[derive(Deserialize)]
struct MatchReply {
    status_code: u16,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    matched_rule: Option<MatchedRule>,
    #[serde(default)]
    match_on_response_status: Option<u16>,
}

#[derive(Deserialize)]
struct MatchedRule {
    #[serde(default)]
    id: Option<String>,
}

impl Command for MatchCommand<'_> {
    type Output = Option<Response>;

    fn name(&self) -> &'static str {
        "MATCH"
    }

    fn request_body(&self, project_key: Option<&str>) -> Result<Vec<u8>, Error> {
        let payload = MatchPayload {
            project_id: project_key,
            host: &self.request.host,
            request_uri: &self.request.path,
            user_agent: &self.request.user_agent,
            referer: &self.request.referer,
            scheme: &self.request.scheme,
            method: &self.request.method,
        };
        Ok(serde_json::to_vec(&payload)?)
    }

    fn expects_response(&self) -> bool {
        true
    }

    fn parse_response(&self, raw: &[u8]) -> Result<Self::Output, Error> {
        let reply: MatchReply = serde_json::from_slice(raw)?;

        // The agent reports "no rule matched" as status 0. This is a
        // sentinel, not an error and not a zero-status response.
        if reply.status_code == 0 {
            return Ok(None);
        }

        let mut response = Response::new(reply.status_code);
        if let Some(location) = reply.location.filter(|location| !location.is_empty()) {
            response = response.with_location(location);
        }
        if let Some(rule_id) = reply.matched_rule.and_then(|rule| rule.id) {
            response = response.with_rule_id(rule_id);
        }
        if let Some(status) = reply.match_on_response_status.filter(|status| *status != 0) {
            response = response.with_match_on_response_status(status);
        }
        Ok(Some(response))
    }
}

/// Records a served request/response pair for analytics. Fire-and-forget:
/// the agent never acknowledges, success is the write succeeding.
#[derive(Debug, Clone)]
pub struct LogCommand<'a> {
    request: &'a Request,
    response: &'a Response,
}

impl<'a> LogCommand<'a> {
    pub fn new(request: &'a Request, response: &'a Response) -> Self {
        LogCommand { request, response }
    }
}

#[derive(Serialize)]
struct LogPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<&'a str>,
    status_code: u16,
    host: &'a str,
    request_uri: &'a str,
    method: &'a str,
    user_agent: &'a str,
    referer: &'a str,
    scheme: &'a str,
    proxy: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rule_id: Option<&'a str>,
}

impl Command for LogCommand<'_> {
    type Output = bool;

    fn name(&self) -> &'static str {
        "LOG"
    }

    fn request_body(&self, project_key: Option<&str>) -> Result<Vec<u8>, Error> {
        let payload = LogPayload {
            project_id: project_key,
            status_code: self.response.status_code(),
            host: &self.request.host,
            request_uri: &self.request.path,
            method: &self.request.method,
            user_agent: &self.request.user_agent,
            referer: &self.request.referer,
            scheme: &self.request.scheme,
            proxy: PROXY_TOKEN,
            target: self.response.location(),
            rule_id: self.response.rule_id(),
        };
        Ok(serde_json::to_vec(&payload)?)
    }

    fn expects_response(&self) -> bool {
        false
    }

    fn parse_response(&self, _raw: &[u8]) -> Result<Self::Output, Error> {
        Ok(true)
    }
}
