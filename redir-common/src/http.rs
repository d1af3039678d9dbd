//! # HTTP Value Objects
//!
//! Purpose: Carry the request context sent to the agent and the redirect
//! outcome it answers with. These are plain data types shared by the client
//! and agent-side tooling.

/// Context of one observed HTTP request.
///
/// Only the fields the agent matches on are carried; this is not a general
/// HTTP request type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Host of the request URI.
    pub host: String,
    /// Path of the request URI.
    pub path: String,
    /// User-Agent header.
    pub user_agent: String,
    /// Referer header.
    pub referer: String,
    /// URI scheme, usually `http` or `https`.
    pub scheme: String,
    /// HTTP method.
    pub method: String,
}

impl Request {
    /// Creates a request context for `host` and `path` with default headers.
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Request {
            host: host.into(),
            path: path.into(),
            ..Request::default()
        }
    }
}

impl Default for Request {
    fn default() -> Self {
        Request {
            host: String::new(),
            path: String::new(),
            user_agent: String::new(),
            referer: String::new(),
            scheme: "http".to_string(),
            method: "GET".to_string(),
        }
    }
}

/// Outcome of a matched redirect rule, or the response being logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status_code: u16,
    rule_id: Option<String>,
    location: Option<String>,
    match_on_response_status: Option<u16>,
}

impl Response {
    /// Creates a response with only a status code.
    pub fn new(status_code: u16) -> Self {
        Response {
            status_code,
            rule_id: None,
            location: None,
            match_on_response_status: None,
        }
    }

    /// Attaches the redirect target.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Attaches the identifier of the rule that matched.
    pub fn with_rule_id(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    /// Restricts the rule to upstream responses with the given status.
    pub fn with_match_on_response_status(mut self, status: u16) -> Self {
        self.match_on_response_status = Some(status);
        self
    }

    /// HTTP status code of the redirect, e.g. 301 or 410.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Redirect target, absent for rules like 410 Gone.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Identifier of the matched rule, when the agent reported one.
    pub fn rule_id(&self) -> Option<&str> {
        self.rule_id.as_deref()
    }

    /// Upstream status this rule is conditional on, if any.
    pub fn match_on_response_status(&self) -> Option<u16> {
        self.match_on_response_status
    }
}
