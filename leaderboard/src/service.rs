//! Request handling for the HTTP surface, independent of any transport.
//!
//! Routes:
//!
//! | Route | Parameters | Result |
//! |-------|------------|--------|
//! | `/leaderboard` | `limit` (optional, default 50) | top users, best first |
//! | `/search` | `q` (required) | matching users, best first, capped |
//! | `/user` | `username` (required) | one user, 404 if unknown |
//!
//! Every response carries permissive CORS headers and `OPTIONS` requests are
//! answered with an empty body.

use std::sync::Arc;

use log::debug;
use serde::Serialize;

use crate::{RankIndex, User};

/// Listing size when `limit` is absent or unusable.
pub const DEFAULT_LIMIT: usize = 50;

/// Headers attached to every response.
pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type"),
];

/// Failures that map to a non-2xx response.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// `/search` without a usable `q`
    #[error("Query parameter 'q' is required")]
    MissingQuery,
    /// A required parameter other than `q` is missing or empty
    #[error("Query parameter '{0}' is required")]
    MissingParam(&'static str),
    /// The request could not be understood
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// `/user` for a username that was never seen
    #[error("User '{0}' not found")]
    UnknownUser(String),
    /// No such route
    #[error("Not found: {0}")]
    NotFound(String),
    /// Route exists but not for this method
    #[error("Method {0} not allowed")]
    MethodNotAllowed(String),
    /// Response body could not be produced
    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ServiceError {
    /// HTTP status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            ServiceError::MissingQuery
            | ServiceError::MissingParam(_)
            | ServiceError::BadRequest(_) => 400,
            ServiceError::UnknownUser(_) | ServiceError::NotFound(_) => 404,
            ServiceError::MethodNotAllowed(_) => 405,
            ServiceError::Encode(_) => 500,
        }
    }
}

/// Parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Upper-case method name
    pub method: String,
    /// Path without the query string
    pub path: String,
    /// Decoded query parameters in order of appearance
    pub query: Vec<(String, String)>,
}

impl Request {
    /// Build a request from a method and a request target such as
    /// `/search?q=rahul%20k`.
    pub fn new(method: &str, target: &str) -> Result<Self, ServiceError> {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };
        if !path.starts_with('/') && path != "*" {
            return Err(ServiceError::BadRequest(format!("invalid target '{target}'")));
        }

        let mut params = Vec::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            params.push((percent_decode(key)?, percent_decode(value)?));
        }

        Ok(Self {
            method: method.to_ascii_uppercase(),
            path: percent_decode(path)?,
            query: params,
        })
    }

    /// First value of query parameter `key`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Decode `%XX` escapes and `+` as space. Malformed escapes are kept literally.
fn percent_decode(s: &str) -> Result<String, ServiceError> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                match (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8(out)
        .map_err(|_| ServiceError::BadRequest("query is not valid UTF-8".to_string()))
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Response ready to be written by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Value of the `Content-Type` header
    pub content_type: &'static str,
    /// Body text
    pub body: String,
}

impl Response {
    fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ServiceError> {
        let mut body = serde_json::to_string(value)?;
        body.push('\n');
        Ok(Self {
            status: 200,
            content_type: "application/json",
            body,
        })
    }

    fn empty() -> Self {
        Self {
            status: 200,
            content_type: "text/plain; charset=utf-8",
            body: String::new(),
        }
    }

    /// Plain-text error response carrying the error's status.
    pub fn from_error(err: &ServiceError) -> Self {
        Self {
            status: err.status(),
            content_type: "text/plain; charset=utf-8",
            body: format!("{err}\n"),
        }
    }
}

/// Standard reason phrase for the status codes this service emits.
pub fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Routes requests onto a shared [`RankIndex`].
#[derive(Clone)]
pub struct Service {
    index: Arc<RankIndex>,
    default_limit: usize,
}

impl Service {
    /// Service over `index` with the default listing size.
    pub fn new(index: Arc<RankIndex>) -> Self {
        Self {
            index,
            default_limit: DEFAULT_LIMIT,
        }
    }

    /// Override the listing size used when `limit` is absent or unusable.
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    /// The index requests are answered from.
    pub fn index(&self) -> &Arc<RankIndex> {
        &self.index
    }

    /// Answer one request. Errors become plain-text responses.
    pub fn handle(&self, req: &Request) -> Response {
        let resp = match self.route(req) {
            Ok(resp) => resp,
            Err(err) => Response::from_error(&err),
        };
        debug!("{} {} -> {}", req.method, req.path, resp.status);
        resp
    }

    fn route(&self, req: &Request) -> Result<Response, ServiceError> {
        if req.method == "OPTIONS" {
            return Ok(Response::empty());
        }

        type Handler = fn(&Service, &Request) -> Result<Response, ServiceError>;
        let handler: Handler = match req.path.as_str() {
            "/leaderboard" => Self::leaderboard,
            "/search" => Self::search,
            "/user" => Self::user,
            other => return Err(ServiceError::NotFound(other.to_string())),
        };

        match req.method.as_str() {
            "GET" | "POST" => handler(self, req),
            other => Err(ServiceError::MethodNotAllowed(other.to_string())),
        }
    }

    fn leaderboard(&self, req: &Request) -> Result<Response, ServiceError> {
        let limit = req
            .param("limit")
            .and_then(|l| l.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(self.default_limit);
        Response::json(&self.index.top_users(limit))
    }

    fn search(&self, req: &Request) -> Result<Response, ServiceError> {
        let query = req
            .param("q")
            .filter(|q| !q.is_empty())
            .ok_or(ServiceError::MissingQuery)?;

        let mut users: Vec<User> = self.index.search_users(query);
        users.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.username.cmp(&b.username)));
        Response::json(&users)
    }

    fn user(&self, req: &Request) -> Result<Response, ServiceError> {
        let username = req
            .param("username")
            .filter(|u| !u.is_empty())
            .ok_or(ServiceError::MissingParam("username"))?;

        let user = self
            .index
            .get_user(username)
            .ok_or_else(|| ServiceError::UnknownUser(username.to_string()))?;
        Response::json(&user)
    }
}
