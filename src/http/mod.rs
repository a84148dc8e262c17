//! Embeddable HTTP/1.0, HTTP/1.1, and HTTP/2 server engine.
//!
//! # Architecture
//!
//! The HTTP layer uses a session operations abstraction pattern that allows
//! seamless switching between plain TCP and TLS connections:
//!
//! - `SessionOps` trait defines operations (poll, read, write, close)
//! - `HttpSession` wraps a `SessionOps` with a poll-driven timeout
//! - All HTTP I/O code is transparent to the underlying transport
//!
//! `listener::listen` registers a `ServerContext` (bind addresses, port,
//! handler, options) and runs one accept thread per bound address, handing
//! each connection to `driver::run_connection` on a thread of its own;
//! see `driver` for the per-connection protocol-negotiation sequence,
//! `http1`/`h2::session` for the two protocol loops, and `dispatch` for the
//! handler-invocation logic they share.

pub mod client;
pub mod headers;
pub mod message;
pub mod parser;
pub mod server;
pub mod session;
pub mod chunked;
pub mod options;
pub mod filters;
pub mod date;
pub mod cookie;
pub mod tls;
pub mod h2;
pub mod error_page;
pub mod request;
pub mod response;
pub mod registry;
pub mod listener;
pub mod driver;
pub mod http1;
pub mod dispatch;
pub mod session_store;

pub use client::HttpClient;
pub use headers::Headers;
pub use message::{HttpRequest, HttpResponse, Method, Status, Version};
pub use parser::{RequestParser, ResponseParser};
pub use server::HttpServer;
pub use session::{SessionOps, HttpSession};
pub use options::{ServerOptions, SessionOptions};
pub use error_page::HttpStatusError;
pub use request::Request;
pub use response::Response;
pub use registry::{ServerContext, ServerSettings};
pub use listener::{
    create_test_request, create_test_response, listen, set_vibe_dist_host, static_redirect,
    ListenerHandle,
};

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Invalid HTTP status: {0}")]
    InvalidStatus(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("Incomplete message")]
    Incomplete,

    #[error("Timeout")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Maximum number of headers per message
pub const MAX_HEADERS: usize = 64;

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// CRLF line ending
pub const CRLF: &str = "\r\n";
