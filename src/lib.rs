//! httpcore - an embeddable HTTP/1.0, HTTP/1.1 and HTTP/2 server engine
//!
//! The engine accepts TCP (optionally TLS) connections, negotiates a
//! protocol version, and dispatches each request to a caller-supplied
//! handler along with a response object the handler writes into. See
//! `http::listen` for the entry point.

pub mod http;

pub use http::{
    create_test_request, create_test_response, listen, set_vibe_dist_host, static_redirect,
    ListenerHandle, Request, Response, ServerContext, ServerSettings,
};
