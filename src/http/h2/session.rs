//! HTTP/2 per-connection dispatch loop (§4.8).
//!
//! `H2Server::recv_request`/`send_response` already give a complete,
//! synchronous single-request round trip; this module adds the loop that
//! keeps pulling requests off the connection and feeding them through
//! `dispatch::dispatch_request` until the peer goes away.
//!
//! Requests are processed sequentially on the connection's own thread,
//! one fully handled (including its response going out) before the next
//! `recv_request` call. `recv_request` blocks reading frames for
//! whichever stream completes first, and a waiting client typically
//! won't send more data until it has a response; handing responses to
//! worker threads behind a shared lock on the same `H2Server` would
//! deadlock exactly that common case (the reader thread parked in
//! `recv_request` holding the lock a finished worker needs to flush its
//! response through). §4.8 calls out the consequence: no concurrent
//! multi-stream dispatch, unlike a true HTTP/2 multiplexer.

use super::super::dispatch::dispatch_request;
use super::super::message::{Method, Status, Version};
use super::super::registry::ServerContext;
use super::super::request::Request;
use super::super::response::{ProtocolStream, Response};
use super::super::session::SessionOps;
use super::super::{Error as HttpError, Headers, Result as HttpResult};
use super::super::date::now_http_date;
use super::error::Error as H2Error;
use super::server::{H2Request, H2Server};
use super::settings::Settings;
use super::stream::StreamId;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// `ProtocolStream` for one HTTP/2 stream. Buffers the body in memory
/// and flushes it as a single DATA frame on `finish_stream`: `H2Server`
/// sends a response in one call, so there's no incremental
/// headers-then-chunks path to hook into the way HTTP/1 has.
struct H2StreamHandle<S: SessionOps> {
    server: Arc<Mutex<H2Server<S>>>,
    stream_id: StreamId,
    status: Status,
    pending_headers: Headers,
    body: Vec<u8>,
}

impl<S: SessionOps> Write for H2StreamHandle<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: SessionOps + Send + 'static> ProtocolStream for H2StreamHandle<S> {
    fn is_http2(&self) -> bool {
        true
    }

    fn write_response_headers(&mut self, status: Status, _reason: &str, headers: &Headers) -> HttpResult<()> {
        self.status = status;
        self.pending_headers = headers.clone();
        Ok(())
    }

    fn finish_stream(&mut self) -> HttpResult<()> {
        let header_pairs: Vec<(&str, &str)> = self.pending_headers.iter().collect();
        let body = bytes::Bytes::from(std::mem::take(&mut self.body));
        self.server
            .lock()
            .unwrap()
            .send_response(self.stream_id, self.status.code(), &header_pairs, body)
            .map_err(h2_to_http_error)
    }

    fn wait_for_close(&mut self, _timeout: Duration) -> HttpResult<()> {
        Ok(())
    }
}

fn h2_to_http_error(e: H2Error) -> HttpError {
    match e {
        H2Error::Io(io_err) => HttpError::Io(io_err),
        H2Error::Http(http_err) => http_err,
        other => HttpError::Protocol(other.to_string()),
    }
}

/// The first request of an h2c upgrade, carried from `http1::run_connection`
/// so it can be dispatched as stream 1 (RFC 7540 §3.2) instead of discarded.
pub struct UpgradeSeed {
    pub host: Option<String>,
    pub method: Method,
    pub raw_url: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

/// Drive one HTTP/2 connection to completion: handshake (either a fresh
/// preface or a seeded h2c upgrade), then repeatedly `recv_request` and
/// dispatch until the peer sends GOAWAY or the connection drops.
pub fn run<S, F>(
    raw_session: S,
    peer_addr: SocketAddr,
    is_tls: bool,
    upgrade: Option<(Settings, UpgradeSeed)>,
    resolve_context: F,
) -> HttpResult<()>
where
    S: SessionOps + Send + 'static,
    F: Fn(Option<&str>) -> Option<Arc<ServerContext>>,
{
    let mut server = H2Server::new(raw_session).map_err(h2_to_http_error)?;

    let seed = if let Some((client_settings, seed)) = upgrade {
        server.accept_upgraded(client_settings).map_err(h2_to_http_error)?;
        Some(seed)
    } else {
        server.accept().map_err(h2_to_http_error)?;
        None
    };

    let server = Arc::new(Mutex::new(server));

    if let Some(seed) = seed {
        if let Some(context) = resolve_context(seed.host.as_deref()) {
            let transport = H2StreamHandle {
                server: server.clone(),
                stream_id: 1,
                status: Status::new(200).unwrap(),
                pending_headers: Headers::new(),
                body: Vec::new(),
            };
            run_seed_stream(transport, seed, peer_addr, is_tls, context);
        }
    }

    loop {
        let request = {
            let mut guard = server.lock().unwrap();
            guard.recv_request()
        };

        let h2_request = match request {
            Ok(req) => req,
            Err(H2Error::ConnectionClosed) | Err(H2Error::Io(_)) => break,
            Err(e) => {
                tracing::warn!(error = %e, "http/2 connection error, closing");
                break;
            }
        };

        let host = h2_request.authority().to_string();
        let stream_id = h2_request.stream_id;
        let Some(context) = resolve_context(if host.is_empty() { None } else { Some(host.as_str()) }) else {
            let _ = server.lock().unwrap().send_response(stream_id, 404, &[], bytes::Bytes::new());
            continue;
        };

        let transport = H2StreamHandle {
            server: server.clone(),
            stream_id,
            status: Status::new(200).unwrap(),
            pending_headers: Headers::new(),
            body: Vec::new(),
        };
        run_one_stream(transport, h2_request, peer_addr, is_tls, context);
    }

    Ok(())
}

fn request_from_h2(h2_request: &H2Request, peer_addr: SocketAddr, is_tls: bool) -> Request {
    let method = Method::from_str(h2_request.method()).unwrap_or(Method::Get);
    let mut headers = Headers::new();
    for (name, value) in &h2_request.headers {
        headers.insert(name.as_str(), value.as_str());
    }
    if !h2_request.authority().is_empty() && headers.get("Host").is_none() {
        headers.insert("Host", h2_request.authority());
    }
    let body = h2_request.body().to_vec();

    Request::new(
        method,
        h2_request.path().to_string(),
        Version::Http11,
        headers,
        peer_addr,
        is_tls,
        None,
        Box::new(io::Cursor::new(body)),
    )
}

fn run_one_stream<S: SessionOps + Send + 'static>(
    transport: H2StreamHandle<S>,
    h2_request: H2Request,
    peer_addr: SocketAddr,
    is_tls: bool,
    context: Arc<ServerContext>,
) {
    let mut request = request_from_h2(&h2_request, peer_addr, is_tls);
    let is_head = request.method() == Method::Head;
    let mut response = Response::new(Box::new(transport), Version::Http11, is_head);
    response.headers_mut().insert("Server", context.settings.server_banner.clone());
    response.headers_mut().insert("Date", now_http_date());
    dispatch_request(&mut request, &mut response, &context);
}

fn run_seed_stream<S: SessionOps + Send + 'static>(
    transport: H2StreamHandle<S>,
    seed: UpgradeSeed,
    peer_addr: SocketAddr,
    is_tls: bool,
    context: Arc<ServerContext>,
) {
    let mut request = Request::new(
        seed.method,
        seed.raw_url,
        Version::Http11,
        seed.headers,
        peer_addr,
        is_tls,
        None,
        Box::new(io::Cursor::new(seed.body)),
    );
    let is_head = request.method() == Method::Head;
    let mut response = Response::new(Box::new(transport), Version::Http11, is_head);
    response.headers_mut().insert("Server", context.settings.server_banner.clone());
    response.headers_mut().insert("Date", now_http_date());
    dispatch_request(&mut request, &mut response, &context);
}
