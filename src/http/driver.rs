//! Per-connection protocol negotiation (§4.2).
//!
//! `run_connection` is what `listener::accept_loop` spawns a thread for,
//! per accepted socket: wait for the first bytes (else `408` and close),
//! terminate TLS if this bind address has a `TlsConfig` (rejecting
//! plaintext connections to a TLS port with `497` before ever attempting
//! the handshake), resolve ALPN or sniff the HTTP/2 client preface, and
//! hand the connection to `http1` or `h2::session` accordingly. An
//! HTTP/1 loop that ends in an h2c upgrade request loops back into
//! `h2::session` with the already-read first request replayed as stream 1.

use super::h2;
use super::http1::{self, ConnectionOutcome};
use super::message::Status;
use super::registry;
use super::session::{FdSessionOps, HttpSession, PollEvents, SessionOps};
use super::tls::{CertInfo, TlsConfig};
use super::{Error, Result};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

/// How long to wait for the client preface/request line of a new
/// connection before giving up with a `408 Request Timeout` (§4.2 step 1).
const FIRST_BYTE_TIMEOUT: Duration = Duration::from_secs(10);

type ContextResolver = dyn Fn(Option<&str>) -> Option<Arc<registry::ServerContext>> + Send + Sync;

/// A session wrapper that replays `peeked` bytes before resuming live
/// reads, so the few bytes consumed while sniffing for the HTTP/2
/// client preface aren't lost to whichever protocol loop it turns out
/// not to be.
struct PrefaceSniffer<S: SessionOps> {
    inner: S,
    peeked: Vec<u8>,
    pos: usize,
}

impl<S: SessionOps> SessionOps for PrefaceSniffer<S> {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
        if self.pos < self.peeked.len() && matches!(events, PollEvents::Read | PollEvents::Both) {
            return Ok(true);
        }
        self.inner.poll(events, timeout)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.pos < self.peeked.len() {
            let n = buf.len().min(self.peeked.len() - self.pos);
            buf[..n].copy_from_slice(&self.peeked[self.pos..self.pos + n]);
            self.pos += n;
            return Ok(n);
        }
        self.inner.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.inner.write(buf)
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

enum Sniffed<S: SessionOps> {
    Http2(PrefaceSniffer<S>),
    NotHttp2(PrefaceSniffer<S>),
}

/// Wait up to `FIRST_BYTE_TIMEOUT` for data, then read enough bytes to
/// tell whether this connection opens with the HTTP/2 client preface.
/// `Ok(None)` means the wait timed out or the peer closed immediately;
/// a `408` has already been written where one could meaningfully land.
fn sniff_preface<S: SessionOps>(mut inner: S) -> Result<Option<Sniffed<S>>> {
    match inner.poll(PollEvents::Read, Some(FIRST_BYTE_TIMEOUT)) {
        Ok(true) => {}
        Ok(false) => {
            write_408(&mut inner);
            return Ok(None);
        }
        Err(Error::Timeout) => {
            write_408(&mut inner);
            return Ok(None);
        }
        Err(e) => return Err(e),
    }

    let preface_len = h2::CONNECTION_PREFACE.len();
    let mut buf = vec![0u8; preface_len];
    let mut filled = 0;
    while filled < preface_len {
        match inner.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(Error::Timeout) => break,
            Err(e) => return Err(e),
        }
    }
    buf.truncate(filled);

    if filled == 0 {
        return Ok(None);
    }

    let is_preface = buf == h2::CONNECTION_PREFACE;
    let sniffer = PrefaceSniffer { inner, peeked: buf, pos: 0 };
    Ok(Some(if is_preface { Sniffed::Http2(sniffer) } else { Sniffed::NotHttp2(sniffer) }))
}

fn write_408<S: SessionOps>(session: &mut S) {
    let _ = session.write(plain_status_response(408).as_bytes());
}

/// Written directly to the raw TCP stream, before any TLS handshake is
/// attempted, so a browser pointed at the wrong scheme gets a readable
/// plaintext error instead of a garbled TLS alert.
fn write_497(mut stream: &TcpStream) {
    use std::io::Write as _;
    let _ = stream.write_all(plain_status_response(497).as_bytes());
}

fn plain_status_response(code: u16) -> String {
    let status = Status::new(code).unwrap();
    let body = format!("{} {}", status.code(), status.reason_phrase());
    format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\n{}",
        status.code(),
        status.reason_phrase(),
        body.len(),
        body
    )
}

/// Entry point called from `listener::accept_loop` for every accepted
/// socket.
pub fn run_connection(
    stream: TcpStream,
    peer: SocketAddr,
    port: u16,
    tls_config: Option<Arc<TlsConfig>>,
) -> Result<()> {
    stream.set_nodelay(true).ok();

    let resolve_context: Arc<ContextResolver> = Arc::new(move |host: Option<&str>| registry::find_context(port, host));

    match tls_config {
        Some(config) => run_tls_connection(stream, peer, &config, resolve_context),
        None => run_plain_connection(stream, peer, resolve_context),
    }
}

fn run_plain_connection(stream: TcpStream, peer: SocketAddr, resolve_context: Arc<ContextResolver>) -> Result<()> {
    let fd = FdSessionOps::new(stream);
    match sniff_preface(fd)? {
        None => Ok(()),
        Some(Sniffed::Http2(sniffer)) => {
            h2::session::run(sniffer, peer, false, None, move |h| resolve_context(h)).map_err(Into::into)
        }
        Some(Sniffed::NotHttp2(sniffer)) => {
            let session = HttpSession::new(sniffer);
            run_http1_then_maybe_h2(session, peer, false, None, resolve_context)
        }
    }
}

/// A byte sequence a TLS 1.0+ ClientHello record always starts with:
/// content type 0x16 (handshake), version major 0x03, handshake type 0x01
/// (ClientHello) four bytes into the record header (§4.2 step 2).
fn looks_like_client_hello(prefix: &[u8; 6]) -> bool {
    prefix[0] == 0x16 && prefix[1] == 0x03 && prefix[5] == 0x01
}

fn run_tls_connection(
    stream: TcpStream,
    peer: SocketAddr,
    config: &TlsConfig,
    resolve_context: Arc<ContextResolver>,
) -> Result<()> {
    let mut prefix = [0u8; 6];
    match stream.peek(&mut prefix) {
        Ok(n) if n == prefix.len() && !looks_like_client_hello(&prefix) => {
            write_497(&stream);
            return Ok(());
        }
        Ok(_) | Err(_) => {}
    }

    let tls_ops = config
        .accept(stream)
        .map_err(|e| Error::Protocol(format!("TLS handshake failed: {}", e)))?;
    let alpn = tls_ops.vars().alpn.clone();
    let client_cert = tls_ops.vars().cert_chain.first().cloned();

    if alpn.as_deref() == Some("h2") {
        return h2::session::run(tls_ops, peer, true, None, move |h| resolve_context(h)).map_err(Into::into);
    }

    let session = HttpSession::new(tls_ops);
    run_http1_then_maybe_h2(session, peer, true, client_cert, resolve_context)
}

fn run_http1_then_maybe_h2<S>(
    session: HttpSession<S>,
    peer: SocketAddr,
    is_tls: bool,
    client_cert: Option<CertInfo>,
    resolve_context: Arc<ContextResolver>,
) -> Result<()>
where
    S: SessionOps + Send + 'static,
{
    let resolver = resolve_context.clone();
    let (outcome, raw_session) =
        http1::run_connection(session, peer, is_tls, client_cert, move |h| resolver(h))?;

    match outcome {
        ConnectionOutcome::Closed => Ok(()),
        ConnectionOutcome::UpgradeToH2 { client_settings, initial_request } => {
            let seed = h2::UpgradeSeed {
                host: initial_request.headers.get("Host").map(|h| h.split(':').next().unwrap_or(h).to_string()),
                method: initial_request.method,
                raw_url: initial_request.raw_url,
                headers: initial_request.headers,
                body: initial_request.body,
            };
            h2::session::run(raw_session, peer, is_tls, Some((client_settings, seed)), move |h| resolve_context(h))
                .map_err(Into::into)
        }
    }
}
