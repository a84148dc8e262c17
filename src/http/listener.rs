//! Listener supervisor (§2 item 5, §4.1, §6 public operations).
//!
//! `listen()` registers a `ServerContext` and, for each bind address, binds
//! a fresh `TcpListener` or reuses one already open for that address. The
//! accept loop runs on a dedicated supervisor thread and hands each
//! accepted connection to `driver::run_connection` on its own thread:
//! one thread per connection, no async runtime.

use super::driver;
use super::error_page::HttpStatusError;
use super::message::{Method, Status, Version};
use super::registry::{self, AccessLogger, Handler, ServerContext, ServerSettings};
use super::request::Request;
use super::response::{ProtocolStream, Response};
use super::tls::{TlsConfig, TlsError};
use super::{Headers, Result};
use std::collections::HashMap;
use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::JoinHandle;
use std::time::Duration;

/// Unrecoverable listen-time conditions (§1.1 ambient error handling).
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("could not resolve bind address {0}")]
    UnresolvableAddress(String),

    #[error(
        "port {port} on {addr} already serves a distinct TLS config for another virtual host, \
         and the registry knows only one host name for it; bind the second host's ServerSettings \
         first so SNI dispatch has something to tell them apart by"
    )]
    SniRequired { addr: SocketAddr, port: u16 },

    #[error("failed to build SNI-dispatching TLS config for {addr}: {source}")]
    Tls { addr: SocketAddr, source: TlsError },
}

/// One TCP listener plus the bind address/port and the TLS config
/// actually bound on it (§3 ListenInfo). `tls_config` is a cell rather
/// than a plain field because `bind_addr` can promote it to an
/// SNI-dispatching config after the accept thread is already running.
struct ListenInfo {
    addr: SocketAddr,
    tls_config: Arc<Mutex<Option<Arc<TlsConfig>>>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

static LISTENERS: OnceLock<Mutex<HashMap<SocketAddr, ListenInfo>>> = OnceLock::new();
static VIBE_DIST_HOST: OnceLock<Mutex<Option<(String, u16)>>> = OnceLock::new();

fn listeners() -> &'static Mutex<HashMap<SocketAddr, ListenInfo>> {
    LISTENERS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Opaque handle returned by `listen()`; deregisters its context (and
/// stops any now-unreferenced listener) when `stop_listening` is called.
pub struct ListenerHandle {
    context_id: u64,
    port: u16,
    bound_addrs: Vec<SocketAddr>,
    distributed: bool,
}

impl ListenerHandle {
    /// Deregister this context; for each bind address no longer
    /// referenced by any context, stop the underlying TCP listener
    /// (§4.1 Deregistration).
    pub fn stop_listening(self) {
        if self.distributed {
            tracing::info!(context_id = self.context_id, "stopped distributed listener");
            return;
        }

        let still_bound = registry::deregister(self.context_id, self.port);
        if still_bound {
            return;
        }

        let mut guard = listeners().lock().unwrap();
        for addr in &self.bound_addrs {
            if let Some(mut info) = guard.remove(addr) {
                info.stop.store(true, Ordering::SeqCst);
                if let Some(thread) = info.thread.take() {
                    let _ = thread.join();
                }
            }
        }
    }
}

/// Register `settings`/`handler` and start serving (§6 `listen`).
pub fn listen(settings: ServerSettings, handler: Handler) -> Result<ListenerHandle> {
    listen_with_loggers(settings, handler, Vec::new())
}

pub fn listen_with_loggers(
    settings: ServerSettings,
    handler: Handler,
    access_loggers: Vec<AccessLogger>,
) -> Result<ListenerHandle> {
    let port = settings.port;

    let dist_target = settings
        .dist_host
        .clone()
        .zip(settings.dist_port)
        .or_else(vibe_dist_target);

    if let Some((host, dist_port)) = dist_target {
        let context = registry::register(settings, handler, access_loggers);
        tracing::info!(
            context_id = context.id,
            relay_host = %host,
            relay_port = dist_port,
            "listen() configured to relay through a distributed front-end instead of binding locally"
        );
        return Ok(ListenerHandle {
            context_id: context.id,
            port,
            bound_addrs: Vec::new(),
            distributed: true,
        });
    }

    let bind_addresses = settings.bind_addresses.clone();
    let tls_config = settings.tls_config.clone();
    let context = registry::register(settings, handler, access_loggers);

    let mut bound_addrs = Vec::new();
    for host in &bind_addresses {
        let addr = resolve_one(host, port)
            .map_err(|_| super::Error::Protocol(format!("cannot resolve bind address {}", host)))?;
        bind_addr(addr, tls_config.clone())
            .map_err(|e| super::Error::Protocol(e.to_string()))?;
        bound_addrs.push(addr);
    }

    Ok(ListenerHandle {
        context_id: context.id,
        port,
        bound_addrs,
        distributed: false,
    })
}

fn resolve_one(host: &str, port: u16) -> std::result::Result<SocketAddr, ServerError> {
    (host, port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ServerError::UnresolvableAddress(format!("{}:{}", host, port)))
}

fn bind_addr(addr: SocketAddr, tls_config: Option<Arc<TlsConfig>>) -> std::result::Result<(), ServerError> {
    let mut guard = listeners().lock().unwrap();

    if let Some(existing) = guard.get(&addr) {
        let mut current = existing.tls_config.lock().unwrap();
        match (&*current, &tls_config) {
            (None, None) => return Ok(()),
            (Some(a), Some(b)) if Arc::ptr_eq(a, b) => return Ok(()),
            (Some(_), Some(_)) => {
                let port = addr.port();
                if registry::hosts_on_port(port).len() > 1 {
                    let dispatcher = build_sni_dispatcher(port)
                        .map_err(|source| ServerError::Tls { addr, source })?;
                    *current = Some(Arc::new(dispatcher));
                    return Ok(());
                }
                return Err(ServerError::SniRequired { addr, port });
            }
            (None, Some(_)) | (Some(_), None) => {
                return Err(ServerError::SniRequired { addr, port: addr.port() });
            }
        }
    }

    let listener = TcpListener::bind(addr).map_err(|source| ServerError::Bind { addr, source })?;
    listener
        .set_nonblocking(true)
        .map_err(|source| ServerError::Bind { addr, source })?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_clone = stop.clone();
    let tls_cell = Arc::new(Mutex::new(tls_config));
    let tls_for_thread = tls_cell.clone();

    let thread = std::thread::spawn(move || accept_loop(listener, addr, tls_for_thread, stop_clone));

    guard.insert(
        addr,
        ListenInfo {
            addr,
            tls_config: tls_cell,
            stop,
            thread: Some(thread),
        },
    );
    Ok(())
}

/// Build a `TlsConfig` whose handshake never uses its own certificate:
/// the servername callback always swaps in whichever per-host config
/// `registry::find_context` returns for the client's SNI name, aborting
/// the handshake for a name no registered context owns (§4.1).
fn build_sni_dispatcher(port: u16) -> std::result::Result<TlsConfig, TlsError> {
    TlsConfig::server()
        .sni_resolver(move |name| registry::find_context(port, Some(name)).and_then(|ctx| ctx.settings.tls_config.clone()))
        .build()
}

fn accept_loop(
    listener: TcpListener,
    addr: SocketAddr,
    tls_config: Arc<Mutex<Option<Arc<TlsConfig>>>>,
    stop: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                let tls_config = tls_config.lock().unwrap().clone();
                std::thread::spawn(move || {
                    if let Err(e) = driver::run_connection(stream, peer, addr.port(), tls_config) {
                        tracing::warn!(error = %e, "connection driver exited with error");
                    }
                });
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(e) => {
                tracing::error!(error = %e, %addr, "accept() failed, listener thread exiting");
                break;
            }
        }
    }
}

fn vibe_dist_target() -> Option<(String, u16)> {
    VIBE_DIST_HOST.get().and_then(|m| m.lock().unwrap().clone())
}

/// Process-wide default distributed front-end target consulted by
/// `listen()` when a `ServerSettings` doesn't set one explicitly (§6
/// CLI/environment `--disthost`/`--distport` equivalent).
pub fn set_vibe_dist_host(host: impl Into<String>, port: u16) {
    *VIBE_DIST_HOST
        .get_or_init(|| Mutex::new(None))
        .lock()
        .unwrap() = Some((host.into(), port));
}

/// A handler that always redirects to `url` with `status` (§6
/// `static_redirect`).
pub fn static_redirect(url: impl Into<String>, status: Status) -> Handler {
    let url = url.into();
    Arc::new(move |_req: &mut Request, resp: &mut Response| {
        resp.redirect(&url, status)
            .map_err(|e| HttpStatusError::internal(e.to_string()))
    })
}

/// In-memory `ProtocolStream` used by `create_test_response`; records
/// whatever would have gone out on the wire so test assertions can
/// inspect it.
pub struct TestTransport {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for TestTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ProtocolStream for TestTransport {
    fn write_response_headers(&mut self, status: Status, reason: &str, headers: &Headers) -> Result<()> {
        let mut line = format!("HTTP/1.1 {} {}\r\n", status.code(), reason);
        for (name, value) in headers.iter() {
            line.push_str(&format!("{}: {}\r\n", name, value));
        }
        line.push_str("\r\n");
        self.write_all(line.as_bytes()).map_err(super::Error::Io)
    }

    fn finish_stream(&mut self) -> Result<()> {
        Ok(())
    }

    fn wait_for_close(&mut self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}

/// Construct a `Request` for unit/integration tests (§1.2, §6
/// `create_test_request`), built directly from `Request::new` rather than
/// through a real socket round trip.
pub fn create_test_request(method: Method, uri: &str, headers: Headers, body: Vec<u8>) -> Request {
    Request::new(
        method,
        uri,
        Version::Http11,
        headers,
        "127.0.0.1:0".parse().unwrap(),
        false,
        None,
        Box::new(std::io::Cursor::new(body)),
    )
}

/// Construct a `Response` for unit/integration tests (§6
/// `create_test_response`), returning the shared buffer its writes land
/// in so the test can assert on the rendered bytes after `finalize()`.
pub fn create_test_response() -> (Response, Arc<Mutex<Vec<u8>>>) {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let transport = TestTransport { buffer: buffer.clone() };
    (Response::new(Box::new(transport), Version::Http11, false), buffer)
}
