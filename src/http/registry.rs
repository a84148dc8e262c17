//! Context registry (§3 ServerContext/ServerSettings, §4.1, §5 "Shared
//! state").
//!
//! The registry is the process-wide, copy-on-write set of registered
//! `ServerContext`s. Reads clone an `Arc` to the current snapshot under a
//! brief read lock rather than a hand-rolled atomic compare-and-swap;
//! `std::sync::RwLock<Arc<_>>` gives the same "readers never block a
//! writer's concurrent reader" property without unsafe pointer juggling.
//! Writes take `g_listeners_mutex`, append, and publish the new snapshot
//! in one lock.

use super::error_page::ErrorPageHandler;
use super::options::ServerOptions;
use super::session_store::SessionStore;
use super::tls::TlsConfig;
use super::{Request, Response};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Handler signature (§6): `Fn(&mut Request, &mut Response) -> Result<(),
/// HttpStatusError>`.
pub type Handler =
    Arc<dyn Fn(&mut Request, &mut Response) -> Result<(), super::error_page::HttpStatusError> + Send + Sync>;

/// Invoked once per finalized request with the (request, response) pair
/// (§4.7).
pub type AccessLogger = Arc<dyn Fn(&Request, &Response) + Send + Sync>;

/// Immutable once registered (§3). Built with a plain chainable builder;
/// no config-file crate involved.
#[derive(Clone)]
pub struct ServerSettings {
    pub bind_addresses: Vec<String>,
    pub port: u16,
    pub host_name: Option<String>,
    pub options: ServerOptions,
    pub max_request_header_size: usize,
    pub max_request_body_size: u64,
    pub max_request_time: std::time::Duration,
    pub keep_alive_timeout: std::time::Duration,
    pub tls_config: Option<Arc<TlsConfig>>,
    pub session_store: Option<Arc<dyn SessionStore>>,
    pub error_page_handler: Option<ErrorPageHandler>,
    pub access_log_format: Option<String>,
    pub server_banner: String,
    pub compression_enabled: bool,
    pub http2_max_concurrent_streams: u32,
    pub http2_max_frame_size: u32,
    pub websocket_ping_interval: Option<std::time::Duration>,
    pub dist_host: Option<String>,
    pub dist_port: Option<u16>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addresses: vec!["0.0.0.0".to_string()],
            port: 0,
            host_name: None,
            options: ServerOptions::default(),
            max_request_header_size: 64 * 1024,
            max_request_body_size: 10 * 1024 * 1024,
            max_request_time: std::time::Duration::from_secs(0),
            keep_alive_timeout: std::time::Duration::from_secs(75),
            tls_config: None,
            session_store: None,
            error_page_handler: None,
            access_log_format: None,
            server_banner: "httpcore".to_string(),
            compression_enabled: true,
            http2_max_concurrent_streams: 100,
            http2_max_frame_size: 16384,
            websocket_ping_interval: None,
            dist_host: None,
            dist_port: None,
        }
    }
}

impl ServerSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, addresses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.bind_addresses = addresses.into_iter().map(Into::into).collect();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn host_name(mut self, host: impl Into<String>) -> Self {
        self.host_name = Some(host.into());
        self
    }

    pub fn options(mut self, options: ServerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn max_request_header_size(mut self, size: usize) -> Self {
        self.max_request_header_size = size;
        self
    }

    pub fn max_request_body_size(mut self, size: u64) -> Self {
        self.max_request_body_size = size;
        self
    }

    pub fn max_request_time(mut self, duration: std::time::Duration) -> Self {
        self.max_request_time = duration;
        self
    }

    pub fn keep_alive_timeout(mut self, duration: std::time::Duration) -> Self {
        self.keep_alive_timeout = duration;
        self
    }

    pub fn tls_config(mut self, tls_config: TlsConfig) -> Self {
        self.tls_config = Some(Arc::new(tls_config));
        self
    }

    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    pub fn error_page_handler(mut self, handler: ErrorPageHandler) -> Self {
        self.error_page_handler = Some(handler);
        self
    }

    pub fn access_log_format(mut self, format: impl Into<String>) -> Self {
        self.access_log_format = Some(format.into());
        self
    }

    pub fn server_banner(mut self, banner: impl Into<String>) -> Self {
        self.server_banner = banner.into();
        self
    }

    pub fn compression_enabled(mut self, enabled: bool) -> Self {
        self.compression_enabled = enabled;
        self
    }

    pub fn http2_max_concurrent_streams(mut self, max: u32) -> Self {
        self.http2_max_concurrent_streams = max;
        self
    }

    pub fn http2_max_frame_size(mut self, size: u32) -> Self {
        self.http2_max_frame_size = size;
        self
    }

    pub fn dist_target(mut self, host: impl Into<String>, port: u16) -> Self {
        self.dist_host = Some(host.into());
        self.dist_port = Some(port);
        self
    }
}

/// A `ServerSettings` plus its handler and access loggers, tagged with a
/// monotonically assigned ID (§3).
pub struct ServerContext {
    pub id: u64,
    pub settings: ServerSettings,
    pub handler: Handler,
    pub access_loggers: Vec<AccessLogger>,
}

impl ServerContext {
    /// Does this context serve `host_name` on `(addr, port)`? A context
    /// with no configured host name matches any `Host` header on its bind
    /// address/port (the "default vhost" for that listener).
    pub fn matches(&self, port: u16, host: Option<&str>) -> bool {
        if self.settings.port != port {
            return false;
        }
        match (&self.settings.host_name, host) {
            (Some(configured), Some(requested)) => {
                configured.eq_ignore_ascii_case(requested)
            }
            (None, _) => true,
            (Some(_), None) => false,
        }
    }
}

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

struct Registry {
    contexts: RwLock<Arc<Vec<Arc<ServerContext>>>>,
    write_lock: Mutex<()>,
}

impl Registry {
    fn new() -> Self {
        Registry {
            contexts: RwLock::new(Arc::new(Vec::new())),
            write_lock: Mutex::new(()),
        }
    }
}

static REGISTRY: std::sync::OnceLock<Registry> = std::sync::OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Register a context: assign a fresh ID, copy-append it to the global
/// snapshot, and return the registered `Arc<ServerContext>` (§4.1).
pub fn register(settings: ServerSettings, handler: Handler, access_loggers: Vec<AccessLogger>) -> Arc<ServerContext> {
    let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::SeqCst);
    let context = Arc::new(ServerContext {
        id,
        settings,
        handler,
        access_loggers,
    });

    let reg = registry();
    let _write_guard = reg.write_lock.lock().unwrap();
    let current = reg.contexts.read().unwrap().clone();
    let mut next = (*current).clone();
    next.push(context.clone());
    *reg.contexts.write().unwrap() = Arc::new(next);

    context
}

/// Remove a context by ID, and report whether any remaining context still
/// references `(addr, port)`; the listener supervisor uses this to decide
/// whether to stop the underlying TCP listener (§4.1 Deregistration).
pub fn deregister(id: u64, port: u16) -> bool {
    let reg = registry();
    let _write_guard = reg.write_lock.lock().unwrap();
    let current = reg.contexts.read().unwrap().clone();
    let next: Vec<_> = current.iter().filter(|c| c.id != id).cloned().collect();
    let still_bound = next.iter().any(|c| c.settings.port == port);
    *reg.contexts.write().unwrap() = Arc::new(next);
    still_bound
}

/// Snapshot of all currently registered contexts. Lock-free for the
/// caller: an `Arc` clone under a brief read lock, never blocking a
/// concurrent writer's readers.
pub fn snapshot() -> Arc<Vec<Arc<ServerContext>>> {
    registry().contexts.read().unwrap().clone()
}

/// Resolve the context for `(port, host)` (§4.3 virtual host resolution,
/// §4.1 SNI dispatch). `host` is the `Host` header (HTTP/1) or the SNI
/// name (TLS handshake); contexts with an explicit `host_name` win over
/// the portless default.
pub fn find_context(port: u16, host: Option<&str>) -> Option<Arc<ServerContext>> {
    let contexts = snapshot();
    contexts
        .iter()
        .find(|c| c.settings.host_name.is_some() && c.matches(port, host))
        .or_else(|| contexts.iter().find(|c| c.matches(port, host)))
        .cloned()
}

/// How many distinct hosts are registered on `(addr, port)` across all
/// bind addresses; used to decide whether SNI dispatch is required before
/// promoting a listener's TLS config (§4.1, §9 open question).
pub fn hosts_on_port(port: u16) -> Vec<String> {
    snapshot()
        .iter()
        .filter(|c| c.settings.port == port)
        .filter_map(|c| c.settings.host_name.clone())
        .collect()
}
