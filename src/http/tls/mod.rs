//! TLS support for HTTP connections (§4.2, §5).
//!
//! # Architecture
//!
//! 1. `TlsConfig` defines TLS settings (versions, ciphers, certificates)
//! 2. `TlsSessionOps` implements the `SessionOps` trait for encrypted I/O
//! 3. `driver::run_connection` calls `TlsConfig::accept` on sockets bound
//!    with a TLS config, then reads `TlsVars::alpn` to decide between the
//!    HTTP/1 and HTTP/2 loops
//!
//! # Features
//!
//! - TLS 1.0 through TLS 1.3 support (OpenSSL version dependent)
//! - Certificate loading and validation
//! - ALPN (Application-Layer Protocol Negotiation)
//! - SNI (Server Name Indication), including per-host dispatch via
//!   `ServerConfigBuilder::sni_resolver`
//! - Session resumption
//! - OCSP stapling
//! - Client certificate verification

pub mod config;
pub mod session;
pub mod handshake;
pub mod cert;
pub mod vars;
pub mod builtin_cert;

pub use config::{
    TlsConfig, TlsConfigBuilder, TlsVersion, ClientVerify, TlsError,
    ClientConfigBuilder, ServerConfigBuilder,
};
pub use session::TlsSessionOps;
pub use vars::TlsVars;
pub use cert::CertInfo;

/// Result type for TLS operations
pub type Result<T> = std::result::Result<T, TlsError>;
