//! HTTP/2 protocol implementation (§4.8).
//!
//! `server::H2Server` owns the wire-level pieces (frame codec, HPACK,
//! flow control, one request/response round trip at a time), and
//! `session::run` is the per-connection loop on top of it that keeps
//! calling `recv_request`/`send_response`, feeding each completed
//! request through `dispatch::dispatch_request` sequentially on the
//! connection's own thread.
//!
//! - **Frame handling**: all HTTP/2 frame types (DATA, HEADERS, PRIORITY,
//!   RST_STREAM, SETTINGS, PING, GOAWAY, WINDOW_UPDATE, CONTINUATION)
//! - **HPACK compression**: header (de)compression via the `hpack` crate
//! - **Flow control**: connection- and stream-level window management
//! - **Settings exchange**: initial connection setup, including h2c
//!   upgrade seeded from a decoded `HTTP2-Settings` header

pub mod client;
pub mod server;
pub mod session;
pub mod stream;
pub mod frames;
pub mod flow_control;
pub mod settings;
pub mod error;
pub mod codec;

pub use client::{H2Client, H2ClientBuilder};
pub use server::{H2Server, H2ServerBuilder, H2Request};
pub use session::UpgradeSeed;
pub use stream::{StreamId, StreamState, H2Stream};
pub use frames::{Frame, FrameType, FrameFlags, DataFrame, HeadersFrame, SettingsFrame};
pub use settings::{Settings, SettingsBuilder};
pub use error::{Error, ErrorCode, Result};

/// HTTP/2 connection preface that must be sent by clients
///
/// From RFC 7540 Section 3.5:
/// "PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n"
pub const CONNECTION_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Default initial window size (65535 bytes)
pub const DEFAULT_INITIAL_WINDOW_SIZE: u32 = 65535;

/// Default maximum frame size (16384 bytes)
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16384;

/// Default header table size (4096 bytes)
pub const DEFAULT_HEADER_TABLE_SIZE: u32 = 4096;

/// Maximum stream ID value (2^31 - 1)
pub const MAX_STREAM_ID: u32 = 0x7FFFFFFF;

/// Stream ID 0 (connection-level)
pub const CONNECTION_STREAM_ID: u32 = 0;
