//! HTTP/1.0 and HTTP/1.1 per-connection request loop (§4.3).
//!
//! `HttpSession<S>` has no buffered, peekable `Read` implementation (see
//! `session.rs`), so this module owns a small line reader of its own
//! rather than reusing `parser::RequestParser` (which eagerly buffers the
//! whole body into an older `HttpRequest`, at odds with the lazily
//! streamed body `Request` expects). The session is shared between the
//! header/body reader and the response writer through an `Arc<Mutex<_>>`
//! since `SessionOps` has no half-duplex split, the same trade the
//! teacher's `HttpServer` avoids only by never writing and reading
//! concurrently either.

use super::dispatch::dispatch_request;
use super::date::now_http_date;
use super::filters::{ChunkedBodyReader, LengthLimitedReader, TimeoutReader};
use super::h2::Settings;
use super::headers::Headers;
use super::message::{Method, Status, Version};
use super::registry::ServerContext;
use super::response::{ProtocolStream, Response};
use super::request::Request;
use super::session::{HttpSession, SessionOps};
use super::tls::CertInfo;
use super::{Error, Result};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Per-line limit for the request line and each header line (§4.3).
const MAX_LINE_LEN: usize = 4096;
const MAX_HEADER_BLOCK: usize = 64 * 1024;

/// What the connection driver should do once this loop returns.
pub enum ConnectionOutcome {
    /// Peer (or we) closed the connection; nothing more to do.
    Closed,
    /// The client asked to upgrade to h2c; the `101` response is already
    /// on the wire. The driver hands the raw session to `h2::session`,
    /// which replays `initial_request` as HTTP/2 stream 1.
    UpgradeToH2 {
        client_settings: Settings,
        initial_request: UpgradeRequest,
    },
}

/// The request that carried the h2c upgrade, captured so the HTTP/2
/// session can process it as stream 1 instead of discarding it.
pub struct UpgradeRequest {
    pub method: Method,
    pub raw_url: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

fn to_io_error(e: Error) -> io::Error {
    match e {
        Error::Io(io_err) => io_err,
        Error::Timeout => io::Error::new(io::ErrorKind::TimedOut, "read timed out"),
        Error::ConnectionClosed => io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"),
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}

/// Whatever bytes were already read past the header block, followed by
/// live reads from the session. The base of every body reader chain.
struct ResidualReader<S: SessionOps> {
    leftover: Vec<u8>,
    pos: usize,
    session: Arc<Mutex<HttpSession<S>>>,
}

impl<S: SessionOps> Read for ResidualReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.leftover.len() {
            let n = buf.len().min(self.leftover.len() - self.pos);
            buf[..n].copy_from_slice(&self.leftover[self.pos..self.pos + n]);
            self.pos += n;
            return Ok(n);
        }
        self.session.lock().unwrap().read(buf).map_err(to_io_error)
    }
}

/// Reads request lines off the session one at a time, keeping whatever
/// trails the header block so `ResidualReader` can pick it up for the
/// body.
struct HeadReader<S: SessionOps> {
    session: Arc<Mutex<HttpSession<S>>>,
    buf: Vec<u8>,
    pos: usize,
}

enum HeadError {
    /// Peer closed the connection before sending a byte of the next
    /// request; a normal end of a keep-alive connection.
    Eof,
    TooLarge,
    Malformed(String),
    Timeout,
}

impl From<Error> for HeadError {
    fn from(e: Error) -> Self {
        match e {
            Error::Timeout => HeadError::Timeout,
            Error::ConnectionClosed => HeadError::Eof,
            other => HeadError::Malformed(other.to_string()),
        }
    }
}

impl<S: SessionOps> HeadReader<S> {
    fn new(session: Arc<Mutex<HttpSession<S>>>) -> Self {
        HeadReader { session, buf: Vec::new(), pos: 0 }
    }

    fn fill(&mut self) -> std::result::Result<usize, HeadError> {
        let mut tmp = [0u8; 4096];
        let n = self.session.lock().unwrap().read(&mut tmp).map_err(HeadError::from)?;
        if n > 0 {
            self.buf.extend_from_slice(&tmp[..n]);
        }
        Ok(n)
    }

    /// Read one CRLF-terminated line, or `Ok(None)` if the peer closed the
    /// connection before sending anything (clean keep-alive exit).
    fn read_line(&mut self, max_len: usize) -> std::result::Result<Option<String>, HeadError> {
        loop {
            if let Some(rel) = find_crlf(&self.buf[self.pos..]) {
                let line = String::from_utf8_lossy(&self.buf[self.pos..self.pos + rel]).into_owned();
                self.pos += rel + 2;
                return Ok(Some(line));
            }
            if self.buf.len() - self.pos > max_len {
                return Err(HeadError::TooLarge);
            }
            let had_bytes_before = !self.buf[self.pos..].is_empty();
            let n = self.fill()?;
            if n == 0 {
                if had_bytes_before {
                    return Err(HeadError::Malformed("connection closed mid-request".to_string()));
                }
                return Ok(None);
            }
        }
    }

    fn into_residual(self) -> ResidualReader<S> {
        ResidualReader { leftover: self.buf, pos: self.pos, session: self.session }
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

struct RequestHead {
    method: Method,
    raw_url: String,
    version: Version,
    headers: Headers,
}

fn parse_request_head<S: SessionOps>(
    reader: &mut HeadReader<S>,
) -> std::result::Result<Option<RequestHead>, HeadError> {
    let line = match reader.read_line(MAX_LINE_LEN)? {
        Some(l) => l,
        None => return Ok(None),
    };
    let mut parts = line.splitn(3, ' ');
    let (method_str, raw_url, version_str) = match (parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(u), Some(v)) => (m, u, v),
        _ => return Err(HeadError::Malformed(format!("malformed request line: {}", line))),
    };
    let method = Method::from_str(method_str).map_err(|e| HeadError::Malformed(e.to_string()))?;
    let version = Version::from_str(version_str).map_err(|e| HeadError::Malformed(e.to_string()))?;

    let mut headers = Headers::new();
    let mut total = 0usize;
    loop {
        let line = reader
            .read_line(MAX_LINE_LEN)?
            .ok_or_else(|| HeadError::Malformed("connection closed while reading headers".to_string()))?;
        if line.is_empty() {
            break;
        }
        total += line.len() + 2;
        if total > MAX_HEADER_BLOCK {
            return Err(HeadError::TooLarge);
        }
        let (name, value) = Headers::parse_header_line(&line).map_err(|e| HeadError::Malformed(e.to_string()))?;
        headers.insert(name, value);
    }

    Ok(Some(RequestHead { method, raw_url: raw_url.to_string(), version, headers }))
}

/// `ProtocolStream` for an HTTP/1 connection: a plain status line and
/// header block over the shared session.
struct Http1Stream<S: SessionOps> {
    session: Arc<Mutex<HttpSession<S>>>,
    version: Version,
}

impl<S: SessionOps> Write for Http1Stream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.session.lock().unwrap().write(buf).map_err(to_io_error)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: SessionOps + Send + 'static> ProtocolStream for Http1Stream<S> {
    fn write_response_headers(&mut self, status: Status, reason: &str, headers: &Headers) -> Result<()> {
        let mut line = format!("{} {} {}\r\n", self.version.as_str(), status.code(), reason);
        for (name, value) in headers.iter() {
            line.push_str(name);
            line.push_str(": ");
            line.push_str(value);
            line.push_str("\r\n");
        }
        line.push_str("\r\n");
        self.write_all(line.as_bytes()).map_err(Error::Io)
    }

    fn finish_stream(&mut self) -> Result<()> {
        Ok(())
    }

    fn wait_for_close(&mut self, timeout: Duration) -> Result<()> {
        let mut session = self.session.lock().unwrap();
        session.set_timeout(Some(timeout));
        let mut sink = [0u8; 256];
        loop {
            match session.read(&mut sink) {
                Ok(0) => return Ok(()),
                Ok(_) => continue,
                Err(Error::Timeout) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }
}

/// Decodes the `HTTP2-Settings` upgrade header (base64url, unpadded, RFC
/// 7540 §3.2.1) the same way `H2Server::recv_settings` decodes a SETTINGS
/// frame payload off the wire.
fn decode_http2_settings_header(value: &str) -> Option<Settings> {
    use base64::Engine;
    let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(value.trim()).ok()?;

    let mut settings = Settings::new();
    let mut pos = 0;
    while pos + 6 <= payload.len() {
        let id = u16::from_be_bytes([payload[pos], payload[pos + 1]]);
        let value = u32::from_be_bytes([payload[pos + 2], payload[pos + 3], payload[pos + 4], payload[pos + 5]]);
        match id {
            0x1 => settings.header_table_size = Some(value),
            0x2 => settings.enable_push = Some(value != 0),
            0x3 => settings.max_concurrent_streams = Some(value),
            0x4 => settings.initial_window_size = Some(value),
            0x5 => settings.max_frame_size = Some(value),
            0x6 => settings.max_header_list_size = Some(value),
            0x8 => settings.enable_connect_protocol = Some(value != 0),
            0x9 => settings.no_rfc7540_priorities = Some(value != 0),
            _ => {}
        }
        pos += 6;
    }
    Some(settings)
}

fn wants_h2c_upgrade(headers: &Headers, version: Version) -> bool {
    if version != Version::Http11 {
        return false;
    }
    let connection_mentions_upgrade = headers
        .get("Connection")
        .map(|v| v.split(',').any(|tok| tok.trim().eq_ignore_ascii_case("Upgrade")))
        .unwrap_or(false);
    let upgrade_is_h2c = headers.get("Upgrade").map(|v| v.eq_ignore_ascii_case("h2c")).unwrap_or(false);
    connection_mentions_upgrade && upgrade_is_h2c && headers.contains("HTTP2-Settings")
}

fn wants_keep_alive(headers: &Headers, version: Version) -> bool {
    let connection = headers.get("Connection").unwrap_or("");
    match version {
        Version::Http11 => !connection.eq_ignore_ascii_case("close"),
        Version::Http10 => connection.eq_ignore_ascii_case("keep-alive"),
    }
}

fn write_minimal_error<S: SessionOps>(session: &Arc<Mutex<HttpSession<S>>>, status: Status) {
    let body = format!("{} {}", status.code(), status.reason_phrase());
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\n{}",
        status.code(),
        status.reason_phrase(),
        body.len(),
        body
    );
    let _ = session.lock().unwrap().write(response.as_bytes());
}

fn reclaim<S: SessionOps>(session: Arc<Mutex<HttpSession<S>>>) -> S {
    match Arc::try_unwrap(session) {
        Ok(mutex) => mutex.into_inner().unwrap().into_inner(),
        Err(_) => unreachable!("all per-request Http1Stream/ResidualReader handles are dropped by now"),
    }
}

/// Build the lazily-read body for one request from its headers, chained
/// the way §4.3a describes: chunked decode (if any) wrapped by the
/// declared-or-configured length ceiling, wrapped by the wall-clock
/// deadline (if the context sets one).
fn build_body_reader<S: SessionOps + Send + 'static>(
    headers: &Headers,
    residual: ResidualReader<S>,
    max_body_size: u64,
    max_request_time: Duration,
    created_at: Instant,
) -> std::result::Result<Box<dyn Read + Send>, Status> {
    let is_chunked = headers
        .get("Transfer-Encoding")
        .map(|v| v.eq_ignore_ascii_case("chunked"))
        .unwrap_or(false);

    let limited: Box<dyn Read + Send> = if is_chunked {
        Box::new(LengthLimitedReader::new(ChunkedBodyReader::new(residual), max_body_size))
    } else if let Some(len) = headers.get("Content-Length") {
        let declared: u64 = len.parse().map_err(|_| Status::new(400).unwrap())?;
        if declared > max_body_size {
            return Err(Status::new(413).unwrap());
        }
        Box::new(LengthLimitedReader::new(residual, declared))
    } else {
        Box::new(io::empty())
    };

    if max_request_time.is_zero() {
        Ok(limited)
    } else {
        Ok(Box::new(TimeoutReader::new(limited, created_at, max_request_time)))
    }
}

/// Drive one HTTP/1 connection: repeat request/response until keep-alive
/// ends, the client upgrades to h2c, or the connection drops (§4.2 step
/// 5, §4.3).
pub fn run_connection<S, F>(
    session: HttpSession<S>,
    peer_addr: SocketAddr,
    is_tls: bool,
    client_cert: Option<CertInfo>,
    resolve_context: F,
) -> Result<(ConnectionOutcome, S)>
where
    S: SessionOps + Send + 'static,
    F: Fn(Option<&str>) -> Option<Arc<ServerContext>>,
{
    let session = Arc::new(Mutex::new(session));

    loop {
        let mut head_reader = HeadReader::new(session.clone());
        let head = match parse_request_head(&mut head_reader) {
            Ok(Some(h)) => h,
            Ok(None) => return Ok((ConnectionOutcome::Closed, reclaim(session))),
            Err(HeadError::Eof) | Err(HeadError::Timeout) => {
                return Ok((ConnectionOutcome::Closed, reclaim(session)));
            }
            Err(HeadError::TooLarge) => {
                write_minimal_error(&session, Status::new(431).unwrap());
                return Ok((ConnectionOutcome::Closed, reclaim(session)));
            }
            Err(HeadError::Malformed(_)) => {
                write_minimal_error(&session, Status::new(400).unwrap());
                return Ok((ConnectionOutcome::Closed, reclaim(session)));
            }
        };

        let host = head.headers.get("Host").map(|h| h.split(':').next().unwrap_or(h));
        let Some(context) = resolve_context(host) else {
            write_minimal_error(&session, Status::new(404).unwrap());
            return Ok((ConnectionOutcome::Closed, reclaim(session)));
        };

        if wants_h2c_upgrade(&head.headers, head.version) {
            let client_settings = head
                .headers
                .get("HTTP2-Settings")
                .and_then(decode_http2_settings_header)
                .unwrap_or_else(Settings::new);

            let max_body_size = context.settings.max_request_body_size;
            let residual = head_reader.into_residual();
            let mut body_reader = match build_body_reader(
                &head.headers,
                residual,
                max_body_size,
                Duration::ZERO,
                Instant::now(),
            ) {
                Ok(r) => r,
                Err(status) => {
                    write_minimal_error(&session, status);
                    return Ok((ConnectionOutcome::Closed, reclaim(session)));
                }
            };
            let mut body = Vec::new();
            let _ = body_reader.read_to_end(&mut body);

            let response_line = "HTTP/1.1 101 Switching Protocols\r\nConnection: Upgrade\r\nUpgrade: h2c\r\n\r\n";
            session.lock().unwrap().write(response_line.as_bytes())?;

            return Ok((
                ConnectionOutcome::UpgradeToH2 {
                    client_settings,
                    initial_request: UpgradeRequest {
                        method: head.method,
                        raw_url: head.raw_url,
                        headers: head.headers,
                        body,
                    },
                },
                reclaim(session),
            ));
        }

        if head.headers.get("Expect").map(|v| v.eq_ignore_ascii_case("100-continue")).unwrap_or(false)
            && head.version == Version::Http11
        {
            let _ = session.lock().unwrap().write(b"HTTP/1.1 100 Continue\r\n\r\n");
        }

        let keep_alive_requested = wants_keep_alive(&head.headers, head.version);
        let created_at = Instant::now();
        let residual = head_reader.into_residual();
        let body_reader = match build_body_reader(
            &head.headers,
            residual,
            context.settings.max_request_body_size,
            context.settings.max_request_time,
            created_at,
        ) {
            Ok(r) => r,
            Err(status) => {
                write_minimal_error(&session, status);
                return Ok((ConnectionOutcome::Closed, reclaim(session)));
            }
        };

        let mut request = Request::new(
            head.method,
            head.raw_url,
            head.version,
            head.headers,
            peer_addr,
            is_tls,
            client_cert.clone(),
            body_reader,
        );

        let transport = Http1Stream { session: session.clone(), version: head.version };
        let mut response = Response::new(Box::new(transport), head.version, head.method == Method::Head);

        response.headers_mut().insert("Server", context.settings.server_banner.clone());
        response.headers_mut().insert("Date", now_http_date());
        let keep_alive = keep_alive_requested;
        if head.version == Version::Http10 {
            if keep_alive {
                response.headers_mut().insert("Connection", "keep-alive");
            }
        } else if !keep_alive {
            response.headers_mut().insert("Connection", "close");
        }
        if keep_alive {
            response
                .headers_mut()
                .insert("Keep-Alive", format!("timeout={}", context.settings.keep_alive_timeout.as_secs()));
        }

        let outcome = dispatch_request(&mut request, &mut response, &context);

        if !keep_alive || outcome.force_close {
            return Ok((ConnectionOutcome::Closed, reclaim(session)));
        }
    }
}
