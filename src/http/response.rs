//! Response object (§3, §4.4, §4.5).
//!
//! `Response` is protocol-agnostic the same way `Request` is: it is built
//! on top of a `ProtocolStream`, the "abstract stream capability" from
//! §9's design notes, implemented once for HTTP/1 (`http1::Http1Stream`)
//! and once for HTTP/2 (`h2::session::H2StreamHandle`). Everything above
//! that trait (status/headers/cookies bookkeeping, the lazy body writer,
//! compression/chunked wrapping, finalize) is identical for both.

use super::cookie::SetCookie;
use super::filters::{ChunkedBodyWriter, ContentEncoder, CountingWriter, NullSink};
use super::options::SessionOptions;
use super::session_store::{
    Session, SessionStore, SESSION_COOKIE_NAME, SESSION_COOKIE_PATH_KEY, SESSION_COOKIE_SECURE_KEY,
};
use super::{Error, Headers, Result, Status, Version};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

/// The capability a transport must provide so `Response` can drive it
/// without knowing whether it is an HTTP/1 connection or one stream of an
/// HTTP/2 session. `Write` carries raw body bytes once headers are on the
/// wire (already run through whatever filter chain `Response` built).
pub trait ProtocolStream: Write + Send {
    /// HTTP/2 emits headers through HPACK, not as a textual status line;
    /// when this is true `Response` skips building a `Transfer-Encoding:
    /// chunked` header and never installs a chunked filter (§4.4).
    fn is_http2(&self) -> bool {
        false
    }

    /// Emit the status line (or HTTP/2 header block) and headers. Called
    /// exactly once, right before the first body byte (or at
    /// finalization for an empty body).
    fn write_response_headers(&mut self, status: Status, reason: &str, headers: &Headers) -> Result<()>;

    /// Flush/close this stream. For HTTP/1 this flushes the transport;
    /// for HTTP/2 this ends the stream (`END_STREAM` if not already
    /// sent).
    fn finish_stream(&mut self) -> Result<()>;

    /// Block until the peer closes the underlying connection, or the
    /// timeout elapses (§4.4 `waitForConnectionClose`).
    fn wait_for_close(&mut self, timeout: Duration) -> Result<()>;
}

enum ChunkedOrDirect<T: Write> {
    Direct(CountingWriter<T>),
    Chunked(ChunkedBodyWriter<CountingWriter<T>>),
}

impl<T: Write> Write for ChunkedOrDirect<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ChunkedOrDirect::Direct(w) => w.write(buf),
            ChunkedOrDirect::Chunked(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ChunkedOrDirect::Direct(w) => w.flush(),
            ChunkedOrDirect::Chunked(w) => w.flush(),
        }
    }
}

impl<T: Write> ChunkedOrDirect<T> {
    fn into_counting(self) -> Result<CountingWriter<T>> {
        match self {
            ChunkedOrDirect::Direct(w) => Ok(w),
            ChunkedOrDirect::Chunked(mut w) => {
                w.finish()?;
                Ok(w.into_inner())
            }
        }
    }
}

enum BodyWriterState {
    /// HEAD / 304-style: headers are emitted but every body write is
    /// discarded (§4.4 "For HEAD responses").
    Head(NullSink),
    Streaming(ContentEncoder<ChunkedOrDirect<Box<dyn ProtocolStream>>>),
}

pub struct Response {
    version: Version,
    status: Status,
    reason_override: Option<String>,
    headers: Headers,
    cookies: Vec<SetCookie>,
    header_written: bool,
    is_head_response: bool,
    declared_content_length: Option<u64>,
    bytes_written: u64,
    length_exceeded: bool,
    transport: Option<Box<dyn ProtocolStream>>,
    body_writer: Option<BodyWriterState>,
    is_tls: bool,
    session_store: Option<Arc<dyn SessionStore>>,
    session: Option<Session>,
    terminated_session_id: Option<String>,
}

impl Response {
    pub fn new(transport: Box<dyn ProtocolStream>, version: Version, is_head_response: bool) -> Self {
        Response {
            version,
            status: Status::OK,
            reason_override: None,
            headers: Headers::new(),
            cookies: Vec::new(),
            header_written: false,
            is_head_response,
            declared_content_length: None,
            bytes_written: 0,
            length_exceeded: false,
            transport: Some(transport),
            body_writer: None,
            is_tls: false,
            session_store: None,
            session: None,
            terminated_session_id: None,
        }
    }

    /// Sets the default for `start_session`'s `Secure` attribute to
    /// whether this connection is TLS (§4.4: default secure matches
    /// whether the request arrived over TLS). Called by `dispatch_request`
    /// right before the handler runs.
    pub fn set_is_tls(&mut self, is_tls: bool) {
        self.is_tls = is_tls;
    }

    /// Gives `start_session`/`terminate_session` a store to create and
    /// destroy sessions in. Called by `dispatch_request` before the
    /// handler runs.
    pub fn attach_session_store(&mut self, store: Arc<dyn SessionStore>) {
        self.session_store = Some(store);
    }

    /// Attaches a session already loaded from the request's cookie, so
    /// `terminate_session` can end it without the handler having called
    /// `start_session` itself.
    pub fn attach_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    /// ID of the session `terminate_session` last destroyed, if any.
    /// `dispatch_request` checks this before saving the request's own
    /// (stale) copy of a session back to the store, so a handler's
    /// `terminate_session` call can't be undone by that save-back.
    pub fn terminated_session_id(&self) -> Option<&str> {
        self.terminated_session_id.as_deref()
    }

    pub fn is_http2(&self) -> bool {
        self.transport.as_ref().map(|t| t.is_http2()).unwrap_or(false)
    }

    pub fn header_written(&self) -> bool {
        self.header_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn length_exceeded(&self) -> bool {
        self.length_exceeded
    }

    fn assert_mutable(&self) {
        debug_assert!(
            !self.header_written,
            "mutating Response after headers were written is a programming error"
        );
        if self.header_written {
            tracing::warn!("Response mutated after headerWritten; change will not reach the wire");
        }
    }

    pub fn set_status(&mut self, status: Status) {
        self.assert_mutable();
        self.status = status;
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.assert_mutable();
        self.reason_override = Some(reason.into());
    }

    fn reason(&self) -> &str {
        self.reason_override
            .as_deref()
            .unwrap_or_else(|| self.status.reason_phrase())
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        self.assert_mutable();
        &mut self.headers
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn set_cookie(&mut self, cookie: SetCookie) {
        self.assert_mutable();
        self.cookies.push(cookie);
    }

    /// `startSession(path, options)`: create a session via the attached
    /// store, remember `$sessionCookiePath`/`$sessionCookieSecure` on it,
    /// and queue the `Set-Cookie` that carries its ID back to the client.
    /// Default `Secure` follows whether this connection is TLS; `options`
    /// can force it either way via `SECURE`/`NO_SECURE` (§4.4).
    pub fn start_session(&mut self, path: impl Into<String>, options: SessionOptions) -> Result<&mut Session> {
        self.assert_mutable();
        let store = self.session_store.clone().ok_or_else(|| {
            Error::Protocol("start_session called with no SessionStore attached to this response".to_string())
        })?;

        let path = path.into();
        let secure = if options.is_set(SessionOptions::NO_SECURE) {
            false
        } else if options.is_set(SessionOptions::SECURE) {
            true
        } else {
            self.is_tls
        };
        let http_only = options.is_set(SessionOptions::HTTP_ONLY);

        let mut session = store.create();
        session.set(SESSION_COOKIE_PATH_KEY, path.clone());
        session.set(SESSION_COOKIE_SECURE_KEY, secure.to_string());
        store.save(session.clone());

        self.cookies.push(
            SetCookie::new(SESSION_COOKIE_NAME, session.id.clone())
                .path(path)
                .secure(secure)
                .http_only(http_only),
        );

        self.session = Some(session);
        Ok(self.session.as_mut().unwrap())
    }

    /// `terminateSession()`: destroy the currently attached session
    /// (loaded from the request's cookie, or created by `start_session`)
    /// and queue a deletion cookie matching its `Path`/`Secure` (§4.4).
    /// A no-op if no session is attached.
    pub fn terminate_session(&mut self) {
        self.assert_mutable();
        let Some(session) = self.session.take() else {
            return;
        };
        if let Some(store) = &self.session_store {
            store.destroy(&session.id);
        }
        self.cookies.push(
            SetCookie::delete(SESSION_COOKIE_NAME)
                .path(session.cookie_path())
                .secure(session.cookie_secure()),
        );
        self.terminated_session_id = Some(session.id);
    }

    fn finalize_header_block(&mut self) {
        for cookie in &self.cookies {
            self.headers.insert("Set-Cookie", cookie.to_header_value());
        }
    }

    /// Build the body writer on first access (§4.4). Every call after the
    /// first returns the same underlying chain.
    fn ensure_body_writer(&mut self) -> Result<()> {
        if self.body_writer.is_some() {
            return Ok(());
        }

        self.finalize_header_block();

        if self.is_head_response {
            self.write_header_line()?;
            self.body_writer = Some(BodyWriterState::Head(NullSink));
            return Ok(());
        }

        let content_length = self
            .headers
            .get("Content-Length")
            .and_then(|v| v.parse::<u64>().ok());
        let encoding = self.headers.get("Content-Encoding").map(|s| s.to_string());
        let is_http2 = self.is_http2();

        let use_chunked = !is_http2 && (content_length.is_none() || encoding.is_some());

        if use_chunked {
            self.headers.remove("Content-Length");
            if !is_http2 {
                self.headers.insert("Transfer-Encoding", "chunked");
            }
        }
        self.declared_content_length = if use_chunked { None } else { content_length };

        self.write_header_line()?;

        let transport = self
            .transport
            .take()
            .expect("transport taken twice before ensure_body_writer completed");
        let counting = CountingWriter::new(transport);
        let inner = if use_chunked && !is_http2 {
            ChunkedOrDirect::Chunked(ChunkedBodyWriter::new(counting))
        } else {
            ChunkedOrDirect::Direct(counting)
        };

        let encoder = match encoding.as_deref() {
            Some("gzip") => ContentEncoder::gzip(inner),
            Some("deflate") => ContentEncoder::deflate(inner),
            _ => ContentEncoder::identity(inner),
        };

        self.body_writer = Some(BodyWriterState::Streaming(encoder));
        Ok(())
    }

    fn write_header_line(&mut self) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        let status = self.status;
        let reason = self.reason().to_string();
        let transport = self
            .transport
            .as_mut()
            .expect("transport missing before headers written");
        transport.write_response_headers(status, &reason, &self.headers)?;
        self.header_written = true;
        Ok(())
    }

    fn write_body_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_body_writer()?;
        if let Some(limit) = self.declared_content_length {
            if self.bytes_written + data.len() as u64 > limit {
                self.length_exceeded = true;
                return Err(Error::Protocol(
                    "response body exceeded declared Content-Length".to_string(),
                ));
            }
        }
        match self.body_writer.as_mut().unwrap() {
            BodyWriterState::Head(sink) => {
                sink.write_all(data).map_err(Error::Io)?;
            }
            BodyWriterState::Streaming(w) => {
                w.write_all(data).map_err(Error::Io)?;
            }
        }
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    /// `writeBody(bytes[, content_type])`: sets `Content-Type` and
    /// `Content-Length`, then writes through the body writer.
    pub fn write_body(&mut self, body: &[u8], content_type: Option<&str>) -> Result<()> {
        self.assert_mutable();
        self.headers.insert(
            "Content-Type",
            content_type.unwrap_or("text/plain; charset=UTF-8"),
        );
        self.headers.insert("Content-Length", body.len().to_string());
        self.write_body_bytes(body)
    }

    /// `writeBody(stream)`: streams without setting a known length
    /// (forces chunked framing on HTTP/1).
    pub fn write_body_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.write_body_bytes(chunk)
    }

    /// `writeJsonBody`: serializes JSON; `allow_chunked = false` performs a
    /// length-measuring pre-pass so `Content-Length` can be set.
    pub fn write_json_body(&mut self, value: &serde_json::Value, allow_chunked: bool) -> Result<()> {
        self.assert_mutable();
        let body = serde_json::to_vec(value)
            .map_err(|e| Error::Protocol(format!("failed to serialize JSON body: {}", e)))?;
        self.headers.insert("Content-Type", "application/json");
        if !allow_chunked {
            self.headers.insert("Content-Length", body.len().to_string());
        }
        self.write_body_bytes(&body)
    }

    /// `writeVoidBody`: emits headers with no body (HEAD / 304-style).
    /// Forbids a pre-set `Content-Length`/`Transfer-Encoding` unless this
    /// is a HEAD request.
    pub fn write_void_body(&mut self) -> Result<()> {
        if !self.is_head_response {
            self.headers.remove("Content-Length");
            self.headers.remove("Transfer-Encoding");
        }
        self.ensure_body_writer()
    }

    /// `redirect(url, status)`: sets `Location`, sends the fixed body.
    pub fn redirect(&mut self, url: &str, status: Status) -> Result<()> {
        self.assert_mutable();
        self.status = status;
        self.headers.insert("Location", url);
        self.write_body(b"redirecting...", Some("text/plain; charset=UTF-8"))
    }

    /// `writeRawBody`: writes directly to the transport, bypassing
    /// chunked/compression filters but still counted; caller owns
    /// headers.
    pub fn write_raw_body(&mut self, data: &[u8]) -> Result<()> {
        self.write_header_line()?;
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| Error::Protocol("transport unavailable for raw body write".to_string()))?;
        transport.write_all(data).map_err(Error::Io)?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    /// `switchProtocol(name)`: emits `101 Switching Protocols` with
    /// `Upgrade: <name>` and no body; the caller is expected to take over
    /// the underlying connection afterward.
    pub fn switch_protocol(&mut self, name: &str) -> Result<()> {
        self.assert_mutable();
        self.status = Status::new(101).unwrap();
        self.headers.insert("Upgrade", name);
        self.headers.insert("Connection", "Upgrade");
        self.write_header_line()
    }

    pub fn wait_for_connection_close(&mut self, timeout: Duration) -> Result<()> {
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| Error::Protocol("transport unavailable".to_string()))?;
        transport.wait_for_close(timeout)
    }

    /// Finalization (§4.5): unwind the filter chain in order, flush/close
    /// the transport. Always safe to call more than once.
    pub fn finalize(&mut self) -> Result<()> {
        if !self.header_written {
            self.ensure_body_writer()?;
        }

        let transport = match self.body_writer.take() {
            None => self.transport.take(),
            Some(BodyWriterState::Head(_)) => self.transport.take(),
            Some(BodyWriterState::Streaming(encoder)) => match encoder.finish().map_err(Error::Io) {
                Ok(inner) => match inner.into_counting() {
                    Ok(counting) => {
                        self.bytes_written = self.bytes_written.max(counting.bytes_written());
                        Some(counting.into_inner())
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "error finalizing chunked body writer");
                        None
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "error finalizing response body encoder");
                    None
                }
            },
        };

        if let Some(mut transport) = transport {
            if let Some(limit) = self.declared_content_length {
                if self.bytes_written < limit {
                    self.length_exceeded = true;
                }
            }
            if let Err(e) = transport.finish_stream() {
                tracing::warn!(error = %e, "error finalizing response transport");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingStream(Arc<Mutex<Vec<u8>>>);

    impl Write for RecordingStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl ProtocolStream for RecordingStream {
        fn write_response_headers(&mut self, status: Status, reason: &str, headers: &Headers) -> Result<()> {
            let mut line = format!("HTTP/1.1 {} {}\r\n", status.code(), reason);
            for (name, value) in headers.iter() {
                line.push_str(&format!("{}: {}\r\n", name, value));
            }
            line.push_str("\r\n");
            self.write_all(line.as_bytes()).map_err(Error::Io)
        }
        fn finish_stream(&mut self) -> Result<()> {
            Ok(())
        }
        fn wait_for_close(&mut self, _timeout: Duration) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_body_sets_length_and_type() {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let stream = RecordingStream(buf.clone());
        let mut resp = Response::new(Box::new(stream), Version::Http11, false);
        resp.write_body(b"hello", None).unwrap();
        resp.finalize().unwrap();

        let written = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert!(written.contains("Content-Length: 5"));
        assert!(written.contains("text/plain"));
        assert!(written.ends_with("hello"));
    }

    #[test]
    fn unset_length_uses_chunked_encoding() {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let stream = RecordingStream(buf.clone());
        let mut resp = Response::new(Box::new(stream), Version::Http11, false);
        resp.write_body_chunk(b"abc").unwrap();
        resp.write_body_chunk(b"def").unwrap();
        resp.finalize().unwrap();

        let written = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert!(written.contains("Transfer-Encoding: chunked"));
        assert!(written.contains("3\r\nabc\r\n"));
        assert!(written.contains("3\r\ndef\r\n"));
        assert!(written.contains("0\r\n\r\n"));
    }

    #[test]
    fn head_response_discards_body() {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let stream = RecordingStream(buf.clone());
        let mut resp = Response::new(Box::new(stream), Version::Http11, true);
        resp.headers_mut().insert("Content-Length", "5");
        resp.write_void_body().unwrap();
        resp.finalize().unwrap();

        let written = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert!(written.ends_with("\r\n\r\n"));
    }

    #[test]
    fn start_session_sets_cookie_and_store_entry() {
        use super::super::session_store::InMemorySessionStore;

        let buf = Arc::new(Mutex::new(Vec::new()));
        let stream = RecordingStream(buf.clone());
        let mut resp = Response::new(Box::new(stream), Version::Http11, false);
        resp.set_is_tls(true);
        let store = InMemorySessionStore::new();
        resp.attach_session_store(store.clone());

        let session = resp.start_session("/app", SessionOptions::default()).unwrap();
        session.set("user", "alice");
        let session_id = session.id.clone();
        resp.write_void_body().unwrap();
        resp.finalize().unwrap();

        let written = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert!(written.contains(&format!("session_id={}", session_id)));
        assert!(written.contains("Path=/app"));
        assert!(written.contains("Secure"));
        assert!(written.contains("HttpOnly"));

        let stored = store.load(&session_id).unwrap();
        assert_eq!(stored.get("user"), None); // start_session saves before the handler mutates it
    }

    #[test]
    fn terminate_session_clears_cookie_and_destroys_entry() {
        use super::super::session_store::InMemorySessionStore;

        let buf = Arc::new(Mutex::new(Vec::new()));
        let stream = RecordingStream(buf.clone());
        let mut resp = Response::new(Box::new(stream), Version::Http11, false);
        let store = InMemorySessionStore::new();
        let session = store.create();
        let session_id = session.id.clone();
        resp.attach_session_store(store.clone());
        resp.attach_session(session);

        resp.terminate_session();
        resp.write_void_body().unwrap();
        resp.finalize().unwrap();

        let written = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert!(written.contains("Max-Age=0"));
        assert!(store.load(&session_id).is_none());
        assert_eq!(resp.terminated_session_id(), Some(session_id.as_str()));
    }

    #[test]
    fn redirect_sets_location_and_body() {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let stream = RecordingStream(buf.clone());
        let mut resp = Response::new(Box::new(stream), Version::Http11, false);
        resp.redirect("/new", Status::new(302).unwrap()).unwrap();
        resp.finalize().unwrap();

        let written = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert!(written.contains("302 Found"));
        assert!(written.contains("Location: /new"));
        assert!(written.ends_with("redirecting..."));
    }
}
