//! Request object (§3, §4.3a).
//!
//! `Request` is protocol-agnostic: both the HTTP/1 handler (`http1.rs`) and
//! the HTTP/2 session (`h2/session.rs`) build one the same way, handing it
//! a boxed `Read` already assembled into the right filter chain (length
//! limit, chunked decode, timeout) for that protocol. Parsing options
//! (`ServerOptions`) are applied once, right after construction, by
//! `dispatch::dispatch_request`.

use super::cookie::CookieJar;
use super::options::ServerOptions;
use super::tls::CertInfo;
use super::{Error, Headers, Method, Result, Version};
use crate::http::session_store::Session;
use std::io::Read;
use std::net::SocketAddr;
use std::time::Instant;

/// A single urlencoded/multipart form field.
#[derive(Debug, Clone)]
pub struct FormField {
    pub name: String,
    pub value: String,
}

/// A single uploaded file part from a `multipart/form-data` body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field_name: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

pub struct Request {
    method: Method,
    raw_url: String,
    version: Version,
    headers: Headers,

    path: Option<String>,
    query: Option<String>,
    username: Option<String>,
    password: Option<String>,
    query_params: Vec<(String, String)>,
    cookies: CookieJar,
    json_body: Option<serde_json::Value>,
    form_fields: Vec<FormField>,
    uploaded_files: Vec<UploadedFile>,

    peer_addr: SocketAddr,
    tls: bool,
    client_cert: Option<CertInfo>,
    session: Option<Session>,
    created_at: Instant,

    body_reader: Option<Box<dyn Read + Send>>,
    body_consumed: bool,
}

impl Request {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        method: Method,
        raw_url: impl Into<String>,
        version: Version,
        headers: Headers,
        peer_addr: SocketAddr,
        tls: bool,
        client_cert: Option<CertInfo>,
        body_reader: Box<dyn Read + Send>,
    ) -> Self {
        Request {
            method,
            raw_url: raw_url.into(),
            version,
            headers,
            path: None,
            query: None,
            username: None,
            password: None,
            query_params: Vec::new(),
            cookies: CookieJar::new(),
            json_body: None,
            form_fields: Vec::new(),
            uploaded_files: Vec::new(),
            peer_addr,
            tls,
            client_cert,
            session: None,
            created_at: Instant::now(),
            body_reader: Some(body_reader),
            body_consumed: false,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn raw_url(&self) -> &str {
        &self.raw_url
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn query_params(&self) -> &[(String, String)] {
        &self.query_params
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn json_body(&self) -> Option<&serde_json::Value> {
        self.json_body.as_ref()
    }

    pub fn form_fields(&self) -> &[FormField] {
        &self.form_fields
    }

    pub fn uploaded_files(&self) -> &[UploadedFile] {
        &self.uploaded_files
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Peer address with `::ffff:`-mapped IPv4-in-IPv6 normalized to plain
    /// IPv4, per §4.3.
    pub fn normalized_peer_addr(&self) -> SocketAddr {
        match self.peer_addr {
            SocketAddr::V6(v6) => {
                if let Some(v4) = v6.ip().to_ipv4_mapped() {
                    SocketAddr::new(std::net::IpAddr::V4(v4), v6.port())
                } else {
                    self.peer_addr
                }
            }
            other => other,
        }
    }

    pub fn is_tls(&self) -> bool {
        self.tls
    }

    pub fn client_cert(&self) -> Option<&CertInfo> {
        self.client_cert.as_ref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Persistent iff (HTTP/1.1 and not `Connection: close`) or (HTTP/1.0
    /// and `Connection: keep-alive`); §9 Keep-alive parsing.
    pub fn wants_keep_alive(&self) -> bool {
        let connection = self.headers.get("Connection").unwrap_or("");
        match self.version {
            Version::Http11 => !connection.eq_ignore_ascii_case("close"),
            Version::Http10 => connection.eq_ignore_ascii_case("keep-alive"),
        }
    }

    pub fn expects_continue(&self) -> bool {
        self.headers
            .get("Expect")
            .map(|v| v.eq_ignore_ascii_case("100-continue"))
            .unwrap_or(false)
    }

    /// The lazily-constructed body reader (§4.3a). Returns the same
    /// object on every call; the second call onward yields whatever is
    /// left after the first consumer's reads.
    pub fn body_reader(&mut self) -> &mut (dyn Read + Send) {
        self.body_reader
            .as_mut()
            .expect("body reader taken without being replaced")
            .as_mut()
    }

    /// Read the entire body into memory. Used by `PARSE_FORM_BODY` /
    /// `PARSE_JSON_BODY` and by handlers that want the whole payload.
    pub fn read_body_to_end(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.body_reader()
            .read_to_end(&mut buf)
            .map_err(Error::Io)?;
        self.body_consumed = true;
        Ok(buf)
    }

    /// Drain any unread body so the transport is left aligned for the
    /// next request on this connection (§4.3, "then drain any unread
    /// request body").
    pub fn drain_body(&mut self) -> Result<()> {
        if self.body_consumed {
            return Ok(());
        }
        let mut sink = [0u8; 8192];
        loop {
            let n = self.body_reader().read(&mut sink).map_err(Error::Io)?;
            if n == 0 {
                break;
            }
        }
        self.body_consumed = true;
        Ok(())
    }

    pub fn apply_url_parsing(&mut self, options: ServerOptions) {
        if !options.is_set(ServerOptions::PARSE_URL) {
            return;
        }
        let (path_and_user, query) = match self.raw_url.split_once('?') {
            Some((p, q)) => (p, Some(q.to_string())),
            None => (self.raw_url.as_str(), None),
        };
        self.path = Some(url_decode(path_and_user));
        self.query = query;

        if let Some(auth) = self.headers.get("Authorization") {
            if let Some(rest) = auth.strip_prefix("Basic ") {
                if let Ok(decoded) = base64::Engine::decode(
                    &base64::engine::general_purpose::STANDARD,
                    rest.trim(),
                ) {
                    if let Ok(text) = String::from_utf8(decoded) {
                        if let Some((user, pass)) = text.split_once(':') {
                            self.username = Some(user.to_string());
                            self.password = Some(pass.to_string());
                        }
                    }
                }
            }
        }

        if options.is_set(ServerOptions::PARSE_QUERY_STRING) {
            if let Some(q) = &self.query {
                self.query_params = parse_form_urlencoded(q);
            }
        }
    }

    pub fn apply_cookie_parsing(&mut self, options: ServerOptions) {
        if !options.is_set(ServerOptions::PARSE_COOKIES) {
            return;
        }
        if let Some(header) = self.headers.get("Cookie") {
            self.cookies = CookieJar::parse(header);
        }
    }

    /// Drains and parses the body as `application/x-www-form-urlencoded`
    /// or `multipart/form-data` when `PARSE_FORM_BODY` is set.
    pub fn apply_form_body_parsing(&mut self, options: ServerOptions) -> Result<()> {
        if !options.is_set(ServerOptions::PARSE_FORM_BODY) {
            return Ok(());
        }
        let content_type = self.headers.get("Content-Type").unwrap_or("").to_string();

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let body = self.read_body_to_end()?;
            let body_str = String::from_utf8_lossy(&body);
            self.form_fields = parse_form_urlencoded(&body_str)
                .into_iter()
                .map(|(name, value)| FormField { name, value })
                .collect();
        } else if content_type.starts_with("multipart/form-data")
            && options.is_set(ServerOptions::PARSE_MULTIPART_BODY)
        {
            if let Some(boundary) = content_type
                .split(';')
                .find_map(|part| part.trim().strip_prefix("boundary="))
            {
                let body = self.read_body_to_end()?;
                let (fields, files) = parse_multipart(&body, boundary);
                self.form_fields = fields;
                self.uploaded_files = files;
            }
        }
        Ok(())
    }

    /// Drains and parses the body as JSON when `PARSE_JSON_BODY` is set
    /// and `Content-Type` is `application/json`.
    pub fn apply_json_body_parsing(&mut self, options: ServerOptions) -> Result<()> {
        if !options.is_set(ServerOptions::PARSE_JSON_BODY) {
            return Ok(());
        }
        let is_json = self
            .headers
            .get("Content-Type")
            .map(|ct| ct.starts_with("application/json"))
            .unwrap_or(false);
        if !is_json {
            return Ok(());
        }
        let body = self.read_body_to_end()?;
        if body.is_empty() {
            return Ok(());
        }
        self.json_body = Some(
            serde_json::from_slice(&body)
                .map_err(|e| Error::Parse(format!("invalid JSON body: {}", e)))?,
        );
        Ok(())
    }
}

fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                if let Some(h) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    out.push(h);
                    i += 3;
                    continue;
                }
                out.push(bytes[i]);
                i += 1;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn parse_form_urlencoded(s: &str) -> Vec<(String, String)> {
    s.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (url_decode(k), url_decode(v)),
            None => (url_decode(pair), String::new()),
        })
        .collect()
}

/// Minimal multipart/form-data splitter: enough for form fields and
/// single-part file uploads, not a general MIME parser.
fn parse_multipart(body: &[u8], boundary: &str) -> (Vec<FormField>, Vec<UploadedFile>) {
    let delimiter = format!("--{}", boundary);
    let mut fields = Vec::new();
    let mut files = Vec::new();

    for part in split_on(body, delimiter.as_bytes()) {
        if part.is_empty() || part == b"--\r\n" || part == b"--" {
            continue;
        }
        let part = part.strip_prefix(b"\r\n").unwrap_or(part);
        let Some(header_end) = find_subslice(part, b"\r\n\r\n") else {
            continue;
        };
        let header_block = &part[..header_end];
        let mut content = &part[header_end + 4..];
        if let Some(stripped) = content.strip_suffix(b"\r\n") {
            content = stripped;
        }

        let header_text = String::from_utf8_lossy(header_block);
        let mut name = None;
        let mut filename = None;
        let mut content_type = None;
        for line in header_text.lines() {
            if let Some(rest) = line
                .to_ascii_lowercase()
                .starts_with("content-disposition")
                .then(|| line)
            {
                for attr in rest.split(';') {
                    let attr = attr.trim();
                    if let Some(v) = attr.strip_prefix("name=\"") {
                        name = v.strip_suffix('"').map(|s| s.to_string());
                    } else if let Some(v) = attr.strip_prefix("filename=\"") {
                        filename = v.strip_suffix('"').map(|s| s.to_string());
                    }
                }
            } else if line.to_ascii_lowercase().starts_with("content-type:") {
                content_type = line.splitn(2, ':').nth(1).map(|s| s.trim().to_string());
            }
        }

        let Some(name) = name else { continue };
        match filename {
            Some(file_name) => files.push(UploadedFile {
                field_name: name,
                file_name,
                content_type,
                data: content.to_vec(),
            }),
            None => fields.push(FormField {
                name,
                value: String::from_utf8_lossy(content).into_owned(),
            }),
        }
    }

    (fields, files)
}

fn split_on<'a>(haystack: &'a [u8], needle: &[u8]) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let mut rest = haystack;
    while let Some(pos) = find_subslice(rest, needle) {
        parts.push(&rest[..pos]);
        rest = &rest[pos + needle.len()..];
    }
    parts.push(rest);
    parts
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::net::{IpAddr, Ipv4Addr};

    fn test_request(raw_url: &str, headers: Headers) -> Request {
        Request::new(
            Method::Get,
            raw_url,
            Version::Http11,
            headers,
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 12345),
            false,
            None,
            Box::new(Cursor::new(Vec::<u8>::new())),
        )
    }

    #[test]
    fn parses_path_and_query() {
        let mut req = test_request("/a/b?x=1&y=two%20words", Headers::new());
        req.apply_url_parsing(ServerOptions::default());
        assert_eq!(req.path(), Some("/a/b"));
        assert_eq!(req.query(), Some("x=1&y=two%20words"));
        assert_eq!(req.query_param("y"), Some("two words"));
    }

    #[test]
    fn parses_cookies() {
        let mut headers = Headers::new();
        headers.insert("Cookie", "a=1; b=2");
        let mut req = test_request("/", headers);
        req.apply_cookie_parsing(ServerOptions::default());
        assert_eq!(req.cookies().get("a"), Some("1"));
        assert_eq!(req.cookies().get("b"), Some("2"));
    }

    #[test]
    fn keep_alive_defaults_per_version() {
        let req11 = test_request("/", Headers::new());
        assert!(req11.wants_keep_alive());

        let req10 = Request::new(
            Method::Get,
            "/",
            Version::Http10,
            Headers::new(),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 1),
            false,
            None,
            Box::new(Cursor::new(Vec::<u8>::new())),
        );
        assert!(!req10.wants_keep_alive());
    }

    #[test]
    fn parses_json_body() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "application/json");
        let mut req = Request::new(
            Method::Post,
            "/",
            Version::Http11,
            headers,
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 1),
            false,
            None,
            Box::new(Cursor::new(br#"{"ok":true}"#.to_vec())),
        );
        req.apply_json_body_parsing(ServerOptions::default()).unwrap();
        assert_eq!(req.json_body().unwrap()["ok"], serde_json::json!(true));
    }

    #[test]
    fn parses_urlencoded_form_body() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "application/x-www-form-urlencoded");
        let mut req = Request::new(
            Method::Post,
            "/",
            Version::Http11,
            headers,
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 1),
            false,
            None,
            Box::new(Cursor::new(b"a=1&b=two".to_vec())),
        );
        req.apply_form_body_parsing(ServerOptions::default()).unwrap();
        assert_eq!(req.form_fields().len(), 2);
        assert_eq!(req.form_fields()[0].name, "a");
        assert_eq!(req.form_fields()[1].value, "two");
    }
}
