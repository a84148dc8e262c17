//! Error projection (§7): mapping handler errors onto the wire.
//!
//! `HttpStatusError` is the typed error a handler raises when it wants to
//! produce a specific status; anything else a handler returns is folded
//! into a generic 500 by `dispatch::dispatch_request`. `ErrorPageHandler`
//! lets an embedder override the default plaintext rendering with, say, a
//! branded HTML page.

use super::{Headers, Status};
use std::backtrace::Backtrace;
use std::fmt;

/// A typed error carrying the status it should produce on the wire.
///
/// `debug_message` is only ever rendered when `ServerOptions::ERROR_STACK_TRACES`
/// is set on the context that produced this error; `backtrace` is only
/// captured in that case too (`Backtrace::capture()` is not free, so the
/// engine never calls it otherwise).
#[derive(thiserror::Error)]
#[error("{status}: {message}")]
pub struct HttpStatusError {
    pub status: Status,
    pub message: String,
    pub debug_message: Option<String>,
    pub backtrace: Option<Backtrace>,
}

impl fmt::Debug for HttpStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpStatusError")
            .field("status", &self.status.code())
            .field("message", &self.message)
            .field("debug_message", &self.debug_message)
            .finish()
    }
}

impl HttpStatusError {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        HttpStatusError {
            status,
            message: message.into(),
            debug_message: None,
            backtrace: None,
        }
    }

    pub fn with_debug(mut self, debug_message: impl Into<String>) -> Self {
        self.debug_message = Some(debug_message.into());
        self
    }

    /// Capture a backtrace at the error site. Call only when
    /// `ServerOptions::ERROR_STACK_TRACES` is set on the owning context.
    pub fn capture_backtrace(mut self) -> Self {
        self.backtrace = Some(Backtrace::capture());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpStatusError::new(Status::new(400).unwrap(), message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        HttpStatusError::new(Status::new(404).unwrap(), message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        HttpStatusError::new(Status::new(413).unwrap(), message)
    }

    pub fn request_timeout(message: impl Into<String>) -> Self {
        HttpStatusError::new(Status::new(408).unwrap(), message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        HttpStatusError::new(Status::INTERNAL_SERVER_ERROR, message)
    }
}

/// Render the default plaintext error body (§7): `"<code> -
/// <text>\n\n<message>\n\nInternal error information:\n<debug>"`. Debug
/// text is included only when the caller passes one (i.e. when
/// `ERROR_STACK_TRACES` is set on the context).
pub fn default_error_body(error: &HttpStatusError, include_debug: bool) -> String {
    let mut body = format!(
        "{} - {}\n\n{}",
        error.status.code(),
        error.status.reason_phrase(),
        sanitize_utf8(&error.message)
    );

    if include_debug {
        if let Some(debug) = &error.debug_message {
            body.push_str("\n\nInternal error information:\n");
            body.push_str(&sanitize_utf8(debug));
        }
        if let Some(backtrace) = &error.backtrace {
            body.push_str("\n\n");
            body.push_str(&sanitize_utf8(&backtrace.to_string()));
        }
    }

    body
}

fn sanitize_utf8(s: &str) -> String {
    s.chars().filter(|c| !c.is_control() || *c == '\n').collect()
}

/// A handler-overridable error page renderer: given the error and whether
/// debug info may be shown, produce headers + body bytes to write. The
/// default is `default_error_body` rendered as `text/plain`.
pub type ErrorPageHandler = std::sync::Arc<
    dyn Fn(&HttpStatusError, bool) -> (Headers, Vec<u8>) + Send + Sync,
>;

pub fn default_error_page_handler() -> ErrorPageHandler {
    std::sync::Arc::new(|error, include_debug| {
        let body = default_error_body(error, include_debug).into_bytes();
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/plain; charset=UTF-8");
        headers.insert("Content-Length", body.len().to_string());
        (headers, body)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_default_body_without_debug() {
        let err = HttpStatusError::not_found("no such route").with_debug("route table: []");
        let body = default_error_body(&err, false);
        assert!(body.starts_with("404 - Not Found"));
        assert!(body.contains("no such route"));
        assert!(!body.contains("route table"));
    }

    #[test]
    fn renders_debug_info_when_requested() {
        let err = HttpStatusError::internal("boom").with_debug("panic at handler.rs:10");
        let body = default_error_body(&err, true);
        assert!(body.contains("Internal error information"));
        assert!(body.contains("panic at handler.rs:10"));
    }

    #[test]
    fn sanitizes_control_characters() {
        let err = HttpStatusError::bad_request("bad\x07bell");
        let body = default_error_body(&err, false);
        assert!(!body.contains('\x07'));
    }
}
