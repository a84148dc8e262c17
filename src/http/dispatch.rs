//! Protocol-agnostic request dispatch (§4.3 steps 5 onward, §4.6, §4.7, §7).
//!
//! `dispatch_request` is the one piece of request-handling logic shared by
//! the HTTP/1 per-connection loop (`http1.rs`) and each HTTP/2 stream
//! worker (`h2/session.rs`): apply parsing options, run the handler, map
//! whatever it returns (or panics with) onto a status, finalize the
//! response, and invoke access loggers. Everything protocol-specific
//! (reading the request line, writing the status line) already happened
//! by the time `Request`/`Response` reach here.

use super::error_page::{default_error_page_handler, HttpStatusError};
use super::filters::negotiate_response_encoding;
use super::options::ServerOptions;
use super::registry::ServerContext;
use super::request::Request;
use super::response::Response;
use super::Status;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// What the connection driver should do after this request finished.
pub struct DispatchOutcome {
    /// Honor the request's own keep-alive preference unless this forces
    /// a close (§4.3 "Keep-alive decision").
    pub force_close: bool,
}

/// Run one request through a context's handler and finalize the response.
/// Protocol-agnostic: `req`/`resp` are already bound to whatever
/// `ProtocolStream` the caller constructed.
pub fn dispatch_request(req: &mut Request, resp: &mut Response, context: &ServerContext) -> DispatchOutcome {
    let options = context.settings.options;
    resp.set_is_tls(req.is_tls());

    req.apply_url_parsing(options);
    req.apply_cookie_parsing(options);

    if options.is_set(ServerOptions::PARSE_FORM_BODY) {
        if let Err(e) = req.apply_form_body_parsing(options) {
            return fail_request(req, resp, context, HttpStatusError::bad_request(e.to_string()));
        }
    }
    if options.is_set(ServerOptions::PARSE_JSON_BODY) {
        if let Err(e) = req.apply_json_body_parsing(options) {
            return fail_request(req, resp, context, HttpStatusError::bad_request(e.to_string()));
        }
    }

    if let Some(store) = &context.settings.session_store {
        resp.attach_session_store(store.clone());
        if let Some(session_id) = req.cookies().get(super::session_store::SESSION_COOKIE_NAME) {
            if let Some(session) = store.load(session_id) {
                req.set_session(session.clone());
                resp.attach_session(session);
            }
        }
    }

    if context.settings.compression_enabled {
        if let Some(accept_encoding) = req.headers().get("Accept-Encoding") {
            if let Some(encoding) = negotiate_response_encoding(accept_encoding) {
                let name = match encoding {
                    super::filters::Encoding::Gzip => "gzip",
                    super::filters::Encoding::Deflate => "deflate",
                };
                resp.headers_mut().insert("Content-Encoding", name);
            }
        }
    }

    let handler_result = catch_unwind(AssertUnwindSafe(|| (context.handler)(req, resp)));

    let outcome = match handler_result {
        Ok(Ok(())) => {
            if !resp.header_written() {
                fail_request(req, resp, context, HttpStatusError::not_found("no response was written"))
            } else {
                DispatchOutcome { force_close: false }
            }
        }
        Ok(Err(status_error)) => fail_request(req, resp, context, status_error),
        Err(panic) => {
            let message = panic_message(&panic);
            tracing::error!(error = %message, "request handler panicked");
            fail_request(
                req,
                resp,
                context,
                HttpStatusError::internal("request handler panicked").with_debug(message),
            )
        }
    };

    if let Some(store) = &context.settings.session_store {
        if let Some(session) = req.session() {
            if resp.terminated_session_id() != Some(session.id.as_str()) {
                store.save(session.clone());
            }
        }
    }

    if let Err(e) = req.drain_body() {
        tracing::warn!(error = %e, "failed to drain request body before finalize");
    }
    if let Err(e) = resp.finalize() {
        tracing::warn!(error = %e, "error finalizing response");
    }

    for logger in &context.access_loggers {
        logger(req, resp);
    }

    let length_mismatch = resp.length_exceeded();
    DispatchOutcome {
        force_close: outcome.force_close || length_mismatch,
    }
}

/// Render `error` as the response, via the context's error-page handler if
/// one was configured and headers haven't gone out yet (§7). If headers
/// are already written, the error is only logged and keep-alive is
/// disabled for this connection.
fn fail_request(
    _req: &Request,
    resp: &mut Response,
    context: &ServerContext,
    error: HttpStatusError,
) -> DispatchOutcome {
    if resp.header_written() {
        tracing::warn!(status = error.status.code(), error = %error, "error after headers were written, closing connection");
        return DispatchOutcome { force_close: true };
    }

    let include_debug = context.settings.options.is_set(ServerOptions::ERROR_STACK_TRACES);
    let page_handler = context
        .settings
        .error_page_handler
        .clone()
        .unwrap_or_else(default_error_page_handler);
    let (headers, body) = page_handler(&error, include_debug);
    let content_type = headers.get("Content-Type").map(str::to_string);

    resp.set_status(error.status);
    for (name, value) in headers.iter() {
        if name.eq_ignore_ascii_case("Content-Type") || name.eq_ignore_ascii_case("Content-Length") {
            continue;
        }
        resp.headers_mut().insert(name, value);
    }
    if let Err(e) = resp.write_body(&body, content_type.as_deref()) {
        tracing::warn!(error = %e, "failed writing error page body");
        return DispatchOutcome { force_close: true };
    }

    DispatchOutcome {
        force_close: close_justifying(error.status),
    }
}

/// Status codes that always end the connection regardless of what the
/// request asked for (§4.3 keep-alive decision: "close-justifying
/// status").
fn close_justifying(status: Status) -> bool {
    matches!(status.code(), 400 | 408 | 413 | 431 | 500 | 497)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::listener::{create_test_request, create_test_response};
    use crate::http::registry::ServerSettings;
    use crate::http::Method;
    use std::sync::Arc;

    fn context_with_handler(
        handler: super::super::registry::Handler,
    ) -> Arc<ServerContext> {
        Arc::new(ServerContext {
            id: 1,
            settings: ServerSettings::new(),
            handler,
            access_loggers: Vec::new(),
        })
    }

    #[test]
    fn handler_writing_nothing_yields_404() {
        let context = context_with_handler(Arc::new(|_req, _resp| Ok(())));
        let mut req = create_test_request(Method::Get, "/missing", super::super::Headers::new(), Vec::new());
        let (mut resp, buffer) = create_test_response();
        let outcome = dispatch_request(&mut req, &mut resp, &context);
        assert!(!outcome.force_close);

        let written = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(written.contains("404"));
    }

    #[test]
    fn handler_status_error_renders_error_page() {
        let context = context_with_handler(Arc::new(|_req, _resp| {
            Err(HttpStatusError::bad_request("missing field"))
        }));
        let mut req = create_test_request(Method::Get, "/", super::super::Headers::new(), Vec::new());
        let (mut resp, buffer) = create_test_response();
        dispatch_request(&mut req, &mut resp, &context);

        let written = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(written.contains("400"));
        assert!(written.contains("missing field"));
    }

    #[test]
    fn panicking_handler_yields_500_and_is_caught() {
        let context = context_with_handler(Arc::new(|_req, _resp| {
            panic!("boom");
        }));
        let mut req = create_test_request(Method::Get, "/", super::super::Headers::new(), Vec::new());
        let (mut resp, buffer) = create_test_response();
        dispatch_request(&mut req, &mut resp, &context);

        let written = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(written.contains("500"));
    }
}
