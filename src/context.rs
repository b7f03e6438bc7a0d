//! Per-request state and the handler dispatch loop.
//!
//! # Lifecycle
//!
//! ```text
//! Idle (pooled) ──acquire──▶ Acquired ──run(chain)──▶ Dispatching
//!      ▲                     request bound             cursor 0..N
//!      │                                                    │
//!      └──────────── release: reset() ◀──── Completed / Aborted
//! ```
//!
//! # The cursor
//!
//! `index` is the position of the next handler to run. [`Context::next`] runs
//! handlers while `index < chain.len()`, bumping `index` before each call, so
//! a handler that calls `next()` itself runs the remainder of the chain and
//! then resumes; the outer loop finds the cursor at the end and stops.
//! [`Context::abort`] parks the cursor at [`ABORT_INDEX`], which no chain can
//! reach (registration caps chains below it), so every later `next()` is a
//! no-op.

use std::net::IpAddr;
use std::sync::Arc;

use http::header::{HeaderName, HeaderValue};
use http::{Extensions, StatusCode};

use crate::error::{ContextError, Errors};
use crate::handler::HandlersChain;
use crate::params::Params;
use crate::request::Request;
use crate::response::{body_allowed_for_status, ContentType, ResponseWriter};

/// Cursor value meaning "aborted". Chains must be strictly shorter.
pub const ABORT_INDEX: usize = (i8::MAX as usize) >> 1;

/// Everything one in-flight request owns.
///
/// Contexts are pooled. Every field is reset between requests; nothing a
/// handler leaves behind is visible to the next request served by the same
/// context.
#[derive(Debug)]
pub struct Context {
    pub(crate) request: Request,
    pub(crate) writer: ResponseWriter,
    pub(crate) params: Params,
    pub(crate) full_path: Option<Arc<str>>,
    handlers: Option<HandlersChain>,
    index: usize,
    errors: Errors,
    keys: Extensions,
}

impl Context {
    pub(crate) fn new(max_params: usize) -> Self {
        Self {
            request: Request::default(),
            writer: ResponseWriter::new(),
            params: Params::with_capacity(max_params),
            full_path: None,
            handlers: None,
            index: 0,
            errors: Errors::default(),
            keys: Extensions::new(),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.request = Request::default();
        self.writer.reset();
        self.params.clear();
        self.full_path = None;
        self.handlers = None;
        self.index = 0;
        self.errors.clear();
        self.keys.clear();
    }

    pub(crate) fn bind(&mut self, request: Request) {
        self.request = request;
    }

    /// Installs `chain` and runs it from the start.
    pub(crate) fn run(&mut self, chain: HandlersChain) {
        self.handlers = Some(chain);
        self.index = 0;
        self.next();
    }

    // ── Flow control ─────────────────────────────────────────────────────────

    /// Runs the pending handlers of the chain inside the calling handler.
    ///
    /// Only meaningful inside middleware:
    ///
    /// ```rust
    /// use gantry::Context;
    ///
    /// fn timing(ctx: &mut Context) {
    ///     let start = std::time::Instant::now();
    ///     ctx.next();                       // everything downstream runs here
    ///     let _elapsed = start.elapsed();   // then we resume
    /// }
    /// ```
    pub fn next(&mut self) {
        let Some(chain) = self.handlers.clone() else {
            return;
        };
        while self.index < chain.len() {
            let handler = &chain[self.index];
            self.index += 1;
            handler.call(self);
        }
    }

    /// Prevents pending handlers from running. The current handler finishes
    /// normally. Calling it again, or calling [`next`](Self::next)
    /// afterwards, changes nothing.
    pub fn abort(&mut self) {
        self.index = ABORT_INDEX;
    }

    /// Forces the status, flushes headers and aborts.
    ///
    /// An authentication middleware rejecting a request would call
    /// `ctx.abort_with_status(StatusCode::UNAUTHORIZED)`.
    pub fn abort_with_status(&mut self, code: StatusCode) {
        self.status(code);
        self.writer.write_header_now();
        self.abort();
    }

    pub fn is_aborted(&self) -> bool {
        self.index >= ABORT_INDEX
    }

    /// Position of the next handler to run, or a value ≥ [`ABORT_INDEX`].
    pub fn cursor(&self) -> usize {
        self.index
    }

    /// Length of the chain being dispatched.
    pub fn handler_count(&self) -> usize {
        self.handlers.as_ref().map_or(0, |h| h.len())
    }

    /// Type name of the route's last handler, the one that produces the response.
    pub fn handler_name(&self) -> Option<&'static str> {
        self.handlers.as_ref()?.last().map(|h| h.name())
    }

    // ── Request ──────────────────────────────────────────────────────────────

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn method(&self) -> &http::Method {
        self.request.method()
    }

    pub fn path(&self) -> &str {
        self.request.path()
    }

    /// Path parameters of the matched route, in pattern order.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Shortcut for `ctx.params().get(key)`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key)
    }

    /// The pattern the request matched, e.g. `/users/:id`. `None` for
    /// not-found and redirected requests.
    pub fn full_path(&self) -> Option<&str> {
        self.full_path.as_deref()
    }

    /// IP of the connected peer. Proxy headers are not consulted.
    pub fn remote_ip(&self) -> Option<IpAddr> {
        self.request.remote_addr().map(|addr| addr.ip())
    }

    // ── Per-request keys ─────────────────────────────────────────────────────

    /// Typed values handlers pass down the chain, cleared after every request.
    pub fn keys(&self) -> &Extensions {
        &self.keys
    }

    pub fn keys_mut(&mut self) -> &mut Extensions {
        &mut self.keys
    }

    // ── Errors ───────────────────────────────────────────────────────────────

    /// Attaches an error to the request and returns it for decoration.
    ///
    /// Attaching does not stop the chain; call [`abort`](Self::abort) for
    /// that. A logging middleware typically reports
    /// [`errors`](Self::errors) after `next()` returns.
    pub fn error<E>(&mut self, err: E) -> &mut ContextError
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        self.errors.push(ContextError::new(err.into()))
    }

    pub fn errors(&self) -> &Errors {
        &self.errors
    }

    // ── Response ─────────────────────────────────────────────────────────────

    pub fn writer(&self) -> &ResponseWriter {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut ResponseWriter {
        &mut self.writer
    }

    pub fn status(&mut self, code: StatusCode) {
        self.writer.set_status(code);
    }

    /// Sets a response header. An invalid name or value is attached as an
    /// error instead.
    pub fn set_header(&mut self, name: &str, value: &str) {
        let name = match HeaderName::from_bytes(name.as_bytes()) {
            Ok(name) => name,
            Err(e) => {
                self.error(e);
                return;
            }
        };
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.writer.headers_mut().insert(name, value);
            }
            Err(e) => {
                self.error(e);
            }
        }
    }

    /// Writes a `text/plain; charset=utf-8` body.
    pub fn text(&mut self, code: StatusCode, body: impl AsRef<str>) {
        self.render(code, ContentType::Text, body.as_ref().as_bytes());
    }

    /// Writes an `application/json` body.
    ///
    /// Takes bytes from your serialiser as-is: `serde_json::to_vec(&val)?`,
    /// `format!(r#"{{"id":{id}}}"#).into_bytes()`, etc.
    pub fn json(&mut self, code: StatusCode, body: impl AsRef<[u8]>) {
        self.render(code, ContentType::Json, body.as_ref());
    }

    /// Writes a body of any [`ContentType`].
    pub fn bytes(&mut self, code: StatusCode, content_type: ContentType, body: impl AsRef<[u8]>) {
        self.render(code, content_type, body.as_ref());
    }

    fn render(&mut self, code: StatusCode, content_type: ContentType, body: &[u8]) {
        self.status(code);
        self.writer.set_content_type(content_type);
        if !body_allowed_for_status(code) {
            self.writer.write_header_now();
            return;
        }
        self.writer.write(body);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::handler::BoxedHandler;
    use crate::handlers;

    fn chain(handlers: Vec<BoxedHandler>) -> HandlersChain {
        handlers.into()
    }

    /// A chain of three handlers recording into a shared log.
    fn recording(log: &Arc<Mutex<Vec<&'static str>>>, first: fn(&mut Context)) -> HandlersChain {
        let (a, b) = (Arc::clone(log), Arc::clone(log));
        let first_log = Arc::clone(log);
        chain(handlers![
            move |ctx: &mut Context| {
                first_log.lock().unwrap().push("first");
                first(ctx);
            },
            move |_ctx: &mut Context| a.lock().unwrap().push("second"),
            move |_ctx: &mut Context| b.lock().unwrap().push("third"),
        ])
    }

    #[test]
    fn runs_chain_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut ctx = Context::new(0);
        ctx.run(recording(&log, |_| {}));

        assert_eq!(*log.lock().unwrap(), ["first", "second", "third"]);
        assert_eq!(ctx.cursor(), 3);
        assert!(!ctx.is_aborted());
    }

    #[test]
    fn next_wraps_downstream_handlers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let inner = Arc::clone(&log);
        let outer = Arc::clone(&log);
        let mut ctx = Context::new(0);
        ctx.run(chain(handlers![
            move |ctx: &mut Context| {
                outer.lock().unwrap().push("before");
                ctx.next();
                outer.lock().unwrap().push("after");
            },
            move |_ctx: &mut Context| inner.lock().unwrap().push("handler"),
        ]));

        assert_eq!(*log.lock().unwrap(), ["before", "handler", "after"]);
    }

    #[test]
    fn abort_is_idempotent() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut ctx = Context::new(0);
        ctx.run(recording(&log, |ctx| {
            ctx.abort();
            ctx.next();
            ctx.abort();
            ctx.next();
        }));
        ctx.next();

        assert_eq!(*log.lock().unwrap(), ["first"]);
        assert!(ctx.is_aborted());
        assert!(ctx.cursor() >= ctx.handler_count());
    }

    #[test]
    fn abort_with_status_flushes_headers() {
        let mut ctx = Context::new(0);
        ctx.run(chain(handlers![
            |ctx: &mut Context| ctx.abort_with_status(StatusCode::UNAUTHORIZED),
            |ctx: &mut Context| ctx.text(StatusCode::OK, "secret"),
        ]));

        assert_eq!(ctx.writer().status(), StatusCode::UNAUTHORIZED);
        assert!(ctx.writer().written());
        assert_eq!(ctx.writer().size(), 0);
    }

    #[test]
    fn errors_do_not_abort() {
        let mut ctx = Context::new(0);
        ctx.run(chain(handlers![
            |ctx: &mut Context| {
                ctx.error("first failure").set_meta("stage=auth");
            },
            |ctx: &mut Context| ctx.text(StatusCode::OK, "still here"),
        ]));

        assert_eq!(ctx.errors().len(), 1);
        assert_eq!(ctx.errors()[0].meta(), Some("stage=auth"));
        assert_eq!(ctx.writer().size(), "still here".len());
    }

    #[test]
    fn bodyless_status_writes_no_body() {
        let mut ctx = Context::new(0);
        ctx.text(StatusCode::NO_CONTENT, "ignored");
        assert!(ctx.writer().written());
        assert_eq!(ctx.writer().size(), 0);
    }

    #[test]
    fn invalid_header_becomes_an_error() {
        let mut ctx = Context::new(0);
        ctx.set_header("x-ok", "yes");
        ctx.set_header("bad header", "x");
        assert_eq!(ctx.writer().headers()["x-ok"], "yes");
        assert_eq!(ctx.errors().len(), 1);
    }

    #[test]
    fn reset_clears_everything() {
        #[derive(Clone)]
        struct User(&'static str);

        let mut ctx = Context::new(2);
        ctx.params.push("id".into(), "7".into());
        ctx.full_path = Some("/users/:id".into());
        ctx.keys_mut().insert(User("alice"));
        ctx.run(chain(handlers![|ctx: &mut Context| {
            ctx.error("boom");
            ctx.text(StatusCode::CREATED, "x");
            ctx.abort();
        }]));

        ctx.reset();
        assert!(ctx.params().is_empty());
        assert!(ctx.params().capacity() >= 2);
        assert!(ctx.full_path().is_none());
        assert!(ctx.keys().get::<User>().is_none());
        assert!(ctx.errors().is_empty());
        assert_eq!(ctx.handler_count(), 0);
        assert_eq!(ctx.cursor(), 0);
        assert_eq!(ctx.writer().status(), StatusCode::OK);
        assert!(!ctx.writer().written());
    }
}
