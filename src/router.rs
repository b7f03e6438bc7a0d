//! The router: method table, global middleware and the serve pipeline.
//!
//! One segment trie per HTTP method. Build it once at startup, then hand it
//! to [`Server::serve`](crate::Server::serve) or drive it directly with
//! [`Router::serve`]. Every request goes through the same steps:
//!
//! ```text
//! acquire pooled Context ─▶ bind request ─▶ lookup(method, path)
//!   ├─ hit   ─▶ run route chain
//!   ├─ miss  ─▶ trailing-slash redirect │ fixed-path redirect
//!   │           │ 405 chain (Allow)    │ 404 chain
//!   └─ take response ─▶ release Context
//! ```
//!
//! Not-found and method-not-allowed requests run a chain too: the global
//! middleware followed by the handlers given to [`Router::no_route`] /
//! [`Router::no_method`]. A logger installed with
//! [`use_middleware`](Router::use_middleware) therefore sees every request.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderValue, ALLOW, LOCATION};
use http::{StatusCode, Uri};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::{Config, Mode};
use crate::context::{Context, ABORT_INDEX};
use crate::error::RouteError;
use crate::group::RouterGroup;
use crate::handler::{BoxedHandler, HandlersChain};
use crate::method::Method;
use crate::params::Params;
use crate::path::{clean_path, count_params, segment, Segment};
use crate::pool::ContextPool;
use crate::request::Request;
use crate::response::ContentType;
use crate::tree::MethodTable;

const DEFAULT_404_BODY: &[u8] = b"404 page not found";
const DEFAULT_405_BODY: &[u8] = b"405 method not allowed";

/// The application router.
///
/// Registration takes `&self`, so groups can borrow the router while routes
/// are added. Each [`get`](Router::get)-style call returns `&Self` so
/// registrations chain:
///
/// ```rust
/// use gantry::{handlers, Context, Router, StatusCode};
///
/// fn show(ctx: &mut Context) {
///     let id = ctx.param("id").unwrap_or_default().to_owned();
///     ctx.text(StatusCode::OK, id);
/// }
///
/// let router = Router::default();
/// router
///     .get("/users/:id", handlers![show])
///     .post("/users", handlers![|ctx: &mut Context| ctx.status(StatusCode::CREATED)]);
/// ```
pub struct Router {
    config: Config,
    trees: MethodTable,
    global: RwLock<Vec<BoxedHandler>>,
    no_route: RwLock<Vec<BoxedHandler>>,
    no_method: RwLock<Vec<BoxedHandler>>,
    all_no_route: RwLock<HandlersChain>,
    all_no_method: RwLock<HandlersChain>,
    pool: ContextPool,
}

/// Outcome of [`Router::lookup`].
#[derive(Debug, Default)]
pub struct Lookup {
    pub handlers: Option<HandlersChain>,
    pub params: Params,
    /// The path with its trailing slash toggled would match.
    pub tsr: bool,
    /// The pattern that matched, e.g. `/users/:id`.
    pub full_path: Option<Arc<str>>,
}

impl Lookup {
    pub fn matched(&self) -> bool {
        self.handlers.is_some()
    }
}

/// One entry of [`Router::routes`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RouteInfo {
    pub method: Method,
    pub path: String,
    pub handler_count: usize,
    /// Type name of the last handler in the chain.
    pub handler: &'static str,
}

impl Router {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            trees: MethodTable::new(),
            global: RwLock::new(Vec::new()),
            no_route: RwLock::new(Vec::new()),
            no_method: RwLock::new(Vec::new()),
            all_no_route: RwLock::new(Arc::from([])),
            all_no_method: RwLock::new(Arc::from([])),
            pool: ContextPool::new(),
        }
    }

    /// A router with the [`logger`](crate::middleware::logger) and
    /// [`recovery`](crate::middleware::recovery) middleware installed.
    pub fn default_stack(config: Config) -> Self {
        let router = Self::new(config);
        router.use_middleware(vec![
            crate::middleware::logger(),
            crate::middleware::recovery(),
        ]);
        router
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    // ── Middleware ───────────────────────────────────────────────────────────

    /// Appends global middleware.
    ///
    /// It prefixes routes registered from now on, groups created from now
    /// on, and the not-found and method-not-allowed chains.
    ///
    /// # Panics
    ///
    /// When a not-found or method-not-allowed chain would reach
    /// [`ABORT_INDEX`] handlers.
    pub fn use_middleware(&self, middleware: Vec<BoxedHandler>) -> &Self {
        let global = self.global.read().len() + middleware.len();
        check_fallback_len("no-route", global + self.no_route.read().len());
        check_fallback_len("no-method", global + self.no_method.read().len());
        self.global.write().extend(middleware);
        self.rebuild_404_handlers();
        self.rebuild_405_handlers();
        self
    }

    /// Handlers run, after the global middleware, when no route matches.
    pub fn no_route(&self, handlers: Vec<BoxedHandler>) -> &Self {
        check_fallback_len("no-route", self.global.read().len() + handlers.len());
        *self.no_route.write() = handlers;
        self.rebuild_404_handlers();
        self
    }

    /// Handlers run, after the global middleware, when the path exists only
    /// under other methods. Needs [`Config::handle_method_not_allowed`].
    pub fn no_method(&self, handlers: Vec<BoxedHandler>) -> &Self {
        check_fallback_len("no-method", self.global.read().len() + handlers.len());
        *self.no_method.write() = handlers;
        self.rebuild_405_handlers();
        self
    }

    fn rebuild_404_handlers(&self) {
        let chain = self.combine_global(&self.no_route.read());
        *self.all_no_route.write() = chain;
    }

    fn rebuild_405_handlers(&self) {
        let chain = self.combine_global(&self.no_method.read());
        *self.all_no_method.write() = chain;
    }

    fn combine_global(&self, handlers: &[BoxedHandler]) -> HandlersChain {
        let global = self.global.read();
        global.iter().chain(handlers).cloned().collect()
    }

    // ── Registration ─────────────────────────────────────────────────────────

    fn root(&self) -> RouterGroup<'_> {
        RouterGroup::new(self, "/".to_owned(), self.global.read().clone())
    }

    /// A group at `relative`, starting from the global middleware plus `handlers`.
    pub fn group(&self, relative: &str, handlers: Vec<BoxedHandler>) -> RouterGroup<'_> {
        self.root().group(relative, handlers)
    }

    /// See [`RouterGroup::handle`].
    pub fn handle(&self, method: &str, path: &str, handlers: Vec<BoxedHandler>) -> &Self {
        self.root().handle(method, path, handlers);
        self
    }

    pub fn try_handle(&self, method: &str, path: &str, handlers: Vec<BoxedHandler>) -> Result<&Self, RouteError> {
        self.root().try_handle(method, path, handlers)?;
        Ok(self)
    }

    pub fn get(&self, path: &str, handlers: Vec<BoxedHandler>) -> &Self {
        self.root().get(path, handlers);
        self
    }

    pub fn post(&self, path: &str, handlers: Vec<BoxedHandler>) -> &Self {
        self.root().post(path, handlers);
        self
    }

    pub fn put(&self, path: &str, handlers: Vec<BoxedHandler>) -> &Self {
        self.root().put(path, handlers);
        self
    }

    pub fn patch(&self, path: &str, handlers: Vec<BoxedHandler>) -> &Self {
        self.root().patch(path, handlers);
        self
    }

    pub fn delete(&self, path: &str, handlers: Vec<BoxedHandler>) -> &Self {
        self.root().delete(path, handlers);
        self
    }

    pub fn head(&self, path: &str, handlers: Vec<BoxedHandler>) -> &Self {
        self.root().head(path, handlers);
        self
    }

    pub fn options(&self, path: &str, handlers: Vec<BoxedHandler>) -> &Self {
        self.root().options(path, handlers);
        self
    }

    pub fn any(&self, path: &str, handlers: Vec<BoxedHandler>) -> &Self {
        self.root().any(path, handlers);
        self
    }

    /// Registers a final chain at an absolute path. No middleware is
    /// prepended; [`handle`](Self::handle) and the verb methods do that.
    pub fn add_route(&self, method: &str, path: &str, handlers: Vec<BoxedHandler>) -> Result<(), RouteError> {
        self.insert(method.parse()?, path, handlers)
    }

    /// Every check [`insert`](Self::insert) makes, without registering.
    pub(crate) fn validate(&self, method: Method, path: &str, count: usize) -> Result<Vec<Segment>, RouteError> {
        if count == 0 {
            return Err(RouteError::EmptyHandlers(path.to_owned()));
        }
        if count >= ABORT_INDEX {
            return Err(RouteError::TooManyHandlers {
                path: path.to_owned(),
                count,
                max: ABORT_INDEX - 1,
            });
        }
        let segments = segment(path)?;
        self.trees.get(method).read().check_route(method, path, &segments)?;
        Ok(segments)
    }

    pub(crate) fn insert(&self, method: Method, path: &str, handlers: Vec<BoxedHandler>) -> Result<(), RouteError> {
        let segments = self.validate(method, path, handlers.len())?;
        let count = handlers.len();
        let chain: HandlersChain = handlers.into();
        let last = chain.last().map(|h| h.name()).unwrap_or_default();

        self.trees
            .get(method)
            .write()
            .add_route(method, path, &segments, chain)?;
        self.pool.reserve_params(count_params(&segments));

        if self.config.mode == Mode::Debug {
            debug!(%method, path, handlers = count, handler = last, "route registered");
        }
        Ok(())
    }

    // ── Lookup ───────────────────────────────────────────────────────────────

    /// Resolves `(method, path)` without running anything.
    ///
    /// An unsupported method is a plain miss.
    pub fn lookup(&self, method: &str, path: &str) -> Lookup {
        let Ok(method) = method.parse::<Method>() else {
            return Lookup::default();
        };
        let mut params = Params::with_capacity(self.pool.max_params());
        let tree = self.trees.get(method).read();
        let value = tree.get_value(path, &mut params, self.config.unescape_path_values);
        Lookup {
            handlers: value.handlers.cloned(),
            full_path: value.full_path.cloned(),
            tsr: value.tsr,
            params,
        }
    }

    /// Every registered route, grouped by method in method-table order and
    /// sorted by path within a method.
    pub fn routes(&self) -> Vec<RouteInfo> {
        let mut routes = Vec::new();
        for method in Method::ALL {
            let tree = self.trees.get(method).read();
            let mut found = Vec::new();
            tree.collect_routes(&mut found);
            routes.extend(found.into_iter().map(|(path, chain)| RouteInfo {
                method,
                path: path.to_owned(),
                handler_count: chain.len(),
                handler: chain.last().map(|h| h.name()).unwrap_or_default(),
            }));
        }
        routes
    }

    /// Logs every non-empty tree at `INFO`, one node per line.
    pub fn print_trees(&self) {
        for method in Method::ALL {
            let tree = self.trees.get(method).read();
            let mut found = Vec::new();
            tree.collect_routes(&mut found);
            if found.is_empty() {
                continue;
            }
            let mut dump = String::new();
            tree.dump(0, &mut dump);
            info!(%method, routes = found.len(), "\n{dump}");
        }
    }

    // ── Serving ──────────────────────────────────────────────────────────────

    /// Serves one fully-read request.
    pub fn serve(&self, req: http::Request<Bytes>) -> http::Response<Bytes> {
        self.dispatch(Request::new(req))
    }

    /// Serves one request on a pooled [`Context`].
    pub fn dispatch(&self, request: Request) -> http::Response<Bytes> {
        let mut ctx = self.pool.acquire();
        ctx.bind(request);
        self.handle_http_request(&mut ctx);
        ctx.writer.take_response()
    }

    fn handle_http_request(&self, ctx: &mut Context) {
        // Uri clones share their buffer; this frees `ctx` for the handlers.
        let uri = ctx.request.uri().clone();
        let cleaned;
        let mut path = uri.path();
        if self.config.remove_extra_slash {
            cleaned = clean_path(path);
            path = &cleaned;
        }

        let method = Method::try_from(ctx.request.method()).ok();
        if let Some(method) = method {
            let tree = self.trees.get(method).read();
            let value = tree.get_value(path, &mut ctx.params, self.config.unescape_path_values);
            if let Some(handlers) = value.handlers {
                let chain = Arc::clone(handlers);
                ctx.full_path = value.full_path.cloned();
                drop(tree);
                ctx.run(chain);
                ctx.writer.write_header_now();
                return;
            }
            let tsr = value.tsr;
            drop(tree);

            if method != Method::Connect && path != "/" {
                if tsr && self.config.redirect_trailing_slash {
                    redirect_trailing_slash(ctx, &uri, path);
                    return;
                }
                if self.config.redirect_fixed_path && self.redirect_fixed_path(ctx, method, &uri) {
                    return;
                }
            }
        }

        if self.config.handle_method_not_allowed {
            let allowed = self.allowed_methods(ctx, method, path);
            if !allowed.is_empty() {
                if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
                    ctx.writer.headers_mut().insert(ALLOW, value);
                }
                let chain = Arc::clone(&*self.all_no_method.read());
                serve_error(ctx, chain, StatusCode::METHOD_NOT_ALLOWED, DEFAULT_405_BODY);
                return;
            }
        }

        let chain = Arc::clone(&*self.all_no_route.read());
        serve_error(ctx, chain, StatusCode::NOT_FOUND, DEFAULT_404_BODY);
    }

    /// Methods other than `skip` with a route for `path`.
    fn allowed_methods(&self, ctx: &mut Context, skip: Option<Method>, path: &str) -> Vec<&'static str> {
        let mut allowed = Vec::new();
        for method in Method::ALL {
            if Some(method) == skip {
                continue;
            }
            let tree = self.trees.get(method).read();
            if tree.get_value(path, &mut ctx.params, false).handlers.is_some() {
                allowed.push(method.as_str());
            }
            ctx.params.clear();
        }
        allowed
    }

    fn redirect_fixed_path(&self, ctx: &mut Context, method: Method, uri: &Uri) -> bool {
        let fixed = self
            .trees
            .get(method)
            .read()
            .find_case_insensitive(&clean_path(uri.path()), true);
        match fixed {
            Some(fixed) => {
                redirect_request(ctx, uri, fixed);
                true
            }
            None => false,
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("config", &self.config)
            .field("routes", &self.routes().len())
            .field("global", &self.global.read().len())
            .finish()
    }
}

// ── Fallbacks ─────────────────────────────────────────────────────────────────

/// A chain of [`ABORT_INDEX`] or more handlers cannot be aborted.
fn check_fallback_len(chain: &str, count: usize) {
    if count >= ABORT_INDEX {
        let e = RouteError::TooManyHandlers {
            path: format!("<{chain}>"),
            count,
            max: ABORT_INDEX - 1,
        };
        panic!("invalid {chain} chain: {e}");
    }
}

/// Runs a not-found style chain, then writes `default_body` unless a handler
/// already wrote or chose a different status.
fn serve_error(ctx: &mut Context, chain: HandlersChain, code: StatusCode, default_body: &[u8]) {
    ctx.status(code);
    ctx.run(chain);
    if ctx.writer.written() {
        return;
    }
    if ctx.writer.status() == code {
        ctx.writer.set_content_type(ContentType::Text);
        ctx.writer.write(default_body);
        return;
    }
    ctx.writer.write_header_now();
}

/// Redirects to `path`, the path that was looked up, with its trailing
/// slash toggled.
fn redirect_trailing_slash(ctx: &mut Context, uri: &Uri, path: &str) {
    let mut target = ctx
        .request
        .header("x-forwarded-prefix")
        .map(forwarded_prefix)
        .unwrap_or_default();
    match path.strip_suffix('/') {
        Some(trimmed) if path.len() > 1 => target.push_str(trimmed),
        _ => {
            target.push_str(path);
            target.push('/');
        }
    }
    // A leading `//` would make the Location protocol-relative.
    if target.starts_with("//") {
        target = format!("/{}", target.trim_start_matches('/'));
    }
    redirect_request(ctx, uri, target);
}

/// Reduces an `X-Forwarded-Prefix` value to `/`, `-` and ASCII
/// alphanumerics, without repeated or trailing slashes.
fn forwarded_prefix(raw: &str) -> String {
    let safe: String = clean_path(raw)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-'))
        .collect();
    clean_path(&safe).trim_end_matches('/').to_owned()
}

/// 301 for GET, 307 otherwise. The query string is carried over.
fn redirect_request(ctx: &mut Context, uri: &Uri, mut location: String) {
    if let Some(query) = uri.query() {
        location.push('?');
        location.push_str(query);
    }
    let code = if ctx.request.method() == http::Method::GET {
        StatusCode::MOVED_PERMANENTLY
    } else {
        StatusCode::TEMPORARY_REDIRECT
    };
    debug!(code = code.as_u16(), from = uri.path(), to = %location, "redirecting request");

    match HeaderValue::from_str(&location) {
        Ok(value) => {
            ctx.writer.headers_mut().insert(LOCATION, value);
            ctx.status(code);
        }
        Err(e) => {
            ctx.error(e);
            ctx.status(StatusCode::BAD_REQUEST);
        }
    }
    ctx.writer.write_header_now();
}
