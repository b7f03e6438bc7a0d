//! Route groups: a base path plus the middleware every route below it gets.
//!
//! A group copies its parent's handlers when it is created. Middleware added
//! to the parent afterwards does not reach routes registered through the
//! child, and middleware added to a group only reaches routes registered
//! after the call.

use crate::error::RouteError;
use crate::handler::BoxedHandler;
use crate::method::Method;
use crate::path::join_paths;
use crate::router::Router;

/// A base path and handler prefix bound to a [`Router`].
///
/// ```rust
/// use gantry::{handlers, Context, Router, StatusCode};
///
/// fn auth(ctx: &mut Context) { ctx.next(); }
/// fn list(ctx: &mut Context) { ctx.text(StatusCode::OK, "[]"); }
///
/// let router = Router::default();
/// let api = router.group("/api", handlers![auth]);
/// api.get("/users", handlers![list]);        // GET /api/users → [auth, list]
/// ```
#[derive(Clone)]
pub struct RouterGroup<'r> {
    router: &'r Router,
    base_path: String,
    handlers: Vec<BoxedHandler>,
}

impl<'r> RouterGroup<'r> {
    pub(crate) fn new(router: &'r Router, base_path: String, handlers: Vec<BoxedHandler>) -> Self {
        Self { router, base_path, handlers }
    }

    /// Appends middleware for routes registered through this group from now on.
    pub fn use_middleware(&mut self, middleware: Vec<BoxedHandler>) -> &mut Self {
        self.handlers.extend(middleware);
        self
    }

    /// A child group at `relative` below this one, with `handlers` appended
    /// to this group's middleware.
    pub fn group(&self, relative: &str, handlers: Vec<BoxedHandler>) -> RouterGroup<'r> {
        RouterGroup {
            router: self.router,
            base_path: self.calculate_absolute_path(relative),
            handlers: self.combine_handlers(handlers),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Middleware every route registered through this group starts with.
    pub fn handlers(&self) -> &[BoxedHandler] {
        &self.handlers
    }

    // ── Registration ─────────────────────────────────────────────────────────

    /// Registers `handlers` for `method` at `relative` below this group.
    ///
    /// # Panics
    ///
    /// On any configuration error. Use [`try_handle`](Self::try_handle) to
    /// get the error instead.
    pub fn handle(&self, method: &str, relative: &str, handlers: Vec<BoxedHandler>) -> &Self {
        self.try_handle(method, relative, handlers)
            .unwrap_or_else(|e| panic!("invalid route `{relative}`: {e}"))
    }

    pub fn try_handle(
        &self,
        method: &str,
        relative: &str,
        handlers: Vec<BoxedHandler>,
    ) -> Result<&Self, RouteError> {
        let method: Method = method.parse()?;
        self.route(method, relative, handlers)?;
        Ok(self)
    }

    pub fn get(&self, relative: &str, handlers: Vec<BoxedHandler>) -> &Self {
        self.handle(Method::Get.as_str(), relative, handlers)
    }

    pub fn post(&self, relative: &str, handlers: Vec<BoxedHandler>) -> &Self {
        self.handle(Method::Post.as_str(), relative, handlers)
    }

    pub fn put(&self, relative: &str, handlers: Vec<BoxedHandler>) -> &Self {
        self.handle(Method::Put.as_str(), relative, handlers)
    }

    pub fn patch(&self, relative: &str, handlers: Vec<BoxedHandler>) -> &Self {
        self.handle(Method::Patch.as_str(), relative, handlers)
    }

    pub fn delete(&self, relative: &str, handlers: Vec<BoxedHandler>) -> &Self {
        self.handle(Method::Delete.as_str(), relative, handlers)
    }

    pub fn head(&self, relative: &str, handlers: Vec<BoxedHandler>) -> &Self {
        self.handle(Method::Head.as_str(), relative, handlers)
    }

    pub fn options(&self, relative: &str, handlers: Vec<BoxedHandler>) -> &Self {
        self.handle(Method::Options.as_str(), relative, handlers)
    }

    /// Registers the same chain under all nine methods.
    ///
    /// # Panics
    ///
    /// On any configuration error, see [`try_any`](Self::try_any).
    pub fn any(&self, relative: &str, handlers: Vec<BoxedHandler>) -> &Self {
        self.try_any(relative, handlers)
            .unwrap_or_else(|e| panic!("invalid route `{relative}`: {e}"))
    }

    /// Checks the route against all nine trees first, so an error leaves
    /// every method unregistered.
    pub fn try_any(&self, relative: &str, handlers: Vec<BoxedHandler>) -> Result<&Self, RouteError> {
        let absolute = self.calculate_absolute_path(relative);
        let chain = self.combine_handlers(handlers);
        for method in Method::ALL {
            self.router.validate(method, &absolute, chain.len())?;
        }
        for method in Method::ALL {
            self.router.insert(method, &absolute, chain.clone())?;
        }
        Ok(self)
    }

    fn route(&self, method: Method, relative: &str, handlers: Vec<BoxedHandler>) -> Result<(), RouteError> {
        let absolute = self.calculate_absolute_path(relative);
        let chain = self.combine_handlers(handlers);
        self.router.insert(method, &absolute, chain)
    }

    fn combine_handlers(&self, handlers: Vec<BoxedHandler>) -> Vec<BoxedHandler> {
        let mut merged = Vec::with_capacity(self.handlers.len() + handlers.len());
        merged.extend(self.handlers.iter().cloned());
        merged.extend(handlers);
        merged
    }

    fn calculate_absolute_path(&self, relative: &str) -> String {
        join_paths(&self.base_path, relative)
    }
}

impl std::fmt::Debug for RouterGroup<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterGroup")
            .field("base_path", &self.base_path)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use http::StatusCode;

    use super::*;
    use crate::config::{Config, Mode};
    use crate::context::Context;
    use crate::handlers;

    fn router() -> Router {
        Router::new(Config::default().mode(Mode::Test))
    }

    fn tag(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> BoxedHandler {
        let log = Arc::clone(log);
        crate::handler::boxed(move |_ctx: &mut Context| log.lock().unwrap().push(name))
    }

    #[test]
    fn nested_base_paths() {
        let router = router();
        let api = router.group("/api", vec![]);
        let v1 = api.group("v1/", vec![]);
        assert_eq!(api.base_path(), "/api");
        assert_eq!(v1.base_path(), "/api/v1/");
        assert_eq!(v1.group("//users", vec![]).base_path(), "/api/v1/users");
    }

    #[test]
    fn chain_is_outer_to_inner_then_route() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = router();
        let mut api = router.group("/api", vec![tag(&log, "api")]);
        api.use_middleware(vec![tag(&log, "api-use")]);
        let v1 = api.group("/v1", vec![tag(&log, "v1")]);
        v1.get("/ping", vec![tag(&log, "route")]);

        let lookup = router.lookup("GET", "/api/v1/ping");
        let chain = lookup.handlers.expect("route should match");
        assert_eq!(chain.len(), 4);

        let mut ctx = Context::new(0);
        ctx.run(chain);
        assert_eq!(*log.lock().unwrap(), ["api", "api-use", "v1", "route"]);
    }

    #[test]
    fn child_does_not_see_later_parent_middleware() {
        let router = router();
        let mut parent = router.group("/p", handlers![|ctx: &mut Context| ctx.next()]);
        let child = parent.group("/c", vec![]);
        parent.use_middleware(handlers![|ctx: &mut Context| ctx.next()]);
        child.get("/x", handlers![|ctx: &mut Context| ctx.text(StatusCode::OK, "x")]);

        assert_eq!(router.lookup("GET", "/p/c/x").handlers.map(|h| h.len()), Some(2));
    }

    #[test]
    fn any_registers_every_method() {
        let router = router();
        router.group("/", vec![]).any("/all", handlers![|_ctx| {}]);
        for method in Method::ALL {
            assert!(router.lookup(method.as_str(), "/all").matched(), "{method}");
        }
    }

    #[test]
    fn try_any_registers_nothing_on_conflict() {
        let router = router();
        router.post("/all", handlers![|_ctx| {}]);
        let group = router.group("/", vec![]);
        assert!(matches!(
            group.try_any("/all", handlers![|_ctx| {}]),
            Err(RouteError::DuplicateRoute { .. })
        ));
        assert!(!router.lookup("GET", "/all").matched());
        assert_eq!(router.routes().len(), 1);
    }

    #[test]
    fn try_handle_reports_bad_method() {
        let router = router();
        let group = router.group("/", vec![]);
        assert_eq!(
            group.try_handle("", "/x", handlers![|_ctx| {}]).unwrap_err(),
            RouteError::EmptyMethod
        );
        assert!(matches!(
            group.try_handle("FETCH", "/x", handlers![|_ctx| {}]),
            Err(RouteError::UnsupportedMethod(_))
        ));
    }

    #[test]
    #[should_panic(expected = "no handlers")]
    fn empty_chain_panics() {
        let router = router();
        router.group("/", vec![]).get("/x", vec![]);
    }
}
