//! # gantry
//!
//! An HTTP request router built on a per-method segment trie, with
//! middleware composed into handler chains.
//!
//! ## The model
//!
//! Routes are registered at startup as `(method, pattern, chain)`. A chain is
//! the middleware of every enclosing group, outermost first, followed by the
//! route's own handlers. At serve time the router resolves `(method, path)`
//! to a chain plus the bound path parameters and runs the chain on a pooled
//! [`Context`]:
//!
//! - literal segments match verbatim and always win over a wildcard sibling;
//! - `:name` binds exactly one non-empty segment;
//! - `*name` binds the rest of the path and must come last;
//! - `/` alone is the root route.
//!
//! Handlers are plain synchronous functions over `&mut Context`. Middleware
//! calls [`Context::next`] to run everything downstream and
//! [`Context::abort`] to stop it.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use gantry::{handlers, Config, Context, Router, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), gantry::Error> {
//!     let router = Router::default_stack(Config::from_env()?);
//!
//!     let api = router.group("/api", handlers![require_token]);
//!     api.get("/users/:id", handlers![get_user])
//!        .post("/users", handlers![create_user]);
//!
//!     Server::bind("0.0.0.0:3000")?.serve(router).await
//! }
//!
//! fn require_token(ctx: &mut Context) {
//!     if ctx.request().header("authorization").is_none() {
//!         ctx.abort_with_status(StatusCode::UNAUTHORIZED);
//!     }
//! }
//!
//! fn get_user(ctx: &mut Context) {
//!     let id = ctx.param("id").unwrap_or_default().to_owned();
//!     // gantry sends bytes; build them however you like:
//!     //   serde_json::to_vec(&user)?
//!     //   format!(r#"{{"id":"{id}"}}"#).into_bytes()
//!     ctx.json(StatusCode::OK, format!(r#"{{"id":"{id}"}}"#));
//! }
//!
//! fn create_user(ctx: &mut Context) {
//!     if ctx.request().body().is_empty() {
//!         ctx.abort_with_status(StatusCode::BAD_REQUEST);
//!         return;
//!     }
//!     ctx.set_header("location", "/api/users/99");
//!     ctx.json(StatusCode::CREATED, r#"{"id":"99"}"#);
//! }
//! ```

mod config;
mod context;
mod error;
mod group;
mod method;
mod params;
mod pool;
mod request;
mod response;
mod router;
mod server;
mod tree;

pub mod handler;
pub mod middleware;
pub mod path;

pub use config::{Config, Mode, ENV_MODE};
pub use context::{Context, ABORT_INDEX};
pub use error::{ContextError, Error, ErrorType, Errors, RouteError};
pub use group::RouterGroup;
pub use handler::{BoxedHandler, Handler, HandlersChain};
pub use http::StatusCode;
pub use method::Method;
pub use params::{Param, Params};
pub use pool::{ContextPool, PooledContext};
pub use request::Request;
pub use response::{ContentType, ResponseWriter};
pub use router::{Lookup, RouteInfo, Router};
pub use server::Server;
