//! Built-in middleware.
//!
//! Middleware is an ordinary handler that calls [`Context::next`] somewhere
//! in its body: code before the call runs on the way in, code after it runs
//! on the way out.
//!
//! - [`logger`]: one structured `INFO` event per request with method, path,
//!   status, latency and attached errors.
//! - [`recovery`]: turns a panicking handler into a logged 500.
//!
//! Install [`recovery`] after [`logger`] so the logger still records the 500:
//!
//! ```rust
//! use gantry::{middleware, Router};
//!
//! let router = Router::default();
//! router.use_middleware(vec![middleware::logger(), middleware::recovery()]);
//! ```
//!
//! [`Context::next`]: crate::Context::next

mod logger;
mod recovery;

pub use logger::logger;
pub use recovery::recovery;
