//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! A route's chain mixes handlers of *different* closure types, and the tree
//! has to hold every chain in one node type. Each handler is therefore erased
//! behind [`ErasedHandler`] and shared as a [`BoxedHandler`]:
//!
//! ```text
//! fn auth(ctx: &mut Context) { … }            ← user writes this
//!        ↓ handlers![auth, show_user]
//! boxed(auth)                                 ← generic, monomorphised
//!        ↓
//! Arc::new(FnHandler(auth))                   ← one allocation, at startup
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! chain[i].call(ctx)  at request time         ← one vtable dispatch
//! ```
//!
//! A composed chain is an `Arc<[BoxedHandler]>`: lookup hands the serving
//! thread one reference-count increment, never a copy of the chain.
//!
//! Handlers are synchronous. A middleware that wants to run code after the
//! rest of the chain calls [`Context::next`] and then carries on; there is no
//! future to poll and nothing to schedule.

use std::fmt;
use std::sync::Arc;

use crate::context::Context;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// public [`BoxedHandler`] alias. External crates have no reason to implement it.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, ctx: &mut Context);

    /// Type name of the wrapped function, for route listings and debug logs.
    fn name(&self) -> &'static str;
}

impl fmt::Debug for dyn ErasedHandler + Send + Sync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A type-erased handler shared by every chain that contains it.
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// A composed, immutable handler chain: group middleware first, route
/// handlers last.
pub type HandlersChain = Arc<[BoxedHandler]>;

/// Implemented for every valid handler.
///
/// You never implement this yourself. Any function or closure with the
/// signature `Fn(&mut Context)` that is `Send + Sync + 'static` qualifies:
///
/// ```rust
/// use gantry::{Context, Handler, StatusCode};
///
/// fn ping(ctx: &mut Context) {
///     ctx.text(StatusCode::OK, "pong");
/// }
///
/// fn assert_handler(_: impl Handler) {}
/// assert_handler(ping);
/// ```
pub trait Handler: Fn(&mut Context) + Send + Sync + 'static {}

impl<F> Handler for F where F: Fn(&mut Context) + Send + Sync + 'static {}

/// Erases one handler. [`handlers!`](crate::handlers) calls this for you.
pub fn boxed<F>(handler: F) -> BoxedHandler
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    Arc::new(FnHandler(handler))
}

/// Builds a `Vec<BoxedHandler>` from handler expressions, in order.
///
/// ```rust
/// use gantry::{handlers, Context, StatusCode};
///
/// fn auth(ctx: &mut Context) { ctx.next(); }
/// let chain = handlers![auth, |ctx: &mut Context| ctx.text(StatusCode::OK, "ok")];
/// assert_eq!(chain.len(), 2);
/// ```
#[macro_export]
macro_rules! handlers {
    ($($handler:expr),* $(,)?) => {
        ::std::vec![$($crate::handler::boxed($handler)),*]
    };
}

/// Newtype wrapper that holds a concrete handler `F` and implements
/// [`ErasedHandler`], bridging the typed world to the trait-object world.
struct FnHandler<F>(F);

impl<F> ErasedHandler for FnHandler<F>
where
    F: Fn(&mut Context) + Send + Sync,
{
    fn call(&self, ctx: &mut Context) {
        (self.0)(ctx)
    }

    fn name(&self) -> &'static str {
        std::any::type_name::<F>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(_: &mut Context) {}

    #[test]
    fn name_is_the_function_path() {
        let h = boxed(named);
        assert!(h.name().ends_with("named"), "{}", h.name());
    }

    #[test]
    fn macro_preserves_order() {
        let chain: Vec<BoxedHandler> = handlers![named, |_ctx| {}];
        assert_eq!(chain.len(), 2);
        assert!(chain[0].name().ends_with("named"));
        assert!(!chain[1].name().ends_with("named"));
    }
}
