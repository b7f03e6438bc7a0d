//! Panic recovery.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use http::StatusCode;
use tracing::error;

use crate::context::Context;
use crate::handler::{boxed, BoxedHandler};

/// Catches a panic anywhere downstream, logs it and answers 500.
///
/// If the panicking handler already flushed headers the status cannot
/// change any more; the request is still aborted.
pub fn recovery() -> BoxedHandler {
    boxed(recover)
}

fn recover(ctx: &mut Context) {
    let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| ctx.next())) else {
        return;
    };

    let message = panic_message(payload.as_ref());
    error!(
        method = %ctx.method(),
        path = ctx.path(),
        handler = ctx.handler_name().unwrap_or_default(),
        panic_message = %message,
        "handler panicked"
    );
    ctx.error(format!("panic recovered: {message}"));
    ctx.abort_with_status(StatusCode::INTERNAL_SERVER_ERROR);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
