//! Per-request access log.

use std::time::Instant;

use tracing::{info, warn};

use crate::context::Context;
use crate::handler::{boxed, BoxedHandler};

/// Logs every request once the rest of the chain has run.
pub fn logger() -> BoxedHandler {
    boxed(log_request)
}

fn log_request(ctx: &mut Context) {
    let start = Instant::now();
    let method = ctx.method().clone();
    let uri = ctx.request().uri().clone();

    ctx.next();

    let latency = start.elapsed();
    let status = ctx.writer().status().as_u16();
    let client = ctx.remote_ip().map(|ip| ip.to_string()).unwrap_or_default();
    let route = ctx.full_path().unwrap_or_default();

    if ctx.errors().is_empty() {
        info!(
            %method,
            path = uri.path(),
            route,
            status,
            latency_us = latency.as_micros() as u64,
            client = %client,
            "request"
        );
    } else {
        warn!(
            %method,
            path = uri.path(),
            route,
            status,
            latency_us = latency.as_micros() as u64,
            client = %client,
            errors = %ctx.errors(),
            "request"
        );
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;
    use crate::handlers;

    #[test]
    fn passes_control_downstream() {
        let mut ctx = Context::new(0);
        let mut chain = vec![logger()];
        chain.extend(handlers![|ctx: &mut Context| ctx.text(StatusCode::ACCEPTED, "done")]);
        ctx.run(chain.into());

        assert_eq!(ctx.writer().status(), StatusCode::ACCEPTED);
        assert_eq!(ctx.cursor(), 2);
    }
}
