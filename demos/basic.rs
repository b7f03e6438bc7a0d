//! Minimal gantry example: a versioned JSON API with group middleware.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/api/v1/users/42
//!   curl http://localhost:3000/api/v1/users/42/          # 301 → /api/v1/users/42
//!   curl -X POST http://localhost:3000/api/v1/users \
//!        -H 'authorization: Bearer demo' -d '{"name":"alice"}'
//!   curl -X DELETE http://localhost:3000/api/v1/users/42 -H 'authorization: Bearer demo'
//!   curl http://localhost:3000/static/css/site.css
//!   curl -X PUT http://localhost:3000/healthz            # 405, Allow: GET

use gantry::{handlers, Config, Context, Router, Server, StatusCode};

#[tokio::main]
async fn main() -> Result<(), gantry::Error> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?.handle_method_not_allowed(true);
    let router = Router::default_stack(config);

    router.get("/healthz", handlers![|ctx: &mut Context| ctx.text(StatusCode::OK, "ok")]);
    router.get("/static/*filepath", handlers![serve_static]);

    let v1 = router.group("/api/v1", vec![]);
    v1.get("/users/:id", handlers![get_user]);

    let writes = v1.group("/", handlers![require_token]);
    writes
        .post("/users", handlers![create_user])
        .delete("/users/:id", handlers![delete_user]);

    router.print_trees();

    Server::bind("0.0.0.0:3000")?.serve(router).await
}

// Group middleware: stops the chain when the header is missing.
fn require_token(ctx: &mut Context) {
    if ctx.request().header("authorization").is_none() {
        ctx.abort_with_status(StatusCode::UNAUTHORIZED);
    }
}

// GET /api/v1/users/:id
//
// ctx.json takes bytes: serde_json::to_vec(&user)?, or build them by hand.
fn get_user(ctx: &mut Context) {
    let id = ctx.param("id").unwrap_or("unknown").to_owned();
    ctx.json(StatusCode::OK, format!(r#"{{"id":"{id}","name":"alice"}}"#));
}

// POST /api/v1/users
fn create_user(ctx: &mut Context) {
    if ctx.request().body().is_empty() {
        ctx.abort_with_status(StatusCode::BAD_REQUEST);
        return;
    }
    ctx.set_header("location", "/api/v1/users/99");
    ctx.json(StatusCode::CREATED, r#"{"id":"99","name":"new_user"}"#);
}

// DELETE /api/v1/users/:id → 204 No Content
fn delete_user(ctx: &mut Context) {
    ctx.status(StatusCode::NO_CONTENT);
}

// GET /static/*filepath
fn serve_static(ctx: &mut Context) {
    let file = ctx.param("filepath").unwrap_or_default().to_owned();
    ctx.text(StatusCode::OK, format!("would serve {file}"));
}
