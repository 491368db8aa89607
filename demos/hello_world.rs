//! A small API served on 127.0.0.1:8080.
//!
//! ```text
//! cargo run --example hello_world
//! curl localhost:8080/articles/42
//! curl localhost:8080/admin/stats -H 'Authorization: yes'
//! curl localhost:8080/routes
//! ```

use std::time::Duration;

use rmux::context::Context;
use rmux::docgen;
use rmux::middleware::{Logger, Next, RealIp, Throttle, Timeout};
use rmux::router::{Mux, Router};
use rmux::server::Server;
use rmux::{Response, StatusCode};
use tracing_subscriber::EnvFilter;

async fn index(_: Context) -> Response {
    Response::new(StatusCode::Ok).body("Hello, World!")
}

async fn show_article(ctx: Context) -> Response {
    let id = ctx.param("articleID").unwrap_or_default();
    Response::new(StatusCode::Ok).body(format!("article {id}"))
}

async fn download(ctx: Context) -> Response {
    let file = ctx.param("*").unwrap_or_default();
    Response::new(StatusCode::Ok).body(format!("file {file}"))
}

async fn require_auth(ctx: Context, next: Next) -> Response {
    if ctx.request().headers().contains("authorization") {
        next.run(ctx).await
    } else {
        Response::new(StatusCode::Unauthorized)
    }
}

fn admin_router() -> Mux {
    let mut admin = Mux::new();
    admin.use_middleware(require_auth);
    admin.get("/stats", |_: Context| async {
        Response::new(StatusCode::Ok).body("all good")
    });
    admin
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut mux = Mux::new();
    mux.use_middleware(RealIp);
    mux.use_middleware(Logger);
    mux.use_middleware(Timeout::new(Duration::from_secs(10)));
    mux.use_middleware(Throttle::new(256));

    mux.get("/", index);
    mux.route("/articles", |articles| {
        articles.get("/{articleID:[0-9]+}", show_article);
    });
    mux.get("/files/*", download);
    mux.mount("/admin", admin_router());

    let doc = docgen::json_routes_doc(&mux)?;
    mux.get("/routes", move |_: Context| {
        let doc = doc.clone();
        async move {
            Response::new(StatusCode::Ok)
                .header("Content-Type", "application/json")
                .body(doc)
        }
    });

    let server = Server::bind("127.0.0.1:8080").await?;
    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    server.serve(mux.into_service()).await?;
    Ok(())
}
