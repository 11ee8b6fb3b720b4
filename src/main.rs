use std::sync::Arc;

use portico::config::Config;
use portico::handler::Handler;
use portico::http::response::Response;
use portico::routing::{Route, RouteContext};
use portico::server;
use portico::websocket::EchoSocket;
use tracing_subscriber::EnvFilter;

struct Greeting;

impl Route for Greeting {
    fn get(&self, _ctx: &mut RouteContext<'_>) -> Option<Response> {
        Some(Response::with_content_type("text/plain", "Hello from Portico\n"))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;

    let handler = Arc::new(
        Handler::builder(cfg.clone())
            .root(Greeting)
            .websocket(EchoSocket)
            .build()?,
    );

    tokio::select! {
        res = server::listener::run(&cfg, handler) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
