use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;
use crate::handler::Handler;
use crate::http::connection::ConnectionId;
use crate::server::tcp::{self, TcpConnection};

pub async fn run(cfg: &Config, handler: Arc<Handler>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&cfg.server.listen_addr).await?;
    info!("Listening on {}", cfg.server.listen_addr);

    let sweep_every = Duration::from_secs(cfg.session.sweep_interval_secs.max(1));
    accept_loop(listener, handler, sweep_every).await
}

/// Accepts connections on an already-bound listener, one task each, and
/// runs the session sweep timer alongside.
pub async fn accept_loop(
    listener: TcpListener,
    handler: Arc<Handler>,
    sweep_every: Duration,
) -> anyhow::Result<()> {
    tokio::spawn(sweep_sessions(handler.clone(), sweep_every));

    let next_id = AtomicU64::new(1);

    loop {
        let (socket, peer) = listener.accept().await?;
        let id = ConnectionId::new(next_id.fetch_add(1, Ordering::Relaxed));
        info!(conn = %id, %peer, "Accepted connection");

        let handler = handler.clone();
        tokio::spawn(async move {
            let conn = TcpConnection::new(id);
            if let Err(e) = tcp::serve(socket, conn, handler).await {
                tracing::error!("Connection error from {}: {}", peer, e);
            }
        });
    }
}

async fn sweep_sessions(handler: Arc<Handler>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        handler.sweep_sessions();
    }
}
