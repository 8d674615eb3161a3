//! Gateway - the listener serving the chat and introspection routes.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tracing::info;

use crate::http::{alive_handler, stats_handler, track_route, AppContext};
use crate::http::{ROUTE_ALIVE, ROUTE_CHAT, ROUTE_STATS};
use crate::network::connection::chat_handler;

/// The Gateway binds the configured address and serves until the manager's
/// shutdown signal fires.
pub struct Gateway {
    listener: TcpListener,
    local_addr: SocketAddr,
    ctx: Arc<AppContext>,
}

impl Gateway {
    /// Bind the gateway to the configured hostname and port.
    pub async fn bind(ctx: Arc<AppContext>) -> std::io::Result<Self> {
        let addr = format!("{}:{}", ctx.config.server.hostname, ctx.config.server.port);
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "gateway listening");
        Ok(Self {
            listener,
            local_addr,
            ctx,
        })
    }

    /// The bound address. With port 0 in the config this is where the
    /// ephemeral port shows up.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve requests until shutdown, then drain gracefully.
    pub async fn run(self) -> std::io::Result<()> {
        let mut shutdown = self.ctx.manager.subscribe_shutdown();
        let app = Router::new()
            .route(ROUTE_CHAT, get(chat_handler))
            .route(ROUTE_ALIVE, get(alive_handler))
            .route(ROUTE_STATS, get(stats_handler))
            .layer(middleware::from_fn_with_state(
                Arc::clone(&self.ctx),
                track_route,
            ))
            .with_state(self.ctx);
        axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
    }
}
