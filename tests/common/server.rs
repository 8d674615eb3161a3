//! Test server management.
//!
//! Spawns in-process chatterd instances on an ephemeral port for
//! integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use chatterd::{AppContext, ChatManager, Config, Gateway};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::client::TestClient;

/// A running test server.
pub struct TestServer {
    addr: SocketAddr,
    manager: Arc<ChatManager>,
    server: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    /// Spawn a server with default configuration.
    pub async fn spawn() -> anyhow::Result<Self> {
        Self::spawn_with(Config::default()).await
    }

    /// Spawn a server with the given configuration. The listen address is
    /// always overridden to an ephemeral loopback port.
    pub async fn spawn_with(mut config: Config) -> anyhow::Result<Self> {
        config.server.hostname = "127.0.0.1".to_string();
        config.server.port = 0;

        let manager = Arc::new(ChatManager::new(&config));
        let ctx = Arc::new(AppContext::new(config, Arc::clone(&manager)));
        let gateway = Gateway::bind(ctx).await?;
        let addr = gateway.local_addr();
        let server = tokio::spawn(gateway.run());

        Ok(Self {
            addr,
            manager,
            server,
        })
    }

    /// Get the server address.
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// The WebSocket URL of the chat endpoint.
    pub fn ws_url(&self) -> String {
        format!("ws://{}/v1.0/chat", self.addr)
    }

    pub fn manager(&self) -> &Arc<ChatManager> {
        &self.manager
    }

    /// Create a new test client connected to this server.
    pub async fn connect(&self) -> anyhow::Result<TestClient> {
        TestClient::connect(&self.ws_url()).await
    }

    /// Shut the server down and wait for every task to finish.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.manager.shutdown().await;
        self.server.await??;
        Ok(())
    }

    /// Issue a plain HTTP GET against the server and return status + body.
    pub async fn http_get(&self, path: &str) -> anyhow::Result<(u16, String)> {
        let mut stream = TcpStream::connect(self.addr).await?;
        stream
            .write_all(
                format!("GET {path} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n", self.addr)
                    .as_bytes(),
            )
            .await?;
        let mut response = String::new();
        stream.read_to_string(&mut response).await?;

        let status = response
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .ok_or_else(|| anyhow::anyhow!("malformed response: {response}"))?;
        let body = response
            .split_once("\r\n\r\n")
            .map(|(_, body)| body.to_string())
            .unwrap_or_default();
        Ok((status, body))
    }
}
