//! Test chat client.
//!
//! A WebSocket client for integration testing that can send requests and
//! assert on received response frames.

#![allow(dead_code)]

use std::time::Duration;

use chatterd::proto::ChatResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A test chat client.
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    /// Connect to a test server's chat endpoint.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let (ws, _) = connect_async(url).await?;
        Ok(Self { ws })
    }

    /// Send one request frame.
    pub async fn send(&mut self, room: &str, req_type: u16, content: &str) -> anyhow::Result<()> {
        let frame = serde_json::json!({
            "roomName": room,
            "reqType": req_type,
            "content": content,
        })
        .to_string();
        self.send_raw(&frame).await
    }

    /// Send a raw text frame.
    pub async fn send_raw(&mut self, frame: &str) -> anyhow::Result<()> {
        self.ws.send(Message::text(frame.to_string())).await?;
        Ok(())
    }

    /// Receive the next response as raw JSON.
    pub async fn recv_raw(&mut self) -> anyhow::Result<serde_json::Value> {
        loop {
            let msg = timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .map_err(|_| anyhow::anyhow!("timed out waiting for a frame"))?
                .ok_or_else(|| anyhow::anyhow!("connection closed"))??;
            match msg {
                Message::Text(text) => return Ok(serde_json::from_str(&text)?),
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(_) => anyhow::bail!("connection closed"),
                other => anyhow::bail!("unexpected frame: {other:?}"),
            }
        }
    }

    /// Receive the next response as a decoded envelope.
    pub async fn recv(&mut self) -> anyhow::Result<ChatResponse> {
        Ok(serde_json::from_value(self.recv_raw().await?)?)
    }

    /// Receive frames until the predicate matches, returning the match.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<ChatResponse>
    where
        F: FnMut(&ChatResponse) -> bool,
    {
        loop {
            let rsp = self.recv().await?;
            if predicate(&rsp) {
                return Ok(rsp);
            }
        }
    }

    /// Assert no frame arrives within the window.
    pub async fn expect_silence(&mut self, window: Duration) -> anyhow::Result<()> {
        match timeout(window, self.ws.next()).await {
            Err(_) => Ok(()),
            Ok(None) => anyhow::bail!("connection closed while expecting silence"),
            Ok(Some(frame)) => anyhow::bail!("unexpected frame: {:?}", frame?),
        }
    }

    /// Assert the server closes the connection within the window.
    pub async fn expect_closed(&mut self, window: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match timeout(remaining, self.ws.next()).await {
                Err(_) => anyhow::bail!("socket still open"),
                Ok(None) => return Ok(()),
                Ok(Some(Ok(Message::Close(_)))) => return Ok(()),
                Ok(Some(Ok(_))) => continue,
                // A reset from the server counts as closed.
                Ok(Some(Err(_))) => return Ok(()),
            }
        }
    }

    /// Close the connection politely.
    pub async fn close(mut self) -> anyhow::Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}
