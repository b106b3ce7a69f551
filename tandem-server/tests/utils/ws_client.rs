use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tandem_core::SignalMessage;
use tandem_server::SignalingService;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::signal_helpers::SIGNAL_TIMEOUT_MS;

/// Serves the full router on an ephemeral local port.
pub async fn spawn_server(service: SignalingService) -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("Failed to bind test listener")?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, tandem_server::app(service)).await {
            tracing::error!("[TestServer] {}", e);
        }
    });

    Ok(addr)
}

/// Plain HTTP GET, returning the raw response.
pub async fn http_get(addr: SocketAddr, path: &str) -> Result<String> {
    let mut stream = TcpStream::connect(addr).await?;
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;

    let mut response = String::new();
    tokio::time::timeout(
        Duration::from_millis(SIGNAL_TIMEOUT_MS),
        stream.read_to_string(&mut response),
    )
    .await
    .context("Timeout reading HTTP response")??;
    Ok(response)
}

/// A signaling client speaking JSON over a real WebSocket.
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let (stream, _) = connect_async(format!("ws://{addr}/ws"))
            .await
            .context("WebSocket handshake failed")?;
        Ok(Self { stream })
    }

    pub async fn send(&mut self, message: &SignalMessage) -> Result<()> {
        let json = serde_json::to_string(message)?;
        self.send_text(&json).await
    }

    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.stream
            .send(Message::text(text.to_string()))
            .await
            .context("Failed to send text frame")
    }

    pub async fn send_binary(&mut self, data: &[u8]) -> Result<()> {
        self.stream
            .send(Message::binary(data.to_vec()))
            .await
            .context("Failed to send binary frame")
    }

    /// Next signaling message, skipping server pings. `None` once the server
    /// has closed the socket.
    pub async fn recv(&mut self) -> Result<Option<SignalMessage>> {
        let timeout = Duration::from_millis(SIGNAL_TIMEOUT_MS);

        loop {
            let frame = tokio::time::timeout(timeout, self.stream.next())
                .await
                .context("Timeout waiting for frame")?;

            match frame {
                Some(Ok(Message::Text(text))) => {
                    let msg: SignalMessage = serde_json::from_str(text.as_str())
                        .context("Server sent an undecodable frame")?;
                    if !matches!(msg, SignalMessage::Ping { .. }) {
                        return Ok(Some(msg));
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return Ok(None),
                Some(Ok(_)) => continue,
            }
        }
    }

    /// Skips messages until one matches `pred`.
    pub async fn expect<F>(&mut self, mut pred: F) -> Result<SignalMessage>
    where
        F: FnMut(&SignalMessage) -> bool,
    {
        loop {
            match self.recv().await? {
                Some(msg) if pred(&msg) => return Ok(msg),
                Some(_) => continue,
                None => anyhow::bail!("Socket closed"),
            }
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.stream
            .close(None)
            .await
            .context("Failed to close socket")
    }
}
