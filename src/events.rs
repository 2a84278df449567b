//! Spot event stream transport
//!
//! Single responsibility: open a connection to the push channel and hand
//! back raw text messages. No knowledge of spots, rosters or retry policy;
//! the synchronizer owns reconnection.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::debug;

use crate::error::{MonitorError, Result};

/// Opens push-channel connections
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Establish a new connection; returns only once it is open
    async fn connect(&self) -> Result<Box<dyn EventStream>>;
}

/// One open push-channel connection
#[async_trait]
pub trait EventStream: Send {
    /// Next inbound text message.
    ///
    /// `Ok(None)` means the peer closed the connection.
    async fn next_message(&mut self) -> Result<Option<String>>;

    /// Close the connection; errors are ignored
    async fn close(&mut self);
}

/// WebSocket push channel (`/ws/spots`)
#[derive(Debug, Clone)]
pub struct WsEventSource {
    url: String,
}

impl WsEventSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EventSource for WsEventSource {
    async fn connect(&self) -> Result<Box<dyn EventStream>> {
        debug!(url = %self.url, "Connecting to spot event stream");

        if self.url.starts_with("wss://") {
            // Already installed is fine
            let _ = rustls::crypto::ring::default_provider().install_default();
        }

        let (ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| MonitorError::Connection(format!("WebSocket connect failed: {}", e)))?;

        debug!(url = %self.url, "WebSocket connected");
        Ok(Box::new(WsEventStream { ws }))
    }
}

struct WsEventStream {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl EventStream for WsEventStream {
    async fn next_message(&mut self) -> Result<Option<String>> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) => return Ok(None),
                // Pong is handled automatically by tungstenite
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(MonitorError::Connection(format!("WebSocket error: {}", e)))
                }
                None => return Ok(None),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.ws.close(None).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        // Port 9 (discard) is not expected to accept WebSocket upgrades locally
        let source = WsEventSource::new("ws://127.0.0.1:9/ws/spots");
        let result = source.connect().await;
        assert!(matches!(result, Err(MonitorError::Connection(_))));
    }

    #[tokio::test]
    async fn test_wss_connect_starts_tls_handshake() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut first = [0u8; 1];
            socket.read_exact(&mut first).await.unwrap();
            first[0]
        });

        let source = WsEventSource::new(format!("wss://127.0.0.1:{}/ws/spots", port));
        let result = source.connect().await;

        // 0x16: TLS handshake record carrying the ClientHello
        assert_eq!(server.await.unwrap(), 0x16);
        match result {
            Err(MonitorError::Connection(message)) => {
                assert!(!message.contains("TLS support not compiled in"), "{}", message);
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("plain TCP peer accepted a TLS connection"),
        }
    }

    #[test]
    fn test_url() {
        let source = WsEventSource::new("ws://localhost:8000/ws/spots");
        assert_eq!(source.url(), "ws://localhost:8000/ws/spots");
    }
}
