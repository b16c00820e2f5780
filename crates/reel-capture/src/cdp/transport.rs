//! Socket transport to a single debugging target.
//!
//! [`CdpTransport`] is the seam between the orchestrator and the wire. The
//! production implementation is [`WsTransport`] over `tokio-tungstenite`,
//! which already reassembles continuation frames, so every item read from
//! the stream is one complete logical message.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};

use super::codec::{self, Command, Message};
use crate::error::CaptureError;
use crate::types::duration_ms;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Send/receive primitives over one debugging connection.
#[async_trait]
pub trait CdpTransport: Send {
    /// Send one command.
    async fn send(&mut self, command: &Command) -> Result<(), CaptureError>;

    /// Wait up to `timeout` for one complete message.
    async fn receive_one(&mut self, timeout: Duration) -> Result<Message, CaptureError>;

    /// Close the connection. Calling this on a closed transport is a no-op.
    async fn close(&mut self) -> Result<(), CaptureError>;

    /// Whether the connection is still usable.
    fn is_open(&self) -> bool;
}

/// WebSocket transport.
pub struct WsTransport {
    url: String,
    stream: Option<WsStream>,
}

impl WsTransport {
    /// Open the socket at `url`.
    pub async fn connect(url: &str) -> Result<Self, CaptureError> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| CaptureError::Connection {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        debug!(url, "connected to debugging socket");
        Ok(Self {
            url: url.to_string(),
            stream: Some(stream),
        })
    }

    fn lost(&mut self, reason: impl Into<String>) -> CaptureError {
        self.stream = None;
        CaptureError::Connection {
            url: self.url.clone(),
            reason: reason.into(),
        }
    }

    fn closed(&self) -> CaptureError {
        CaptureError::Connection {
            url: self.url.clone(),
            reason: "transport is closed".into(),
        }
    }
}

#[async_trait]
impl CdpTransport for WsTransport {
    async fn send(&mut self, command: &Command) -> Result<(), CaptureError> {
        let text = codec::encode(command)?;
        let Some(stream) = self.stream.as_mut() else {
            return Err(self.closed());
        };
        trace!(id = command.id, method = %command.method, "send");
        if let Err(e) = stream.send(WsMessage::Text(text.into())).await {
            return Err(self.lost(format!("send failed: {e}")));
        }
        Ok(())
    }

    async fn receive_one(&mut self, timeout: Duration) -> Result<Message, CaptureError> {
        let deadline = Instant::now() + timeout;
        loop {
            let Some(stream) = self.stream.as_mut() else {
                return Err(self.closed());
            };
            let next = tokio::time::timeout_at(deadline, stream.next())
                .await
                .map_err(|_| CaptureError::ReceiveTimeout {
                    timeout_ms: duration_ms(timeout),
                })?;

            let text = match next {
                None => return Err(self.lost("socket closed by peer")),
                Some(Err(e)) => return Err(self.lost(e.to_string())),
                Some(Ok(WsMessage::Close(frame))) => {
                    let reason = frame.map_or_else(
                        || "socket closed by peer".to_string(),
                        |f| format!("socket closed by peer: {}", f.reason.as_str()),
                    );
                    return Err(self.lost(reason));
                }
                Some(Ok(WsMessage::Text(text))) => text.as_str().to_owned(),
                Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => text,
                    Err(_) => {
                        warn!(len = bytes.len(), "skipping non-UTF-8 binary message");
                        continue;
                    }
                },
                Some(Ok(_)) => continue,
            };

            match codec::decode(&text) {
                Ok(message) => return Ok(message),
                Err(e) => warn!(error = %e, "skipping malformed message"),
            }
        }
    }

    async fn close(&mut self) -> Result<(), CaptureError> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        if let Err(e) = stream.close(None).await {
            debug!(error = %e, "socket close handshake failed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}
