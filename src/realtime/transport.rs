use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

/// Persistent text-frame connection to the transcription endpoint.
///
/// `recv` yields inbound text frames in wire arrival order; `None` means the
/// peer closed the connection. `close` may be called more than once.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, text: String) -> Result<()>;

    async fn recv(&mut self) -> Option<Result<String>>;

    async fn close(&mut self) -> Result<()>;
}

/// Websocket transport over tokio-tungstenite.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl WsTransport {
    /// Connect with the authentication headers the realtime endpoint expects.
    pub async fn connect(url: &str, api_key: &str) -> Result<Self> {
        let mut request = url
            .into_client_request()
            .context("Failed to build websocket request")?;
        request.headers_mut().insert(
            "Authorization",
            format!("Bearer {api_key}")
                .parse()
                .context("API key is not a valid header value")?,
        );
        request.headers_mut().insert(
            "OpenAI-Beta",
            "realtime=v1".parse().context("Invalid header value")?,
        );

        let (stream, _response) = connect_async(request)
            .await
            .context("Failed to connect to the realtime endpoint")?;

        info!("Connected to {}", url);

        Ok(Self {
            stream,
            closed: false,
        })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::Text(text))
            .await
            .context("Failed to send websocket frame")
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(m) => m,
                Err(e) => return Some(Err(e).context("Websocket read failed")),
            };

            match message {
                Message::Text(text) => return Some(Ok(text)),
                Message::Ping(payload) => {
                    if let Err(e) = self.stream.send(Message::Pong(payload)).await {
                        return Some(Err(e).context("Failed to answer websocket ping"));
                    }
                }
                Message::Close(frame) => {
                    info!("Websocket closed by peer: {:?}", frame);
                    return None;
                }
                other => debug!("Ignoring non-text frame: {:?}", other),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // The peer may already be gone at this point; that is not an error.
        if let Err(e) = self.stream.close(None).await {
            debug!("Websocket close handshake failed: {}", e);
        }

        Ok(())
    }
}
