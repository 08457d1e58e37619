//! WebSocket binding of the signaling transport.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

use super::transport::{SignalingTransport, TransportReceiver, TransportSender};
use crate::error::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A connected WebSocket signaling transport.
pub struct WebSocketTransport {
    stream: WsStream,
}

impl WebSocketTransport {
    /// Connect to the signaling server and perform the upgrade
    /// handshake, offering `subprotocol` as the single
    /// `Sec-WebSocket-Protocol` identifier.
    pub async fn connect(url: &Url, subprotocol: &str) -> Result<Self> {
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::Transport(format!("invalid signaling url: {e}")))?;
        request.headers_mut().insert(
            SEC_WEBSOCKET_PROTOCOL,
            HeaderValue::from_str(subprotocol)
                .map_err(|e| Error::Transport(format!("invalid subprotocol: {e}")))?,
        );

        let (stream, response) = connect_async(request)
            .await
            .map_err(|e| Error::Transport(format!("websocket handshake failed: {e}")))?;
        debug!(status = %response.status(), %url, "signaling websocket connected");

        Ok(Self { stream })
    }
}

impl SignalingTransport for WebSocketTransport {
    type Sender = WebSocketSender;
    type Receiver = WebSocketReceiver;

    fn split(self) -> (Self::Sender, Self::Receiver) {
        let (sink, stream) = self.stream.split();
        (WebSocketSender { sink }, WebSocketReceiver { stream })
    }
}

/// Write half of a [`WebSocketTransport`].
pub struct WebSocketSender {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl TransportSender for WebSocketSender {
    async fn send(&mut self, frame: String) -> Result<()> {
        self.sink
            .send(Message::Text(frame))
            .await
            .map_err(|e| Error::Transport(format!("websocket send failed: {e}")))
    }

    async fn close(&mut self) -> Result<()> {
        match self.sink.close().await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(e) => Err(Error::Transport(format!("websocket close failed: {e}"))),
        }
    }
}

/// Read half of a [`WebSocketTransport`].
pub struct WebSocketReceiver {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl TransportReceiver for WebSocketReceiver {
    async fn recv(&mut self) -> Result<Option<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(other)) => {
                    warn!("ignoring non-text signaling frame: {other:?}");
                    continue;
                }
                Some(Err(
                    tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed,
                )) => return Ok(None),
                Some(Err(e)) => {
                    return Err(Error::Transport(format!("websocket receive failed: {e}")))
                }
            }
        }
    }
}
