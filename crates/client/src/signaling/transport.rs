//! Raw message-transport abstraction under the signaling channel.
//!
//! The channel only needs an ordered, bidirectional stream of text
//! frames. Socket framing, TLS and the upgrade handshake belong to the
//! concrete binding (see [`super::websocket`]).

use async_trait::async_trait;

use crate::error::Result;

/// A connected signaling transport, split into its two directions so
/// the channel can drive reads and writes from independent tasks.
pub trait SignalingTransport: Send + 'static {
    type Sender: TransportSender;
    type Receiver: TransportReceiver;

    fn split(self) -> (Self::Sender, Self::Receiver);
}

/// Write half: one `send` at a time; the caller guarantees it never
/// issues a second write before the first resolves.
#[async_trait]
pub trait TransportSender: Send + 'static {
    async fn send(&mut self, frame: String) -> Result<()>;

    /// Close the stream in an orderly fashion.
    async fn close(&mut self) -> Result<()>;
}

/// Read half: `Ok(None)` signals an orderly close.
#[async_trait]
pub trait TransportReceiver: Send + 'static {
    async fn recv(&mut self) -> Result<Option<String>>;
}
