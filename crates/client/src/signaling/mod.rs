//! Signaling: wire protocol, correlation channel and transport
//! bindings.

pub mod channel;
pub mod protocol;
pub mod transport;
pub mod websocket;

pub use channel::{ChannelEvent, SignalingChannel};
pub use protocol::{
    ConsumerEntry, ConsumerRecord, Frame, PeerInfo, PeerRequest, RemoteTransportParameters,
    RequestFrame, ResponseFrame, RoomSettings, ServerRequest, TransportDirection,
};
pub use transport::{SignalingTransport, TransportReceiver, TransportSender};
pub use websocket::WebSocketTransport;
