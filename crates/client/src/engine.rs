//! Media-engine collaborator boundary.
//!
//! The client does not encode media, gather ICE candidates or run DTLS;
//! an external engine does. The orchestrator only needs the four
//! session-description operations below, one engine-side session per
//! transport lane. Every operation is asynchronous: awaiting its future
//! is the point where engine-internal threads hand control back to the
//! orchestrator, so shared session state is only ever touched from
//! orchestrator tasks.

use async_trait::async_trait;
use tokio::sync::mpsc;

use roomcall_core::SdpDocument;

use crate::error::Result;
use crate::signaling::TransportDirection;

/// Offer/answer role of a session description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpType {
    Offer,
    Answer,
}

/// A session description as exchanged with the engine.
///
/// `document` is the parsed form of `sdp`. Engines populate it for
/// locally created descriptions (the capability extraction walks it);
/// remote descriptions travel as text only, since the client never
/// inspects them.
#[derive(Debug, Clone)]
pub struct SessionDescription {
    pub kind: SdpType,
    pub sdp: String,
    pub document: Option<SdpDocument>,
}

impl SessionDescription {
    /// A remote description from wire text.
    pub fn remote(kind: SdpType, sdp: impl Into<String>) -> Self {
        Self {
            kind,
            sdp: sdp.into(),
            document: None,
        }
    }
}

/// Engine-side connection state for one transport lane. The client
/// only logs these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// A connection-state change reported by the engine.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionStateEvent {
    pub direction: TransportDirection,
    pub state: ConnectionState,
}

/// The media-engine collaborator.
#[async_trait]
pub trait MediaEngine: Send + Sync + 'static {
    /// Create a local offer for the given lane.
    async fn create_local_offer(&self, direction: TransportDirection)
        -> Result<SessionDescription>;

    /// Apply a local description to the given lane.
    async fn set_local_description(
        &self,
        direction: TransportDirection,
        description: SessionDescription,
    ) -> Result<()>;

    /// Apply a remote description to the given lane.
    async fn set_remote_description(
        &self,
        direction: TransportDirection,
        description: SessionDescription,
    ) -> Result<()>;

    /// Create an answer for the given lane's current remote offer.
    async fn create_answer(&self, direction: TransportDirection) -> Result<SessionDescription>;

    /// Hand over the engine's connection-state event stream, if it
    /// reports one. Called at most once.
    fn take_state_events(&self) -> Option<mpsc::UnboundedReceiver<ConnectionStateEvent>> {
        None
    }
}
