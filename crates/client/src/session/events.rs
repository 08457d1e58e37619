//! Session events delivered to the application listener.

use roomcall_core::MediaKind;

/// What the session reports while it runs: a typed surface instead of
/// log-only reporting. The session keeps running regardless of whether
/// anyone listens.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The join handshake completed; `peers` lists who was already in
    /// the room.
    Joined { peers: Vec<String> },

    /// A remote stream was subscribed and its negotiation round
    /// completed.
    ConsumerAdded {
        id: u32,
        kind: MediaKind,
        track_id: String,
    },

    /// A local track was published end to end.
    ProducerCreated { kind: MediaKind },

    /// A peer left the room.
    PeerClosed { name: String },

    /// The dominant speaker changed.
    ActiveSpeaker { peer_name: Option<String> },

    /// The signaling connection closed; the session is over.
    SignalingClosed,

    /// The signaling connection failed; the session is over.
    SignalingError { message: String },
}

impl SessionEvent {
    /// Event name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Joined { .. } => "joined",
            SessionEvent::ConsumerAdded { .. } => "consumer_added",
            SessionEvent::ProducerCreated { .. } => "producer_created",
            SessionEvent::PeerClosed { .. } => "peer_closed",
            SessionEvent::ActiveSpeaker { .. } => "active_speaker",
            SessionEvent::SignalingClosed => "signaling_closed",
            SessionEvent::SignalingError { .. } => "signaling_error",
        }
    }
}
