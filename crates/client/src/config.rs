//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Sub-protocol identifier offered during the WebSocket upgrade.
pub const SIGNALING_SUBPROTOCOL: &str = "roomcall";

/// Configuration for one room-call session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Signaling server endpoint, e.g. `ws://localhost:3443`.
    pub server_url: String,

    /// Room to join.
    pub room_id: String,

    /// Peer name announced to the server; also used as the default
    /// display name.
    pub peer_name: String,

    /// Display name shown to other participants. Falls back to
    /// `peer_name` when empty.
    pub display_name: String,

    /// Device metadata sent with the join request.
    pub device: DeviceInfo,

    /// Transport options forwarded to `createTransport`.
    pub transport_options: TransportOptions,

    /// How long to wait for a response to a signaling request.
    /// `None` waits forever (a request whose response never arrives
    /// then leaks its handler, as the observed protocol allows).
    #[serde(skip)]
    pub request_timeout: Option<Duration>,

    /// Upper bound for one queued consumer-negotiation round.
    #[serde(skip)]
    pub consumer_round_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            room_id: String::new(),
            peer_name: String::new(),
            display_name: String::new(),
            device: DeviceInfo::default(),
            transport_options: TransportOptions::default(),
            request_timeout: None,
            consumer_round_timeout: None,
        }
    }
}

impl ClientConfig {
    /// Config for joining `room_id` on `server_url` as `peer_name`,
    /// with defaults everywhere else.
    pub fn new(
        server_url: impl Into<String>,
        room_id: impl Into<String>,
        peer_name: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            room_id: room_id.into(),
            peer_name: peer_name.into(),
            ..Default::default()
        }
    }

    /// The display name to announce.
    pub fn effective_display_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.peer_name
        } else {
            &self.display_name
        }
    }

    /// The signaling endpoint with peer and room identity in the query
    /// string.
    pub fn signaling_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.server_url)
            .map_err(|e| Error::Transport(format!("invalid server url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("peerName", &self.peer_name)
            .append_pair("roomId", &self.room_id);
        Ok(url)
    }
}

/// Device metadata announced at join time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceInfo {
    pub flag: String,
    pub name: String,
    pub version: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            flag: "roomcall".to_string(),
            name: "roomcall-client".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Options forwarded to the server when creating a transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportOptions {
    /// Whether the server may offer TCP candidates.
    pub tcp: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self { tcp: false }
    }
}
