//! Join a room and publish a microphone track.
//!
//! The media engine here is a stand-in that hands out a canned opus
//! offer; wire in a real engine binding to actually move media.
//!
//! Usage:
//!   join_room [ws://localhost:3443] [room] [peer-name]

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use roomcall_client::engine::{MediaEngine, SdpType, SessionDescription};
use roomcall_client::{ClientConfig, SessionEvent, SessionOrchestrator, TransportDirection};
use roomcall_core::{MediaKind, SdpDocument};

/// Placeholder engine: answers every operation successfully and
/// advertises a single opus capability.
struct NullEngine;

impl NullEngine {
    fn offer_document() -> SdpDocument {
        serde_json::from_value(json!({
            "media": [{
                "type": "audio",
                "mid": "0",
                "rtp": [{"payload": 100, "codec": "opus", "rate": 48000, "encoding": 2}],
                "fmtp": [{"payload": 100, "config": "minptime=10;useinbandfec=1"}]
            }]
        }))
        .expect("static offer document")
    }
}

#[async_trait]
impl MediaEngine for NullEngine {
    async fn create_local_offer(
        &self,
        direction: TransportDirection,
    ) -> roomcall_client::Result<SessionDescription> {
        info!(%direction, "creating local offer");
        Ok(SessionDescription {
            kind: SdpType::Offer,
            sdp: "v=0 null-engine-offer".to_string(),
            document: Some(Self::offer_document()),
        })
    }

    async fn set_local_description(
        &self,
        direction: TransportDirection,
        description: SessionDescription,
    ) -> roomcall_client::Result<()> {
        info!(%direction, kind = ?description.kind, "applying local description");
        Ok(())
    }

    async fn set_remote_description(
        &self,
        direction: TransportDirection,
        description: SessionDescription,
    ) -> roomcall_client::Result<()> {
        info!(%direction, kind = ?description.kind, "applying remote description");
        Ok(())
    }

    async fn create_answer(
        &self,
        direction: TransportDirection,
    ) -> roomcall_client::Result<SessionDescription> {
        info!(%direction, "creating answer");
        Ok(SessionDescription {
            kind: SdpType::Answer,
            sdp: "v=0 null-engine-answer".to_string(),
            document: None,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,roomcall_client=debug".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let server_url = args
        .next()
        .unwrap_or_else(|| "ws://localhost:3443".to_string());
    let room_id = args.next().unwrap_or_else(|| "testroom".to_string());
    let peer_name = args.next().unwrap_or_else(|| "rustacean".to_string());

    let config = ClientConfig::new(server_url, room_id, peer_name);
    let (session, mut events) = SessionOrchestrator::connect(config, NullEngine).await?;

    session.join_room().await?;
    session.add_producer(MediaKind::Audio, "mic-0").await?;

    while let Some(event) = events.recv().await {
        info!(event = event.name(), "session event");
        match event {
            SessionEvent::SignalingClosed | SessionEvent::SignalingError { .. } => break,
            _ => {}
        }
    }
    Ok(())
}
