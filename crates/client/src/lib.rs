//! Room-call signaling client.
//!
//! Joins a room on a signaling server and negotiates audio/video
//! transport with a group session mixer. Media itself (encoding, ICE,
//! DTLS, RTP) is the job of an external media engine behind the
//! [`engine::MediaEngine`] trait; this crate owns the correlated
//! request/response channel, the capability handshake and the
//! orchestration that sequences transport creation, producer publishing
//! and consumer subscription.
//!
//! ```no_run
//! # use roomcall_client::{ClientConfig, SessionOrchestrator};
//! # async fn run(engine: impl roomcall_client::engine::MediaEngine) -> roomcall_client::Result<()> {
//! let config = ClientConfig::new("ws://localhost:3443", "testroom", "alice");
//! let (session, mut events) = SessionOrchestrator::connect(config, engine).await?;
//! session.join_room().await?;
//! while let Some(event) = events.recv().await {
//!     println!("{}", event.name());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod queue;
pub mod session;
pub mod signaling;

pub use config::{ClientConfig, DeviceInfo, TransportOptions, SIGNALING_SUBPROTOCOL};
pub use engine::{MediaEngine, SdpType, SessionDescription};
pub use error::{Error, Result};
pub use queue::WorkQueue;
pub use session::{SessionEvent, SessionOrchestrator};
pub use signaling::{
    ChannelEvent, SignalingChannel, SignalingTransport, TransportDirection, WebSocketTransport,
};
