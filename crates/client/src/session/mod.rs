//! Session orchestration: transport lifecycle, producer publishing and
//! consumer subscription against the signaling channel.
//!
//! The orchestrator owns all mutable session state (room settings, the
//! two transport lanes, the consumer table) behind one shared handle.
//! The inbound dispatch task and queued consumer rounds hold clones of
//! that handle; nothing holds a reference back into the orchestrator,
//! and every engine completion is an awaited future, so state is only
//! ever mutated from orchestrator tasks.

mod consumer;
mod events;
mod transport;

pub use events::SessionEvent;
pub use transport::TransportLane;

use std::collections::BTreeMap;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use roomcall_core::{effective_rtp_capabilities, MediaKind};

use crate::config::{ClientConfig, SIGNALING_SUBPROTOCOL};
use crate::engine::{MediaEngine, SdpType, SessionDescription};
use crate::error::{Error, Result};
use crate::queue::WorkQueue;
use crate::signaling::protocol::{
    CreateProducerRequest, JoinAppData, JoinRequest, NewConsumerSdpRequest, NewProducerSdpRequest,
    ProducerAppData, QueryRoomRequest, UNKNOWN_REQUEST_REASON,
};
use crate::signaling::{
    ChannelEvent, ConsumerEntry, ConsumerRecord, PeerRequest, RequestFrame, RoomSettings,
    SignalingChannel, TransportDirection, WebSocketTransport,
};

/// The session state machine for one room call.
pub struct SessionOrchestrator<E: MediaEngine> {
    shared: Arc<Shared<E>>,
}

struct Shared<E> {
    config: ClientConfig,
    channel: SignalingChannel,
    engine: E,
    queue: WorkQueue,
    events: mpsc::UnboundedSender<SessionEvent>,
    /// Room capability document; assigned at query/join time, read-only
    /// afterwards.
    room: parking_lot::Mutex<Option<RoomSettings>>,
    send_lane: TransportLane,
    recv_lane: TransportLane,
    /// Id source for server-facing transport ids.
    transport_ids: AtomicU32,
    /// Consumer table keyed by server-assigned id. Entries are never
    /// removed.
    consumers: parking_lot::Mutex<BTreeMap<u32, ConsumerEntry>>,
    /// The send lane's initial local offer, reused by every
    /// renegotiation request.
    initial_send_offer: parking_lot::Mutex<Option<String>>,
}

impl<E: MediaEngine> SessionOrchestrator<E> {
    /// Connect to the signaling server named by `config` and start a
    /// session over it.
    pub async fn connect(
        config: ClientConfig,
        engine: E,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>)> {
        let url = config.signaling_url()?;
        let transport = WebSocketTransport::connect(&url, SIGNALING_SUBPROTOCOL).await?;
        let (channel, channel_events) = SignalingChannel::start(transport, config.request_timeout);
        Ok(Self::start(channel, channel_events, engine, config))
    }

    /// Start a session over an already connected signaling channel.
    pub fn start(
        channel: SignalingChannel,
        channel_events: mpsc::UnboundedReceiver<ChannelEvent>,
        engine: E,
        config: ClientConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let queue = WorkQueue::new(config.consumer_round_timeout);

        let shared = Arc::new(Shared {
            config,
            channel,
            engine,
            queue,
            events: event_tx,
            room: parking_lot::Mutex::new(None),
            send_lane: TransportLane::new(TransportDirection::Send),
            recv_lane: TransportLane::new(TransportDirection::Receive),
            transport_ids: AtomicU32::new(1),
            consumers: parking_lot::Mutex::new(BTreeMap::new()),
            initial_send_offer: parking_lot::Mutex::new(None),
        });

        if let Some(mut state_rx) = shared.engine.take_state_events() {
            tokio::spawn(async move {
                while let Some(event) = state_rx.recv().await {
                    info!(
                        direction = %event.direction,
                        state = ?event.state,
                        "engine connection state changed"
                    );
                }
            });
        }

        tokio::spawn(dispatch_loop(Arc::clone(&shared), channel_events));

        (Self { shared }, event_rx)
    }

    /// Join the configured room: fetch the room capability document,
    /// bootstrap the send lane's local description, advertise the
    /// effective capabilities, and subscribe to every consumer the
    /// peers already in the room expose.
    pub async fn join_room(&self) -> Result<()> {
        let shared = &self.shared;

        let room = shared.channel.request(&QueryRoomRequest::default()).await?;
        debug!("room capability document received");
        *shared.room.lock() = Some(room);

        // The send lane's initial offer is both our local description
        // and the document we derive advertised capabilities from.
        let offer = shared
            .engine
            .create_local_offer(TransportDirection::Send)
            .await?;
        let document = offer.document.clone().ok_or_else(|| {
            Error::Negotiation("engine returned a local offer without a parsed document".into())
        })?;
        *shared.initial_send_offer.lock() = Some(offer.sdp.clone());
        shared
            .engine
            .set_local_description(TransportDirection::Send, offer)
            .await?;

        let room_caps = shared
            .room
            .lock()
            .as_ref()
            .map(|room| room.rtp_capabilities.clone())
            .unwrap_or_default();
        let rtp_capabilities = effective_rtp_capabilities(&document, &room_caps);

        let response = shared
            .channel
            .request(&JoinRequest {
                peer_name: shared.config.peer_name.clone(),
                rtp_capabilities,
                app_data: JoinAppData {
                    device: shared.config.device.clone(),
                    display_name: shared.config.effective_display_name().to_string(),
                },
            })
            .await?;
        info!(peers = response.peers.len(), "joined room");
        *shared.room.lock() = Some(response.settings);

        shared
            .recv_lane
            .ensure_created(
                &shared.channel,
                &shared.config.transport_options,
                &shared.transport_ids,
            )
            .await?;

        let mut names = Vec::new();
        for peer in response.peers {
            if let Some(name) = &peer.name {
                names.push(name.clone());
            }
            for record in peer.consumers {
                enqueue_consumer(shared, record);
            }
        }
        shared.send_event(SessionEvent::Joined { peers: names });
        Ok(())
    }

    /// Publish one local track: ensure the send transport, run the
    /// producer SDP round, then commit the producer with the RTP
    /// parameters the server negotiated.
    pub async fn add_producer(&self, kind: MediaKind, track_id: impl Into<String>) -> Result<()> {
        let shared = &self.shared;
        let track_id = track_id.into();

        let remote = shared
            .send_lane
            .ensure_created(
                &shared.channel,
                &shared.config.transport_options,
                &shared.transport_ids,
            )
            .await?;
        let initial_offer = shared.initial_send_offer.lock().clone().ok_or_else(|| {
            Error::Negotiation("no cached local offer for the send lane; join the room first".into())
        })?;

        let answer = shared
            .channel
            .request(&NewProducerSdpRequest {
                kind,
                track_id: track_id.clone(),
                initial_offer_sdp: initial_offer,
                remote_transport_sdp: remote,
                transport_id: shared.send_lane.id(),
            })
            .await?;

        shared
            .engine
            .set_remote_description(
                TransportDirection::Send,
                SessionDescription::remote(SdpType::Answer, answer.sdp),
            )
            .await
            .map_err(round_error)?;

        let source = match kind {
            MediaKind::Audio => "mic",
            MediaKind::Video => "webcam",
        };
        shared
            .channel
            .request(&CreateProducerRequest {
                kind,
                paused: false,
                rtp_parameters: answer.rtp_parameters,
                transport_id: shared.send_lane.id(),
                app_data: ProducerAppData {
                    source: source.to_string(),
                },
            })
            .await?;

        info!(%kind, track_id, "producer created");
        shared.send_event(SessionEvent::ProducerCreated { kind });
        Ok(())
    }

    /// The room capability document, once known.
    pub fn room_settings(&self) -> Option<RoomSettings> {
        self.shared.room.lock().clone()
    }

    /// Stop the consumer queue. In-flight and queued rounds are
    /// dropped; the signaling channel itself is left to its owner.
    pub async fn close(&self) {
        self.shared.queue.close().await;
    }
}

impl<E> Shared<E> {
    fn send_event(&self, event: SessionEvent) {
        debug!(event = event.name(), "session event");
        let _ = self.events.send(event);
    }
}

/// Map an engine failure into a round-local negotiation error.
fn round_error(err: Error) -> Error {
    match err {
        Error::Negotiation(_) => err,
        other => Error::Negotiation(other.to_string()),
    }
}

/// Queue one consumer round. Failures are logged and abort that round
/// only; the consumer table and transport caches stay valid.
fn enqueue_consumer<E: MediaEngine>(shared: &Arc<Shared<E>>, record: ConsumerRecord) {
    let task_shared = Arc::clone(shared);
    let _completion = shared.queue.run("add-consumer", async move {
        if let Err(e) = add_consumer_round(&task_shared, record).await {
            warn!("consumer round failed: {e}");
        }
    });
}

/// One full consumer-negotiation round, run inside the work queue.
async fn add_consumer_round<E: MediaEngine>(
    shared: &Arc<Shared<E>>,
    record: ConsumerRecord,
) -> Result<()> {
    let (id, entry) = consumer::validate_consumer(&record)?;

    // Duplicate notifications for the same server-assigned id must not
    // re-run the round or touch the table.
    if shared.consumers.lock().contains_key(&id) {
        warn!(consumer = id, "duplicate consumer record, ignoring");
        return Ok(());
    }

    let remote = shared
        .recv_lane
        .ensure_created(
            &shared.channel,
            &shared.config.transport_options,
            &shared.transport_ids,
        )
        .await?;

    let kind = entry.kind;
    let track_id = entry.track_id.clone();
    let consumers = {
        let mut consumers = shared.consumers.lock();
        consumers.insert(id, entry);
        consumers.clone()
    };
    let version = shared.recv_lane.next_version();
    let initial_offer = shared.initial_send_offer.lock().clone().ok_or_else(|| {
        Error::Negotiation("no cached local offer for the send lane; join the room first".into())
    })?;

    debug!(consumer = id, version, "starting consumer round");
    let offer_sdp: String = shared
        .channel
        .request(&NewConsumerSdpRequest {
            initial_offer_sdp: initial_offer,
            remote_transport_sdp: remote,
            transport_id: shared.recv_lane.id(),
            version,
            consumers,
        })
        .await?;

    shared
        .engine
        .set_remote_description(
            TransportDirection::Receive,
            SessionDescription::remote(SdpType::Offer, offer_sdp),
        )
        .await
        .map_err(round_error)?;
    let answer = shared
        .engine
        .create_answer(TransportDirection::Receive)
        .await
        .map_err(round_error)?;
    shared
        .engine
        .set_local_description(TransportDirection::Receive, answer)
        .await
        .map_err(round_error)?;

    info!(consumer = id, %kind, "consumer added");
    shared.send_event(SessionEvent::ConsumerAdded { id, kind, track_id });
    Ok(())
}

/// Drain channel events: responses were already resolved by the
/// channel; what arrives here is inbound requests, notifications and
/// lifecycle.
async fn dispatch_loop<E: MediaEngine>(
    shared: Arc<Shared<E>>,
    mut channel_events: mpsc::UnboundedReceiver<ChannelEvent>,
) {
    while let Some(event) = channel_events.recv().await {
        match event {
            ChannelEvent::Request(frame) => handle_request(&shared, frame),
            ChannelEvent::Notification(value) => {
                debug!(%value, "server notification");
            }
            ChannelEvent::Closed => {
                info!("signaling connection closed");
                shared.send_event(SessionEvent::SignalingClosed);
                break;
            }
            ChannelEvent::Error(message) => {
                warn!("signaling connection failed: {message}");
                shared.send_event(SessionEvent::SignalingError { message });
                break;
            }
        }
    }
}

fn handle_request<E: MediaEngine>(shared: &Arc<Shared<E>>, frame: RequestFrame) {
    let id = frame.id;
    let method = frame.method.clone();
    let reply = match PeerRequest::parse(&frame.method, frame.data) {
        Ok(PeerRequest::NewPeer(peer)) => {
            debug!(peer = ?peer.name, consumers = peer.consumers.len(), "new peer");
            for record in peer.consumers {
                enqueue_consumer(shared, record);
            }
            shared.channel.respond_ok(id)
        }
        Ok(PeerRequest::NewConsumer(record)) => {
            enqueue_consumer(shared, record);
            shared.channel.respond_ok(id)
        }
        Ok(PeerRequest::PeerClosed { name }) => {
            info!(peer = name, "peer left the room");
            shared.send_event(SessionEvent::PeerClosed { name });
            shared.channel.respond_ok(id)
        }
        Ok(PeerRequest::ConsumerPreferredProfileSet) => {
            debug!("consumer preferred profile set on server, ignoring");
            shared.channel.respond_ok(id)
        }
        Ok(PeerRequest::ActiveSpeaker { peer_name }) => {
            shared.send_event(SessionEvent::ActiveSpeaker { peer_name });
            shared.channel.respond_ok(id)
        }
        Ok(PeerRequest::Unknown { method }) => {
            warn!(method, "could not understand the request");
            shared.channel.respond_error(id, UNKNOWN_REQUEST_REASON)
        }
        Err(e) => {
            warn!(method, "malformed inbound request: {e}");
            shared.channel.respond_error(id, e.to_string())
        }
    };
    if let Err(e) = reply {
        warn!(method, "could not reply to inbound request: {e}");
    }
}
