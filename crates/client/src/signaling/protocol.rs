//! Signaling wire protocol: frame envelope and per-method payloads.
//!
//! Frames are JSON documents over an ordered message stream. A frame
//! carrying a truthy `request` flag is a request and expects a reply; a
//! frame carrying a truthy `response` flag (and no `request` flag) is a
//! response correlated by `id`; anything else is a fire-and-forget
//! notification. Payloads are validated into typed structs at this
//! boundary; fields the client merely echoes back to the server
//! (ICE/DTLS transport parameters, negotiated producer RTP parameters)
//! stay as raw JSON inside thin typed wrappers.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use roomcall_core::{MediaKind, RtpCapabilities};

use crate::config::{DeviceInfo, TransportOptions};
use crate::error::{Error, Result};

/// Reply sent for inbound requests the client does not understand.
pub const UNKNOWN_REQUEST_REASON: &str = "Could not understand the request";

/// A decoded inbound frame.
#[derive(Debug, Clone)]
pub enum Frame {
    Request(RequestFrame),
    Response(ResponseFrame),
    Notification(Value),
}

impl Frame {
    /// Classify a decoded JSON document per its `request`/`response`
    /// flags. A flagged frame that then fails validation (e.g. a
    /// response without an id) is a decode error.
    pub fn classify(value: Value) -> Result<Frame> {
        let is_request = value
            .get("request")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let is_response = !is_request
            && value
                .get("response")
                .and_then(Value::as_bool)
                .unwrap_or(false);

        if is_request {
            Ok(Frame::Request(serde_json::from_value(value)?))
        } else if is_response {
            Ok(Frame::Response(serde_json::from_value(value)?))
        } else {
            Ok(Frame::Notification(value))
        }
    }
}

/// Request frame: `{request: true, id, method, data}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFrame {
    pub request: bool,
    pub id: u32,
    pub method: String,
    #[serde(default)]
    pub data: Value,
}

impl RequestFrame {
    pub fn new(id: u32, method: impl Into<String>, data: Value) -> Self {
        Self {
            request: true,
            id,
            method: method.into(),
            data,
        }
    }
}

/// Response frame: `{response: true, id, ok, data?, errorReason?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseFrame {
    pub response: bool,
    pub id: u32,
    #[serde(default)]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

impl ResponseFrame {
    /// A bare success reply.
    pub fn ok(id: u32) -> Self {
        Self {
            response: true,
            id,
            ok: true,
            data: None,
            error_reason: None,
        }
    }

    /// A failure reply with a reason.
    pub fn error(id: u32, reason: impl Into<String>) -> Self {
        Self {
            response: true,
            id,
            ok: false,
            data: None,
            error_reason: Some(reason.into()),
        }
    }
}

/// A typed request the client sends to the server.
///
/// `METHOD` is the wire method name; `Response` is the shape of the
/// response frame's `data` on success.
pub trait ServerRequest: Serialize {
    const METHOD: &'static str;
    type Response: DeserializeOwned;
}

// ---------------------------------------------------------------------
// Client -> server methods
// ---------------------------------------------------------------------

/// `queryRoom`: fetch the room capability document before joining.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRoomRequest {}

impl ServerRequest for QueryRoomRequest {
    const METHOD: &'static str = "queryRoom";
    type Response = RoomSettings;
}

/// `join`: enter the room, advertising effective capabilities.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub peer_name: String,
    pub rtp_capabilities: RtpCapabilities,
    pub app_data: JoinAppData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinAppData {
    pub device: DeviceInfo,
    pub display_name: String,
}

impl ServerRequest for JoinRequest {
    const METHOD: &'static str = "join";
    type Response = JoinResponse;
}

/// Response to `join`: the authoritative room settings plus the peers
/// already present.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    #[serde(default)]
    pub peers: Vec<PeerInfo>,
    #[serde(flatten)]
    pub settings: RoomSettings,
}

/// Room capability document supplied by the server. Read-only for the
/// lifetime of the session once cached.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettings {
    #[serde(default)]
    pub rtp_capabilities: RtpCapabilities,
    /// Server-defined settings the client carries but does not
    /// interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `createTransport`: ask the server for one transport lane.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransportRequest {
    pub id: u32,
    pub direction: TransportDirection,
    pub version: u32,
    pub options: TransportOptions,
    pub app_data: TransportAppData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportAppData {
    pub media: String,
}

impl ServerRequest for CreateTransportRequest {
    const METHOD: &'static str = "createTransport";
    type Response = RemoteTransportParameters;
}

/// Direction of a transport lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportDirection {
    #[serde(rename = "send")]
    Send,
    #[serde(rename = "recv")]
    Receive,
}

impl TransportDirection {
    /// The `appData.media` tag announced for this lane.
    pub fn media_tag(self) -> &'static str {
        match self {
            TransportDirection::Send => "SEND",
            TransportDirection::Receive => "RECV",
        }
    }
}

impl std::fmt::Display for TransportDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportDirection::Send => f.write_str("send"),
            TransportDirection::Receive => f.write_str("recv"),
        }
    }
}

/// Remote parameters of a created transport: ICE/DTLS material plus
/// candidates. Cached verbatim and echoed back in later negotiation
/// requests; the client never interprets the leaves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTransportParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ice_parameters: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ice_candidates: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtls_parameters: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `newProducerSdp`: open a producer negotiation round for one local
/// track on the send lane.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProducerSdpRequest {
    pub kind: MediaKind,
    pub track_id: String,
    pub initial_offer_sdp: String,
    pub remote_transport_sdp: RemoteTransportParameters,
    pub transport_id: u32,
}

impl ServerRequest for NewProducerSdpRequest {
    const METHOD: &'static str = "newProducerSdp";
    type Response = ProducerSdpAnswer;
}

/// Response to `newProducerSdp`: the remote answer plus the RTP
/// parameters the server negotiated for the producer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerSdpAnswer {
    pub sdp: String,
    /// Negotiated producer parameters, echoed verbatim into
    /// `createProducer`.
    #[serde(default)]
    pub rtp_parameters: Value,
}

/// `createProducer`: commit the producer after the answer applied.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProducerRequest {
    pub kind: MediaKind,
    pub paused: bool,
    pub rtp_parameters: Value,
    pub transport_id: u32,
    pub app_data: ProducerAppData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerAppData {
    pub source: String,
}

impl ServerRequest for CreateProducerRequest {
    const METHOD: &'static str = "createProducer";
    type Response = Value;
}

/// `newConsumerSdp`: renegotiate the receive lane with the full
/// accumulated consumer table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConsumerSdpRequest {
    pub initial_offer_sdp: String,
    pub remote_transport_sdp: RemoteTransportParameters,
    pub transport_id: u32,
    pub version: u32,
    /// Cumulative consumer table keyed by server-assigned id.
    pub consumers: BTreeMap<u32, ConsumerEntry>,
}

impl ServerRequest for NewConsumerSdpRequest {
    // The response data is the remote offer SDP as a bare string.
    const METHOD: &'static str = "newConsumerSdp";
    type Response = String;
}

/// One consumer as carried in the `newConsumerSdp` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerEntry {
    pub kind: MediaKind,
    pub track_id: String,
    pub ssrc: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtx_ssrc: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cname: Option<String>,
}

// ---------------------------------------------------------------------
// Server -> client requests
// ---------------------------------------------------------------------

/// A typed inbound server request.
#[derive(Debug, Clone)]
pub enum PeerRequest {
    /// A peer joined; its existing consumers ride along.
    NewPeer(PeerInfo),
    /// A new remote stream is available for subscription.
    NewConsumer(ConsumerRecord),
    /// A peer left the room.
    PeerClosed { name: String },
    /// Server-side consumer profile bookkeeping; acknowledged and
    /// otherwise ignored.
    ConsumerPreferredProfileSet,
    /// The dominant speaker changed.
    ActiveSpeaker { peer_name: Option<String> },
    /// Anything else; answered with [`UNKNOWN_REQUEST_REASON`].
    Unknown { method: String },
}

impl PeerRequest {
    /// Parse an inbound request frame's method and data into a typed
    /// variant. Unknown methods become [`PeerRequest::Unknown`];
    /// malformed payloads for known methods are decode errors.
    pub fn parse(method: &str, data: Value) -> Result<PeerRequest> {
        match method {
            "newPeer" => Ok(PeerRequest::NewPeer(serde_json::from_value(data)?)),
            "newConsumer" => Ok(PeerRequest::NewConsumer(serde_json::from_value(data)?)),
            "peerClosed" => {
                #[derive(Deserialize)]
                struct PeerClosedData {
                    name: String,
                }
                let data: PeerClosedData = serde_json::from_value(data)?;
                Ok(PeerRequest::PeerClosed { name: data.name })
            }
            "consumerPreferredProfileSet" => Ok(PeerRequest::ConsumerPreferredProfileSet),
            "activeSpeaker" => {
                #[derive(Deserialize)]
                #[serde(rename_all = "camelCase")]
                struct ActiveSpeakerData {
                    #[serde(default)]
                    peer_name: Option<String>,
                }
                let data: ActiveSpeakerData = serde_json::from_value(data)?;
                Ok(PeerRequest::ActiveSpeaker {
                    peer_name: data.peer_name,
                })
            }
            other => Ok(PeerRequest::Unknown {
                method: other.to_string(),
            }),
        }
    }
}

/// A peer as described by the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub consumers: Vec<ConsumerRecord>,
}

/// A consumer record as received from the server. Fields are optional
/// here so that a malformed record fails consumer validation (aborting
/// that round only) rather than frame decoding.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerRecord {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub kind: Option<MediaKind>,
    #[serde(default)]
    pub rtp_parameters: Option<ConsumerRtpParameters>,
}

/// The RTP-parameters block of a consumer record; only the pieces the
/// client reads are typed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerRtpParameters {
    #[serde(default)]
    pub encodings: Vec<EncodingParameters>,
    #[serde(default)]
    pub rtcp: Option<RtcpParameters>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodingParameters {
    #[serde(default)]
    pub ssrc: Option<u32>,
    #[serde(default)]
    pub rtx: Option<RtxParameters>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtxParameters {
    #[serde(default)]
    pub ssrc: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtcpParameters {
    #[serde(default)]
    pub cname: Option<String>,
}

/// Serialize a typed request into its wire frame.
pub fn request_frame<R: ServerRequest>(id: u32, request: &R) -> Result<RequestFrame> {
    Ok(RequestFrame::new(
        id,
        R::METHOD,
        serde_json::to_value(request).map_err(Error::Decode)?,
    ))
}
