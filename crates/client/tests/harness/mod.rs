//! Test harness: in-memory signaling transport with a scripted server
//! on the far end, plus a stub media engine that records its calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use roomcall_client::engine::{MediaEngine, SdpType, SessionDescription};
use roomcall_client::signaling::{
    SignalingTransport, TransportDirection, TransportReceiver, TransportSender,
};
use roomcall_client::{Error, Result};
use roomcall_core::SdpDocument;

/// In-memory transport wired to a [`ScriptedServer`].
pub struct TestTransport {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<String>,
}

pub struct TestSender(mpsc::UnboundedSender<String>);
pub struct TestReceiver(mpsc::UnboundedReceiver<String>);

impl SignalingTransport for TestTransport {
    type Sender = TestSender;
    type Receiver = TestReceiver;

    fn split(self) -> (Self::Sender, Self::Receiver) {
        (TestSender(self.outbound), TestReceiver(self.inbound))
    }
}

#[async_trait]
impl TransportSender for TestSender {
    async fn send(&mut self, frame: String) -> Result<()> {
        self.0.send(frame).map_err(|_| Error::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl TransportReceiver for TestReceiver {
    async fn recv(&mut self) -> Result<Option<String>> {
        Ok(self.0.recv().await)
    }
}

/// The server side of the in-memory stream: reads the client's frames
/// and injects scripted ones.
pub struct ScriptedServer {
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: mpsc::UnboundedSender<String>,
}

impl ScriptedServer {
    pub fn connect() -> (TestTransport, ScriptedServer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        (
            TestTransport {
                outbound: out_tx,
                inbound: in_rx,
            },
            ScriptedServer {
                from_client: out_rx,
                to_client: in_tx,
            },
        )
    }

    /// Next frame of any kind from the client.
    pub async fn next_frame(&mut self) -> Value {
        let text = self
            .from_client
            .recv()
            .await
            .expect("client closed the stream");
        serde_json::from_str(&text).expect("client sent malformed JSON")
    }

    /// Next request frame; response frames on the way are skipped.
    /// Panics if the method does not match.
    pub async fn expect_request(&mut self, method: &str) -> (u32, Value) {
        loop {
            let frame = self.next_frame().await;
            if frame.get("request").and_then(Value::as_bool) != Some(true) {
                continue;
            }
            assert_eq!(
                frame["method"].as_str(),
                Some(method),
                "unexpected request: {frame}"
            );
            let id = frame["id"].as_u64().expect("request without id") as u32;
            return (id, frame.get("data").cloned().unwrap_or(Value::Null));
        }
    }

    /// Next response frame from the client (a reply to a scripted
    /// server request); request frames on the way are skipped.
    pub async fn next_response(&mut self) -> Value {
        loop {
            let frame = self.next_frame().await;
            if frame.get("response").and_then(Value::as_bool) == Some(true) {
                return frame;
            }
        }
    }

    /// Answer a client request successfully.
    pub fn respond(&self, id: u32, data: Value) {
        self.send(json!({"response": true, "id": id, "ok": true, "data": data}));
    }

    /// Push a server-originated request at the client.
    pub fn request(&self, id: u32, method: &str, data: Value) {
        self.send(json!({"request": true, "id": id, "method": method, "data": data}));
    }

    pub fn send(&self, frame: Value) {
        self.to_client
            .send(frame.to_string())
            .expect("client receiver is gone");
    }
}

/// The room capability document the scripted server advertises: opus
/// at payload type 111 with a linked rtx at 112.
pub fn room_settings() -> Value {
    json!({
        "rtpCapabilities": {
            "codecs": [
                {
                    "name": "opus", "mimeType": "audio/opus", "kind": "audio",
                    "clockRate": 48000, "channels": 2, "preferredPayloadType": 111
                },
                {
                    "name": "rtx", "mimeType": "audio/rtx", "kind": "audio",
                    "clockRate": 48000, "preferredPayloadType": 112,
                    "parameters": {"apt": 111}
                }
            ],
            "headerExtensions": []
        }
    })
}

/// Remote transport parameters as `createTransport` would return them.
pub fn remote_transport_parameters() -> Value {
    json!({
        "iceParameters": {"usernameFragment": "frag", "password": "pw"},
        "iceCandidates": [{"foundation": "1", "ip": "127.0.0.1", "port": 40000}],
        "dtlsParameters": {"role": "auto", "fingerprints": []}
    })
}

/// A well-formed consumer record with the given id.
pub fn consumer_record(id: u32, kind: &str, ssrc: u32) -> Value {
    json!({
        "id": id,
        "kind": kind,
        "rtpParameters": {
            "encodings": [{"ssrc": ssrc, "rtx": {"ssrc": ssrc + 1}}],
            "rtcp": {"cname": format!("cname-{id}")}
        }
    })
}

/// Stub media engine: hands out a fixed local offer (opus at payload
/// type 100 with rtx at 101) and records every call.
#[derive(Clone, Default)]
pub struct StubEngine {
    calls: Arc<Mutex<Vec<String>>>,
    fail_next_apply: Arc<AtomicBool>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Make the next description apply fail, as a broken SDP would.
    pub fn fail_next_apply(&self) {
        self.fail_next_apply.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    fn local_offer_document() -> SdpDocument {
        serde_json::from_value(json!({
            "media": [{
                "type": "audio",
                "mid": "0",
                "rtp": [
                    {"payload": 100, "codec": "opus", "rate": 48000, "encoding": 2},
                    {"payload": 101, "codec": "rtx", "rate": 48000}
                ],
                "fmtp": [{"payload": 101, "config": "apt=100"}]
            }]
        }))
        .expect("static local offer document")
    }
}

#[async_trait]
impl MediaEngine for StubEngine {
    async fn create_local_offer(
        &self,
        direction: TransportDirection,
    ) -> Result<SessionDescription> {
        self.record(format!("create_local_offer:{direction}"));
        Ok(SessionDescription {
            kind: SdpType::Offer,
            sdp: "v=0 stub-offer".to_string(),
            document: Some(Self::local_offer_document()),
        })
    }

    async fn set_local_description(
        &self,
        direction: TransportDirection,
        description: SessionDescription,
    ) -> Result<()> {
        self.record(format!(
            "set_local:{direction}:{:?}",
            description.kind
        ));
        Ok(())
    }

    async fn set_remote_description(
        &self,
        direction: TransportDirection,
        description: SessionDescription,
    ) -> Result<()> {
        if self.fail_next_apply.swap(false, Ordering::SeqCst) {
            return Err(Error::Negotiation("stubbed apply failure".into()));
        }
        self.record(format!(
            "set_remote:{direction}:{:?}",
            description.kind
        ));
        Ok(())
    }

    async fn create_answer(&self, direction: TransportDirection) -> Result<SessionDescription> {
        self.record(format!("create_answer:{direction}"));
        Ok(SessionDescription {
            kind: SdpType::Answer,
            sdp: "v=0 stub-answer".to_string(),
            document: None,
        })
    }
}
