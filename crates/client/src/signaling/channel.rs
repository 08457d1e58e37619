//! The signaling channel: correlated request/response over an ordered
//! message stream.
//!
//! One writer task drains a FIFO queue so exactly one write is ever in
//! flight and frames reach the peer in `send`/`request` call order. One
//! reader task classifies inbound frames: responses resolve the pending
//! request with the matching correlation id; requests and notifications
//! flow to the single registered listener. A response whose id has no
//! pending entry is logged and dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use super::protocol::{request_frame, Frame, RequestFrame, ResponseFrame, ServerRequest};
use super::transport::{SignalingTransport, TransportReceiver, TransportSender};
use crate::error::{Error, Result};

/// Connection-lifecycle and inbound-traffic events delivered to the
/// channel's single listener.
#[derive(Debug)]
pub enum ChannelEvent {
    /// The peer sent a request and expects a reply.
    Request(RequestFrame),
    /// Fire-and-forget frame without correlation.
    Notification(Value),
    /// The stream closed in an orderly fashion. Terminal.
    Closed,
    /// The stream failed or delivered an undecodable frame. Terminal.
    Error(String),
}

struct ChannelInner {
    /// Pending response waiters keyed by correlation id. Entries are
    /// removed the moment their response is dispatched.
    pending: Mutex<HashMap<u32, oneshot::Sender<ResponseFrame>>>,
    write_tx: mpsc::UnboundedSender<String>,
    /// Per-channel id source; ids are unique among in-flight requests
    /// because an entry is removed before its id could wrap around.
    next_id: AtomicU32,
    request_timeout: Option<Duration>,
}

/// Handle to a running signaling channel. Cheap to clone.
#[derive(Clone)]
pub struct SignalingChannel {
    inner: Arc<ChannelInner>,
}

impl SignalingChannel {
    /// Start the channel over a connected transport. Returns the handle
    /// and the event stream for the single listener.
    pub fn start<T: SignalingTransport>(
        transport: T,
        request_timeout: Option<Duration>,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (sender, receiver) = transport.split();
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(ChannelInner {
            pending: Mutex::new(HashMap::new()),
            write_tx,
            next_id: AtomicU32::new(1),
            request_timeout,
        });

        tokio::spawn(write_loop(sender, write_rx));
        tokio::spawn(read_loop(receiver, Arc::clone(&inner), event_tx));

        (Self { inner }, event_rx)
    }

    /// Send a typed request and await its correlated response,
    /// deserializing the response data on success.
    pub async fn request<R: ServerRequest>(&self, request: &R) -> Result<R::Response> {
        let response = self.request_raw(request).await?;
        if !response.ok {
            return Err(Error::ServerRejected {
                method: R::METHOD,
                reason: response
                    .error_reason
                    .unwrap_or_else(|| "unspecified error".to_string()),
            });
        }
        Ok(serde_json::from_value(
            response.data.unwrap_or(Value::Null),
        )?)
    }

    /// Send a typed request and await the raw response frame.
    pub async fn request_raw<R: ServerRequest>(&self, request: &R) -> Result<ResponseFrame> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = request_frame(id, request)?;

        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().insert(id, tx);
        debug!(id, method = R::METHOD, "sending request");

        if let Err(e) = self.enqueue(&frame) {
            self.inner.pending.lock().remove(&id);
            return Err(e);
        }

        let received = match self.inner.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.inner.pending.lock().remove(&id);
                    warn!(id, method = R::METHOD, "request timed out");
                    return Err(Error::RequestTimeout(limit));
                }
            },
            None => rx.await,
        };

        // The waiter is dropped without a value when the read loop
        // terminates; the session is over for this channel.
        received.map_err(|_| Error::ChannelClosed)
    }

    /// Acknowledge an inbound request.
    pub fn respond_ok(&self, id: u32) -> Result<()> {
        self.enqueue(&ResponseFrame::ok(id))
    }

    /// Reject an inbound request with a reason.
    pub fn respond_error(&self, id: u32, reason: impl Into<String>) -> Result<()> {
        self.enqueue(&ResponseFrame::error(id, reason))
    }

    /// Queue a frame for transmission. Frames leave the socket in
    /// enqueue order.
    fn enqueue(&self, frame: &impl Serialize) -> Result<()> {
        let text = serde_json::to_string(frame)?;
        self.inner
            .write_tx
            .send(text)
            .map_err(|_| Error::ChannelClosed)
    }
}

async fn write_loop<S: TransportSender>(mut sender: S, mut write_rx: mpsc::UnboundedReceiver<String>) {
    while let Some(frame) = write_rx.recv().await {
        if let Err(e) = sender.send(frame).await {
            error!("signaling write failed: {e}");
            break;
        }
    }
    let _ = sender.close().await;
}

async fn read_loop<R: TransportReceiver>(
    mut receiver: R,
    inner: Arc<ChannelInner>,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    loop {
        match receiver.recv().await {
            Ok(Some(text)) => {
                let classified = serde_json::from_str::<Value>(&text)
                    .map_err(Error::Decode)
                    .and_then(Frame::classify);
                match classified {
                    Ok(Frame::Response(response)) => {
                        let waiter = inner.pending.lock().remove(&response.id);
                        match waiter {
                            Some(tx) => {
                                let id = response.id;
                                // The waiter can be gone if its request
                                // timed out between lookup and send.
                                if tx.send(response).is_err() {
                                    debug!(id, "response waiter went away");
                                }
                            }
                            None => warn!(id = response.id, "no handler for response, dropping"),
                        }
                    }
                    Ok(Frame::Request(request)) => {
                        if events.send(ChannelEvent::Request(request)).is_err() {
                            break;
                        }
                    }
                    Ok(Frame::Notification(value)) => {
                        if events.send(ChannelEvent::Notification(value)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        // Malformed frame: fatal to the read loop.
                        error!("undecodable signaling frame: {e}");
                        let _ = events.send(ChannelEvent::Error(format!(
                            "undecodable signaling frame: {e}"
                        )));
                        break;
                    }
                }
            }
            Ok(None) => {
                let _ = events.send(ChannelEvent::Closed);
                break;
            }
            Err(e) => {
                error!("signaling receive failed: {e}");
                let _ = events.send(ChannelEvent::Error(e.to_string()));
                break;
            }
        }
    }

    // Wake every in-flight request with a closed-channel error.
    inner.pending.lock().clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    /// In-memory transport: outbound frames are captured on a channel,
    /// inbound frames are injected through another.
    struct TestTransport {
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<String>,
    }

    struct TestSender(mpsc::UnboundedSender<String>);
    struct TestReceiver(mpsc::UnboundedReceiver<String>);

    impl TestTransport {
        fn pair() -> (
            Self,
            mpsc::UnboundedReceiver<String>,
            mpsc::UnboundedSender<String>,
        ) {
            let (out_tx, out_rx) = mpsc::unbounded_channel();
            let (in_tx, in_rx) = mpsc::unbounded_channel();
            (
                Self {
                    outbound: out_tx,
                    inbound: in_rx,
                },
                out_rx,
                in_tx,
            )
        }
    }

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

    #[derive(Serialize)]
    struct Ping {
        seq: u32,
    }

    impl ServerRequest for Ping {
        const METHOD: &'static str = "ping";
        type Response = Value;
    }

    fn respond(server_tx: &mpsc::UnboundedSender<String>, id: u32, data: Value) {
        server_tx
            .send(json!({"response": true, "id": id, "ok": true, "data": data}).to_string())
            .unwrap();
    }

    async fn next_sent(out_rx: &mut mpsc::UnboundedReceiver<String>) -> Value {
        serde_json::from_str(&out_rx.recv().await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn responses_match_their_requests_in_any_arrival_order() {
        let (transport, mut out_rx, server_tx) = TestTransport::pair();
        let (channel, _events) = SignalingChannel::start(transport, None);

        let first = tokio::spawn({
            let channel = channel.clone();
            async move { channel.request(&Ping { seq: 1 }).await }
        });
        let second = tokio::spawn({
            let channel = channel.clone();
            async move { channel.request(&Ping { seq: 2 }).await }
        });

        let sent_a = next_sent(&mut out_rx).await;
        let sent_b = next_sent(&mut out_rx).await;
        let id_a = sent_a["id"].as_u64().unwrap() as u32;
        let id_b = sent_b["id"].as_u64().unwrap() as u32;

        // Answer the second request first.
        respond(&server_tx, id_b, json!({"for": sent_b["data"]["seq"]}));
        respond(&server_tx, id_a, json!({"for": sent_a["data"]["seq"]}));

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(first["for"], sent_a["data"]["seq"]);
        assert_eq!(second["for"], sent_b["data"]["seq"]);
    }

    #[tokio::test]
    async fn unknown_response_id_is_dropped_not_fatal() {
        let (transport, mut out_rx, server_tx) = TestTransport::pair();
        let (channel, _events) = SignalingChannel::start(transport, None);

        respond(&server_tx, 999_999, json!(null));

        // The channel still serves requests afterwards.
        let pending = tokio::spawn({
            let channel = channel.clone();
            async move { channel.request(&Ping { seq: 7 }).await }
        });
        let sent = next_sent(&mut out_rx).await;
        respond(&server_tx, sent["id"].as_u64().unwrap() as u32, json!(7));
        assert_eq!(pending.await.unwrap().unwrap(), json!(7));
    }

    #[tokio::test]
    async fn frames_are_written_in_enqueue_order() {
        let (transport, mut out_rx, _server_tx) = TestTransport::pair();
        let (channel, _events) = SignalingChannel::start(transport, None);

        // Queue a burst of writes back to back; none has completed on
        // the wire when the next is issued.
        for id in 1..=5 {
            channel.respond_ok(id).unwrap();
        }

        for expected in 1..=5 {
            let sent = next_sent(&mut out_rx).await;
            assert_eq!(sent["id"], json!(expected));
        }
    }

    #[tokio::test]
    async fn server_rejection_surfaces_method_and_reason() {
        let (transport, mut out_rx, server_tx) = TestTransport::pair();
        let (channel, _events) = SignalingChannel::start(transport, None);

        let pending = tokio::spawn({
            let channel = channel.clone();
            async move { channel.request(&Ping { seq: 1 }).await }
        });
        let sent = next_sent(&mut out_rx).await;
        server_tx
            .send(
                json!({
                    "response": true,
                    "id": sent["id"],
                    "ok": false,
                    "errorReason": "room is full"
                })
                .to_string(),
            )
            .unwrap();

        let err = pending.await.unwrap().unwrap_err();
        match err {
            Error::ServerRejected { method, reason } => {
                assert_eq!(method, "ping");
                assert_eq!(reason, "room is full");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_removes_the_pending_entry() {
        let (transport, mut out_rx, server_tx) = TestTransport::pair();
        let (channel, _events) =
            SignalingChannel::start(transport, Some(Duration::from_secs(5)));

        let pending = tokio::spawn({
            let channel = channel.clone();
            async move { channel.request(&Ping { seq: 1 }).await }
        });
        let sent = next_sent(&mut out_rx).await;

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(matches!(
            pending.await.unwrap(),
            Err(Error::RequestTimeout(_))
        ));

        // A late response for the abandoned id is dropped quietly.
        respond(&server_tx, sent["id"].as_u64().unwrap() as u32, json!(null));
        tokio::task::yield_now().await;
    }

    #[tokio::test]
    async fn inbound_requests_and_notifications_reach_the_listener() {
        let (transport, _out_rx, server_tx) = TestTransport::pair();
        let (_channel, mut events) = SignalingChannel::start(transport, None);

        server_tx
            .send(
                json!({"request": true, "id": 42, "method": "newConsumer", "data": {}}).to_string(),
            )
            .unwrap();
        server_tx
            .send(json!({"method": "somethingHappened"}).to_string())
            .unwrap();

        let first = events.recv().await.unwrap();
        assert!(matches!(first, ChannelEvent::Request(r) if r.id == 42));
        let second = events.recv().await.unwrap();
        assert!(matches!(second, ChannelEvent::Notification(_)));
    }

    #[tokio::test]
    async fn orderly_close_emits_closed_and_fails_in_flight_requests() {
        let (transport, mut out_rx, server_tx) = TestTransport::pair();
        let (channel, mut events) = SignalingChannel::start(transport, None);

        let pending = tokio::spawn({
            let channel = channel.clone();
            async move { channel.request(&Ping { seq: 1 }).await }
        });
        let _ = next_sent(&mut out_rx).await;

        drop(server_tx);

        assert!(matches!(events.recv().await, Some(ChannelEvent::Closed)));
        assert!(matches!(pending.await.unwrap(), Err(Error::ChannelClosed)));
    }

    #[tokio::test]
    async fn malformed_frame_is_fatal_to_the_read_loop() {
        let (transport, _out_rx, server_tx) = TestTransport::pair();
        let (_channel, mut events) = SignalingChannel::start(transport, None);

        server_tx.send("this is not json".to_string()).unwrap();
        assert!(matches!(events.recv().await, Some(ChannelEvent::Error(_))));
    }
}
