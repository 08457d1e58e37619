//! Per-lane transport state.

use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::Mutex;
use tracing::debug;

use crate::config::TransportOptions;
use crate::error::Result;
use crate::signaling::protocol::{CreateTransportRequest, TransportAppData};
use crate::signaling::{RemoteTransportParameters, SignalingChannel, TransportDirection};

/// One transport lane (`send` or `receive`) of a session.
///
/// The lane starts uninitialized; the first `ensure_created` call
/// issues a `createTransport` request and caches the remote parameters
/// it returns. The cache is populated before any waiting caller
/// resumes, and concurrent callers serialize on the cache lock, so at
/// most one `createTransport` request is ever issued per lane no matter
/// how many callers race before the first response arrives.
pub struct TransportLane {
    direction: TransportDirection,
    /// Transport id, assigned when the creation request goes out.
    id: AtomicU32,
    /// Monotone negotiation round counter for this lane; incremented
    /// exactly once per round directed at the lane.
    version: AtomicU32,
    remote: Mutex<Option<RemoteTransportParameters>>,
}

impl TransportLane {
    pub fn new(direction: TransportDirection) -> Self {
        Self {
            direction,
            id: AtomicU32::new(0),
            version: AtomicU32::new(0),
            remote: Mutex::new(None),
        }
    }

    pub fn direction(&self) -> TransportDirection {
        self.direction
    }

    /// Server-facing transport id; 0 until the lane was first ensured.
    pub fn id(&self) -> u32 {
        self.id.load(Ordering::Relaxed)
    }

    /// The version to stamp on the next negotiation round for this
    /// lane (post-incremented).
    pub fn next_version(&self) -> u32 {
        self.version.fetch_add(1, Ordering::Relaxed)
    }

    /// Deliver the cached remote transport parameters, creating the
    /// transport on first use.
    pub async fn ensure_created(
        &self,
        channel: &SignalingChannel,
        options: &TransportOptions,
        transport_ids: &AtomicU32,
    ) -> Result<RemoteTransportParameters> {
        // Held across the request on purpose: it serializes concurrent
        // callers while the lane is still being created.
        let mut remote = self.remote.lock().await;
        if let Some(parameters) = remote.as_ref() {
            return Ok(parameters.clone());
        }

        let transport_id = transport_ids.fetch_add(1, Ordering::Relaxed);
        self.id.store(transport_id, Ordering::Relaxed);
        debug!(direction = %self.direction, transport_id, "creating transport");

        let parameters = channel
            .request(&CreateTransportRequest {
                id: transport_id,
                direction: self.direction,
                version: self.next_version(),
                options: options.clone(),
                app_data: TransportAppData {
                    media: self.direction.media_tag().to_string(),
                },
            })
            .await?;

        *remote = Some(parameters.clone());
        Ok(parameters)
    }
}
