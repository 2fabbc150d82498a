//! ibr-session
//!
//! One `Session` per connection slot. A Session owns the connect /
//! disconnect / reconnect lifecycle of its transport and a registry that maps
//! each `EventKind` to the handlers interested in it.
//!
//! The transport itself is behind the [`Transport`] trait so the pool and the
//! façade can be exercised against a scripted in-memory gateway.

mod ws;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ibr_schemas::{EventKind, GatewayEvent, GatewayRequest, SlotId};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use ws::WsTransport;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to {url} failed: {reason}")]
    Connect { url: String, reason: String },
    #[error("not connected")]
    NotConnected,
    #[error("send failed: {0}")]
    Send(String),
    #[error("frame codec: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Callback a transport invokes for every decoded inbound event.
pub type EventSink = Arc<dyn Fn(GatewayEvent) + Send + Sync>;

/// Handler registered on a Session for one event kind.
pub type Handler = Arc<dyn Fn(SlotId, &GatewayEvent) + Send + Sync>;

/// Connection to the external gateway, as seen by a Session.
///
/// `connect` must deliver every event decoded on the new connection to
/// `sink`, in arrival order, until `disconnect` is called or the connection
/// drops.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, client_id: i32, sink: EventSink) -> Result<(), TransportError>;

    async fn disconnect(&self);

    fn is_connected(&self) -> bool;

    fn send(&self, request: GatewayRequest) -> Result<(), TransportError>;
}

pub struct Session {
    slot: SlotId,
    client_id: i32,
    transport: Arc<dyn Transport>,
    handlers: Arc<RwLock<HashMap<EventKind, Vec<Handler>>>>,
}

impl Session {
    pub fn new(slot: SlotId, client_id: i32, transport: Arc<dyn Transport>) -> Self {
        Self {
            slot,
            client_id,
            transport,
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn client_id(&self) -> i32 {
        self.client_id
    }

    pub fn on(&self, kind: EventKind, handler: Handler) {
        self.handlers.write().entry(kind).or_default().push(handler);
    }

    /// Register one handler for every event kind.
    pub fn on_all(&self, handler: Handler) {
        let mut map = self.handlers.write();
        for kind in EventKind::ALL {
            map.entry(kind).or_default().push(handler.clone());
        }
    }

    pub async fn connect(&self) -> Result<(), TransportError> {
        let handlers = self.handlers.clone();
        let slot = self.slot;
        let sink: EventSink = Arc::new(move |event: GatewayEvent| {
            // Clone the handler list so no lock is held while handlers run.
            let targets = handlers.read().get(&event.kind()).cloned();
            match targets {
                Some(targets) => {
                    for h in targets {
                        h(slot, &event);
                    }
                }
                None => debug!(slot, kind = ?event.kind(), "no handler for event"),
            }
        });

        self.transport.connect(self.client_id, sink).await?;
        info!(slot = self.slot, client_id = self.client_id, "session connected");
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.transport.disconnect().await;
        debug!(slot = self.slot, "session disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Tear the connection down, wait `settle`, and connect again.
    pub async fn reconnect(&self, settle: Duration) -> Result<(), TransportError> {
        warn!(slot = self.slot, "reconnecting session");
        self.disconnect().await;
        tokio::time::sleep(settle).await;
        self.connect().await
    }

    pub fn send(&self, request: GatewayRequest) -> Result<(), TransportError> {
        debug!(slot = self.slot, request = request.name(), "send");
        if !self.transport.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.transport.send(request)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("slot", &self.slot)
            .field("client_id", &self.client_id)
            .field("connected", &self.is_connected())
            .finish()
    }
}
