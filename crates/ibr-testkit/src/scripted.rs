use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ibr_schemas::{GatewayEvent, GatewayRequest};
use ibr_session::{EventSink, Transport, TransportError};
use parking_lot::Mutex;

/// Produces the events the gateway would emit in answer to one request.
/// Receives the client id of the connection the request was sent on.
pub type Responder = Arc<dyn Fn(i32, &GatewayRequest) -> Vec<GatewayEvent> + Send + Sync>;

pub struct ScriptedGateway {
    responder: Mutex<Responder>,
    sink: Mutex<Option<EventSink>>,
    client_id: Mutex<Option<i32>>,
    connected: AtomicBool,
    refuse_connect: AtomicBool,
    connects: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    on_connect: Mutex<Vec<GatewayEvent>>,
    sent: Mutex<Vec<GatewayRequest>>,
}

impl ScriptedGateway {
    pub fn new(responder: Responder) -> Self {
        Self {
            responder: Mutex::new(responder),
            sink: Mutex::new(None),
            client_id: Mutex::new(None),
            connected: AtomicBool::new(false),
            refuse_connect: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
            delay: Mutex::new(None),
            on_connect: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// A gateway that never answers anything.
    pub fn silent() -> Self {
        Self::new(Arc::new(|_: i32, _: &GatewayRequest| Vec::new()))
    }

    pub fn set_responder(&self, responder: Responder) {
        *self.responder.lock() = responder;
    }

    /// Deliver responses from a spawned task after `delay` instead of inline.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// Events emitted right after every successful connect (e.g. the
    /// `next_valid_id` handshake).
    pub fn set_on_connect(&self, events: Vec<GatewayEvent>) {
        *self.on_connect.lock() = events;
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse_connect.store(refuse, Ordering::SeqCst);
    }

    /// Simulate the gateway dropping the socket.
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<GatewayRequest> {
        self.sent.lock().clone()
    }

    pub fn sent_names(&self) -> Vec<&'static str> {
        self.sent.lock().iter().map(GatewayRequest::name).collect()
    }

    /// Push an unsolicited event, as if the gateway sent it on its own.
    pub fn emit(&self, event: GatewayEvent) {
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink(event.normalize());
        }
    }

    fn deliver(&self, events: Vec<GatewayEvent>) {
        if events.is_empty() {
            return;
        }
        let Some(sink) = self.sink.lock().clone() else {
            return;
        };
        let delay = *self.delay.lock();
        match delay {
            None => {
                for ev in events {
                    sink(ev.normalize());
                }
            }
            Some(d) => {
                tokio::spawn(async move {
                    tokio::time::sleep(d).await;
                    for ev in events {
                        sink(ev.normalize());
                    }
                });
            }
        }
    }
}

#[async_trait]
impl Transport for ScriptedGateway {
    async fn connect(&self, client_id: i32, sink: EventSink) -> Result<(), TransportError> {
        if self.refuse_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Connect {
                url: "scripted://gateway".to_string(),
                reason: "connection refused".to_string(),
            });
        }
        *self.sink.lock() = Some(sink);
        *self.client_id.lock() = Some(client_id);
        self.connected.store(true, Ordering::SeqCst);
        self.connects.fetch_add(1, Ordering::SeqCst);
        let hello = self.on_connect.lock().clone();
        self.deliver(hello);
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        *self.sink.lock() = None;
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send(&self, request: GatewayRequest) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let client_id = self.client_id.lock().unwrap_or_default();
        let responder = self.responder.lock().clone();
        let events = responder(client_id, &request);
        self.sent.lock().push(request);
        self.deliver(events);
        Ok(())
    }
}
