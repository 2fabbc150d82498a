//! JSON-over-WebSocket transport to the gateway bridge.
//!
//! Outbound requests and inbound events are tagged JSON text frames. The
//! first frame on every connection is `start_api` carrying the client id.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use ibr_schemas::{GatewayEvent, GatewayRequest};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, warn};

use crate::{EventSink, Transport, TransportError};

struct Connection {
    outbound: mpsc::UnboundedSender<Message>,
    connected: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

pub struct WsTransport {
    url: String,
    conn: Mutex<Option<Connection>>,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            conn: Mutex::new(None),
        }
    }

    fn close_current(&self) {
        if let Some(old) = self.conn.lock().take() {
            old.connected.store(false, Ordering::SeqCst);
            old.reader.abort();
            old.writer.abort();
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, client_id: i32, sink: EventSink) -> Result<(), TransportError> {
        self.close_current();

        let (stream, _resp) =
            connect_async(self.url.as_str())
                .await
                .map_err(|e| TransportError::Connect {
                    url: self.url.clone(),
                    reason: e.to_string(),
                })?;
        let (mut write, mut read) = stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        // Each connection gets its own flag so a stale reader cannot mark a
        // newer connection as down.
        let connected = Arc::new(AtomicBool::new(true));

        let flag = connected.clone();
        let writer = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = write.send(msg).await {
                    warn!(error = %e, "gateway write failed");
                    break;
                }
            }
            // Nothing more can be sent on this connection.
            flag.store(false, Ordering::SeqCst);
            let _ = write.close().await;
        });

        let flag = connected.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<GatewayEvent>(&text) {
                        Ok(event) => sink(event.normalize()),
                        Err(e) => warn!(error = %e, "undecodable gateway frame"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "gateway read failed");
                        break;
                    }
                }
            }
            flag.store(false, Ordering::SeqCst);
            info!("gateway connection closed");
        });

        let hello = serde_json::to_string(&GatewayRequest::StartApi { client_id })?;
        tx.send(Message::Text(hello))
            .map_err(|e| TransportError::Send(e.to_string()))?;

        *self.conn.lock() = Some(Connection {
            outbound: tx,
            connected,
            reader,
            writer,
        });
        debug!(url = %self.url, client_id, "websocket connected");
        Ok(())
    }

    async fn disconnect(&self) {
        self.close_current();
    }

    fn is_connected(&self) -> bool {
        self.conn
            .lock()
            .as_ref()
            .map(|c| c.connected.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    fn send(&self, request: GatewayRequest) -> Result<(), TransportError> {
        let frame = serde_json::to_string(&request)?;
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(TransportError::NotConnected)?;
        conn.outbound
            .send(Message::Text(frame))
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close_current();
    }
}
