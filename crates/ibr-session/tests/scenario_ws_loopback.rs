//! Scenario: WebSocket Loopback
//!
//! # Invariant under test
//! `WsTransport` speaks the bridge protocol over a real socket: the first
//! frame is `start_api` with the slot's client id, inbound frames reach the
//! sink already normalised, and the connection reports down as soon as the
//! peer goes away.
//!
//! GREEN when:
//! - the server's first frame decodes to `StartApi { client_id }`
//! - a `finished-` history bar arrives at the sink as `HistoricalDataEnd`
//! - requests sent after connect reach the server in order
//! - `is_connected()` turns false after the server closes

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use ibr_schemas::{BarRecord, GatewayEvent, GatewayRequest};
use ibr_session::{EventSink, Transport, WsTransport};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

const CLIENT_ID: i32 = 7;

fn finished_bar(req_id: i64) -> GatewayEvent {
    GatewayEvent::HistoricalData {
        req_id,
        bar: BarRecord {
            date: "finished-20240102  09:30:00-20240102  16:00:00".to_string(),
            open: -1.0,
            high: -1.0,
            low: -1.0,
            close: -1.0,
            volume: -1,
            count: -1,
            wap: -1.0,
            has_gaps: false,
        },
    }
}

fn decode(frame: Message) -> GatewayRequest {
    match frame {
        Message::Text(text) => serde_json::from_str(&text).expect("undecodable request frame"),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

async fn until_disconnected(transport: &WsTransport) {
    while transport.is_connected() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn handshake_events_and_peer_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (close_tx, close_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(tcp).await.unwrap();

        let hello = decode(ws.next().await.unwrap().unwrap());
        let event = serde_json::to_string(&finished_bar(10_001)).unwrap();
        ws.send(Message::Text(event)).await.unwrap();
        let request = decode(ws.next().await.unwrap().unwrap());

        let _ = close_rx.await;
        ws.close(None).await.unwrap();
        (hello, request)
    });

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let sink: EventSink = Arc::new(move |event: GatewayEvent| {
        let _ = events_tx.send(event);
    });

    let transport = WsTransport::new(format!("ws://{addr}"));
    transport.connect(CLIENT_ID, sink).await.unwrap();
    assert!(transport.is_connected());

    let event = tokio::time::timeout(Duration::from_secs(5), events_rx.recv())
        .await
        .expect("no event reached the sink")
        .unwrap();
    match event {
        GatewayEvent::HistoricalDataEnd { req_id, start, end } => {
            assert_eq!(req_id, 10_001);
            assert_eq!(start.as_deref(), Some("20240102  09:30:00"));
            assert_eq!(end.as_deref(), Some("20240102  16:00:00"));
        }
        other => panic!("expected a normalised end marker, got {other:?}"),
    }

    transport
        .send(GatewayRequest::CancelHistoricalData { req_id: 10_001 })
        .unwrap();
    close_tx.send(()).unwrap();

    let (hello, request) = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server never finished")
        .unwrap();
    assert_eq!(hello, GatewayRequest::StartApi { client_id: CLIENT_ID });
    assert_eq!(request, GatewayRequest::CancelHistoricalData { req_id: 10_001 });

    tokio::time::timeout(Duration::from_secs(5), until_disconnected(&transport))
        .await
        .expect("transport still reports connected after the peer closed");
}

#[tokio::test]
async fn refused_connection_is_a_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = WsTransport::new(format!("ws://{addr}"));
    let sink: EventSink = Arc::new(|_: GatewayEvent| {});
    let err = transport.connect(CLIENT_ID, sink).await.unwrap_err();
    assert!(
        matches!(err, ibr_session::TransportError::Connect { .. }),
        "{err:?}"
    );
    assert!(!transport.is_connected());
}
