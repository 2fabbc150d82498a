//! Scenario: Cancel Is Idempotent
//!
//! # Invariant under test
//! Cancelling an order that is already cancelled still reports the
//! cancelled status without an error, as long as the gateway recorded an
//! order-status event for it. A recorded status always wins over a recorded
//! error; the error rides along as `info`.
//!
//! GREEN when:
//! - two cancels of the same id both return `Cancelled`
//! - the second cancel's "not cancellable" error is attached, not raised
//! - a cancel the gateway only answers with an error fails with that error

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ibr_config::TimingConfig;
use ibr_correlation::{CorrelationStore, EventRouter, IdAllocator};
use ibr_facade::{FacadeSettings, Gateway, GatewayError};
use ibr_pool::{LeaseSettings, SlotPool};
use ibr_schemas::{GatewayEvent, GatewayRequest};
use ibr_testkit::{fixtures, scripted_sessions, Responder};

async fn harness(responder: Responder) -> Gateway {
    let (sessions, _gws) = scripted_sessions(2, responder);
    let store = Arc::new(CorrelationStore::new());
    let ids = Arc::new(IdAllocator::new(10_000));
    let router = Arc::new(EventRouter::new(store.clone(), ids.clone(), None));
    Gateway::attach_router(&sessions, &router);
    let pool = SlotPool::new(
        sessions,
        LeaseSettings {
            poll: Duration::from_millis(500),
            max_iterations: 20,
            settle: Duration::from_millis(10),
        },
    );
    pool.connect_all().await;
    let settings = FacadeSettings::from_timing(&TimingConfig::default());
    Gateway::new(pool, store, ids, settings)
}

/// First cancel of 1234 succeeds with code 202; later ones are refused with
/// 161 but the gateway still reports the final status. Unknown ids get 135.
fn broker() -> Responder {
    let cancels = Arc::new(AtomicUsize::new(0));
    Arc::new(move |_: i32, req: &GatewayRequest| match req {
        GatewayRequest::CancelOrder { order_id: 1234 } => {
            let cancelled = GatewayEvent::OrderStatus(fixtures::order_status(1234, "Cancelled"));
            if cancels.fetch_add(1, Ordering::SeqCst) == 0 {
                vec![fixtures::error(1234, 202, "Order Canceled - reason:"), cancelled]
            } else {
                vec![
                    fixtures::error(
                        1234,
                        161,
                        "Cancel attempted when order is not in a cancellable state",
                    ),
                    cancelled,
                ]
            }
        }
        GatewayRequest::CancelOrder { order_id } => {
            vec![fixtures::error(*order_id, 135, "Can't find order with id")]
        }
        _ => Vec::new(),
    })
}

#[tokio::test(start_paused = true)]
async fn second_cancel_reports_the_cancelled_status() {
    let gateway = harness(broker()).await;

    let first = gateway.cancel_order(1234).await.unwrap();
    assert_eq!(
        first.entry.order_status.as_ref().map(|s| s.status.as_str()),
        Some("Cancelled")
    );
    assert_eq!(first.info.and_then(|i| i.error_code), Some(202));

    let second = gateway.cancel_order(1234).await.unwrap();
    assert_eq!(
        second.entry.order_status.as_ref().map(|s| s.status.as_str()),
        Some("Cancelled")
    );
    assert_eq!(second.info.and_then(|i| i.error_code), Some(161));
}

#[tokio::test(start_paused = true)]
async fn error_without_status_is_returned() {
    let gateway = harness(broker()).await;
    let err = gateway.cancel_order(77).await.unwrap_err();
    match err {
        GatewayError::Protocol(rec) => {
            assert_eq!(rec.id, 77);
            assert_eq!(rec.error_code, Some(135));
        }
        other => panic!("expected protocol error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn silent_cancel_times_out() {
    let gateway = harness(Arc::new(|_: i32, _: &GatewayRequest| Vec::new())).await;
    let err = gateway.cancel_order(1234).await.unwrap_err();
    assert_eq!(
        err,
        GatewayError::Timeout {
            operation: "cancel_order"
        }
    );
}
