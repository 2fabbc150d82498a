//! Scenario: OCA Anchor Gate
//!
//! # Invariant under test
//! An OCA batch submits only its anchor at first. The remaining orders are
//! sent, tagged with a group named after the anchor id, only once the
//! anchor has filled. An anchor that never fills within the extended budget
//! means the group is never submitted and the close phase comes back empty.

use std::sync::Arc;
use std::time::Duration;

use ibr_config::TimingConfig;
use ibr_correlation::{CorrelationStore, EventRouter, IdAllocator};
use ibr_facade::{FacadeSettings, Gateway};
use ibr_pool::{LeaseSettings, SlotPool};
use ibr_schemas::args::OrderArgs;
use ibr_schemas::{GatewayEvent, GatewayRequest, Order};
use ibr_testkit::{fixtures, scripted_sessions, Responder, ScriptedGateway};
use tokio::time::Instant;

const ANCHOR_ID: i64 = 500;

async fn harness(responder: Responder) -> (Gateway, Vec<Arc<ScriptedGateway>>) {
    let (sessions, gws) = scripted_sessions(2, responder);
    gws[0].set_on_connect(vec![GatewayEvent::NextValidId { order_id: ANCHOR_ID }]);
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
    (Gateway::new(pool, store, ids, settings), gws)
}

/// Every placed order is answered with `status`.
fn broker(status: &'static str) -> Responder {
    Arc::new(move |_: i32, req: &GatewayRequest| match req {
        GatewayRequest::PlaceOrder {
            order_id,
            contract,
            order,
        } => fixtures::order_events(*order_id, contract.clone(), order.clone(), status),
        _ => Vec::new(),
    })
}

fn item(symbol: &str, action: &str, order_type: &str) -> OrderArgs {
    OrderArgs {
        symbol: Some(symbol.to_string()),
        action: Some(action.to_string()),
        total_quantity: Some(100),
        order_type: Some(order_type.to_string()),
        ..OrderArgs::default()
    }
}

fn bracket() -> Vec<OrderArgs> {
    let mut stop = item("AAPL", "SELL", "STP");
    stop.aux_price = Some(180.0);
    let mut take = item("AAPL", "SELL", "LMT");
    take.lmt_price = Some(195.0);
    vec![item("AAPL", "BUY", "MKT"), stop, take]
}

fn placed_orders(gw: &ScriptedGateway) -> Vec<(i64, Order)> {
    gw.sent()
        .into_iter()
        .filter_map(|r| match r {
            GatewayRequest::PlaceOrder {
                order_id, order, ..
            } => Some((order_id, order)),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn unfilled_anchor_never_releases_the_group() {
    let (gateway, gws) = harness(broker("Submitted")).await;
    let started = Instant::now();

    let resp = gateway.place_order_oca(&bracket()).await.unwrap();

    assert_eq!(started.elapsed(), Duration::from_millis(250 * 240));
    assert!(!resp.open_resp.complete);
    assert_eq!(resp.open_resp.orders[&ANCHOR_ID].status, "Submitted");
    assert!(resp.close_resp.orders.is_empty());
    assert!(resp.close_resp.errors.is_empty());

    let sent = placed_orders(&gws[0]);
    assert_eq!(sent.len(), 1, "only the anchor may be sent");
    assert_eq!(sent[0].0, ANCHOR_ID);
}

#[tokio::test(start_paused = true)]
async fn filled_anchor_releases_the_group_tagged_with_its_id() {
    let (gateway, gws) = harness(broker("Filled")).await;

    let resp = gateway.place_order_oca(&bracket()).await.unwrap();

    assert!(resp.open_resp.complete);
    let anchor = &resp.open_resp.orders[&ANCHOR_ID];
    assert_eq!(anchor.status, "Filled");
    assert_eq!(anchor.avg_fill_price, Some(187.25));

    assert!(resp.close_resp.complete);
    let closed: Vec<i64> = resp.close_resp.orders.keys().copied().collect();
    assert_eq!(closed, vec![ANCHOR_ID + 1, ANCHOR_ID + 2]);
    assert_eq!(resp.close_resp.orders[&(ANCHOR_ID + 1)].aux_price, Some(180.0));
    assert_eq!(resp.close_resp.orders[&(ANCHOR_ID + 2)].lmt_price, Some(195.0));

    let sent = placed_orders(&gws[0]);
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].1.oca_group, None);
    for (_, order) in &sent[1..] {
        assert_eq!(order.oca_group.as_deref(), Some("500"));
        assert_eq!(order.oca_type, Some(1));
        assert_eq!(order.parent_id, None);
    }
}

#[tokio::test(start_paused = true)]
async fn lone_anchor_has_an_empty_close_phase() {
    let (gateway, _gws) = harness(broker("Filled")).await;
    let resp = gateway
        .place_order_oca(&[item("MSFT", "BUY", "MKT")])
        .await
        .unwrap();
    assert!(resp.open_resp.complete);
    assert!(resp.close_resp.orders.is_empty());
}
