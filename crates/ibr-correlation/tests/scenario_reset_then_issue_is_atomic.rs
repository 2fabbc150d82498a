//! Reset-then-issue is atomic with respect to the router.
//!
//! GREEN when:
//! - an event dispatched after the entry is registered but before the waiter
//!   starts waiting is still observed by the waiter
//! - an event dispatched before registration is not
//! - events for a popped entry are dropped, not resurrected

use std::sync::Arc;
use std::time::Duration;

use ibr_correlation::{CorrelationStore, EntryKey, EventRouter, IdAllocator};
use ibr_schemas::{GatewayEvent, TickSample};

fn setup() -> (Arc<CorrelationStore>, Arc<EventRouter>) {
    let store = Arc::new(CorrelationStore::new());
    let ids = Arc::new(IdAllocator::new(10_000));
    let router = Arc::new(EventRouter::new(store.clone(), ids, None));
    (store, router)
}

fn tick(ticker_id: i64) -> GatewayEvent {
    GatewayEvent::TickSize {
        ticker_id,
        field: 8,
        size: 100,
    }
}

#[tokio::test]
async fn event_between_reset_and_wait_is_not_lost() {
    let (store, router) = setup();

    store.begin(1, &EntryKey::Market(10_001));
    // The "gateway" answers before the waiter has even looked.
    router.dispatch(1, &tick(10_001));

    let seen = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let notified = store.changed().notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let n = store.read(|st| st.market.get(&10_001).map_or(0, Vec::len));
            if n >= 1 {
                return n;
            }
            notified.await;
        }
    })
    .await
    .expect("waiter never saw the tick");

    assert_eq!(seen, 1);
}

#[tokio::test]
async fn concurrent_writer_wakes_waiter() {
    let (store, router) = setup();
    store.begin(1, &EntryKey::Market(10_002));

    let r = router.clone();
    let writer = tokio::spawn(async move {
        for _ in 0..5 {
            tokio::task::yield_now().await;
            r.dispatch(3, &tick(10_002));
        }
    });

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let notified = store.changed().notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if store.read(|st| st.market[&10_002].len()) >= 5 {
                break;
            }
            notified.await;
        }
    })
    .await
    .expect("waiter was not woken by concurrent writes");

    writer.await.unwrap();
    let ticks = store.take_market(10_002);
    assert_eq!(ticks.len(), 5);
    assert!(matches!(ticks[0], TickSample::Size { size: 100, .. }));
}

#[test]
fn events_before_registration_or_after_pop_are_dropped() {
    let (store, router) = setup();

    router.dispatch(1, &tick(10_003));
    store.begin(1, &EntryKey::Market(10_003));
    assert!(store.read(|st| st.market[&10_003].is_empty()));

    router.dispatch(1, &tick(10_003));
    assert_eq!(store.take_market(10_003).len(), 1);

    router.dispatch(1, &tick(10_003));
    assert!(store.read(|st| !st.market.contains_key(&10_003)));
}
