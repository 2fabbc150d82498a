//! Scenario: History Round Trip
//!
//! # Invariant under test
//! N bars followed by an end marker yield exactly N bars keyed by their
//! reported dates, whatever order they arrived in. The unsubscribe is sent
//! on every exit path: success, gateway error and timeout. Replies that
//! trail the unsubscribe leave nothing behind in the store.

use std::sync::Arc;
use std::time::Duration;

use ibr_config::TimingConfig;
use ibr_correlation::{CorrelationStore, EventRouter, IdAllocator};
use ibr_facade::{FacadeSettings, Gateway, GatewayError, HistoryParams};
use ibr_pool::{LeaseSettings, SlotPool};
use ibr_schemas::args::ContractArgs;
use ibr_schemas::{GatewayEvent, GatewayRequest};
use ibr_testkit::{fixtures, scripted_sessions, Responder, ScriptedGateway};
use tokio::time::Instant;

async fn harness(responder: Responder) -> (Gateway, Vec<Arc<ScriptedGateway>>) {
    let (sessions, gws) = scripted_sessions(2, responder);
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

fn bars_then(req_id: i64, dates: &[&str], finish: bool) -> Vec<GatewayEvent> {
    let mut events: Vec<GatewayEvent> = dates
        .iter()
        .map(|d| GatewayEvent::HistoricalData {
            req_id,
            bar: fixtures::bar(d, 187.0),
        })
        .collect();
    if finish {
        events.push(GatewayEvent::HistoricalData {
            req_id,
            bar: fixtures::bar("finished-20240102  09:30:00-20240104  16:00:00", -1.0),
        });
    }
    events
}

fn history_requests(gw: &ScriptedGateway) -> Vec<ibr_schemas::HistoryRequest> {
    gw.sent()
        .into_iter()
        .filter_map(|r| match r {
            GatewayRequest::ReqHistoricalData(h) => Some(h),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn out_of_order_bars_come_back_sorted_by_date() {
    let (gateway, gws) = harness(Arc::new(|_: i32, req: &GatewayRequest| match req {
        GatewayRequest::ReqHistoricalData(h) => bars_then(
            h.req_id,
            &["20240103", "20240102", "20240104", "20240102"],
            true,
        ),
        _ => Vec::new(),
    }))
    .await;

    let out = gateway
        .get_history("AAPL", &ContractArgs::default(), HistoryParams::default())
        .await
        .unwrap();

    assert!(out.complete);
    let dates: Vec<&str> = out.result.bars.keys().map(String::as_str).collect();
    assert_eq!(dates, vec!["20240102", "20240103", "20240104"]);
    assert!(out.result.finished.is_some());

    let names = gws[1].sent_names();
    assert_eq!(names, vec!["req_historical_data", "cancel_historical_data"]);
}

#[tokio::test(start_paused = true)]
async fn unset_fields_take_the_gateway_defaults() {
    let (gateway, gws) = harness(Arc::new(|_: i32, req: &GatewayRequest| match req {
        GatewayRequest::ReqHistoricalData(h) => bars_then(h.req_id, &[], true),
        _ => Vec::new(),
    }))
    .await;

    let params = HistoryParams {
        duration_str: Some("5 D".to_string()),
        ..HistoryParams::default()
    };
    gateway
        .get_history("MSFT", &ContractArgs::default(), params)
        .await
        .unwrap();

    let req = &history_requests(&gws[1])[0];
    assert_eq!(req.contract.symbol, "MSFT");
    assert_eq!(req.contract.exchange, "SMART");
    assert_eq!(req.duration_str, "5 D");
    assert_eq!(req.bar_size_setting, "1 min");
    assert_eq!(req.what_to_show, "TRADES");
    assert_eq!(req.use_rth, 0);
    assert_eq!(req.format_date, 2);
    assert_eq!(req.end_date_time.len(), "20240102 09:30:00".len());
    assert!(req.req_id > 10_000, "feed ids sit above the threshold");
}

#[tokio::test(start_paused = true)]
async fn gateway_error_aborts_and_still_unsubscribes() {
    let (gateway, gws) = harness(Arc::new(|_: i32, req: &GatewayRequest| match req {
        GatewayRequest::ReqHistoricalData(h) => {
            let mut events = bars_then(h.req_id, &["20240102"], false);
            events.push(fixtures::error(
                h.req_id,
                162,
                "Historical Market Data Service error message:pacing violation",
            ));
            events
        }
        _ => Vec::new(),
    }))
    .await;

    let err = gateway
        .get_history("AAPL", &ContractArgs::default(), HistoryParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Protocol(_)));
    assert_eq!(err.http_status(), 429, "pacing violations are retryable");
    assert_eq!(
        gws[1].sent_names(),
        vec!["req_historical_data", "cancel_historical_data"]
    );
}

#[tokio::test(start_paused = true)]
async fn timeout_returns_the_bars_that_did_arrive() {
    let (gateway, gws) = harness(Arc::new(|_: i32, req: &GatewayRequest| match req {
        GatewayRequest::ReqHistoricalData(h) => bars_then(h.req_id, &["20240102"], false),
        _ => Vec::new(),
    }))
    .await;
    let started = Instant::now();

    let out = gateway
        .get_history("AAPL", &ContractArgs::default(), HistoryParams::default())
        .await
        .unwrap();

    assert!(!out.complete);
    assert_eq!(out.result.bars.len(), 1);
    assert_eq!(started.elapsed(), Duration::from_millis(250 * 20));
    assert_eq!(gws[1].sent_names().last(), Some(&"cancel_historical_data"));
}

#[tokio::test(start_paused = true)]
async fn invalid_contract_fields_are_rejected() {
    let (gateway, gws) = harness(Arc::new(|_: i32, _: &GatewayRequest| Vec::new())).await;
    let contract = ContractArgs {
        sec_type: Some("BOND".to_string()),
        ..ContractArgs::default()
    };
    let err = gateway
        .get_history("AAPL", &contract, HistoryParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Validation(_)));
    assert!(gws[1].sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn late_cancel_replies_are_not_retained() {
    let (gateway, gws) = harness(Arc::new(|_: i32, req: &GatewayRequest| match req {
        GatewayRequest::ReqHistoricalData(h) => bars_then(h.req_id, &["20240102"], true),
        GatewayRequest::CancelHistoricalData { req_id } => vec![fixtures::error(
            *req_id,
            366,
            "No historical data query found for ticker id",
        )],
        _ => Vec::new(),
    }))
    .await;
    gws[1].set_delay(Some(Duration::from_millis(100)));

    for _ in 0..50 {
        let out = gateway
            .get_history("AAPL", &ContractArgs::default(), HistoryParams::default())
            .await
            .unwrap();
        assert!(out.complete);
    }
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(history_requests(&gws[1]).len(), 50);
    assert!(gateway
        .store()
        .read(|st| st.errors.is_empty() && st.watched.is_empty() && st.history.is_empty()));
}
