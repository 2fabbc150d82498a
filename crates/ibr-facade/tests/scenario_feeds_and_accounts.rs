//! Scenario: Feeds And Accounts
//!
//! # Invariant under test
//! Every pooled read waits for its own end marker (or sample count), always
//! unsubscribes afterwards, and hands back the accumulated entry.
//!
//! GREEN when:
//! - market data stops at the sample threshold, or early on disconnect
//! - a request abandoned mid-wait still unsubscribes and leaves no entry
//! - positions, account summary and account updates end on their markers
//! - account summary results nest account → tag → value
//! - executions default the client filter to the order slot and merge the
//!   commission report under the execution id

use std::sync::Arc;
use std::time::Duration;

use ibr_config::TimingConfig;
use ibr_correlation::{CorrelationStore, EventRouter, IdAllocator};
use ibr_facade::{FacadeSettings, Gateway, GatewayError};
use ibr_pool::{LeaseSettings, SlotPool};
use ibr_schemas::args::ContractArgs;
use ibr_schemas::{
    AccountSummaryRecord, AccountValueRecord, Contract, ExecutionFilter, GatewayEvent,
    GatewayRequest,
};
use ibr_testkit::{fixtures, scripted_sessions, Responder, ScriptedGateway};

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

fn ticks(ticker_id: i64, n: usize) -> Vec<GatewayEvent> {
    (0..n)
        .map(|i| GatewayEvent::TickPrice {
            ticker_id,
            field: 1 + (i as i32 % 3),
            price: 187.0 + i as f64 / 100.0,
            can_auto_execute: false,
        })
        .collect()
}

fn summary(req_id: i64, account: &str, tag: &str, value: &str) -> GatewayEvent {
    GatewayEvent::AccountSummary {
        req_id,
        record: AccountSummaryRecord {
            account: account.to_string(),
            tag: tag.to_string(),
            value: value.to_string(),
            currency: "USD".to_string(),
        },
    }
}

fn broker() -> Responder {
    Arc::new(|_: i32, req: &GatewayRequest| match req {
        GatewayRequest::ReqMktData { ticker_id, contract, .. } => {
            let n = match contract.symbol.as_str() {
                "THIN" => 2,
                "SILENT" => 0,
                _ => 6,
            };
            ticks(*ticker_id, n)
        }
        GatewayRequest::ReqPositions => vec![
            GatewayEvent::Position(fixtures::position("DU111", "AAPL", 100.0)),
            GatewayEvent::Position(fixtures::position("DU222", "MSFT", -50.0)),
            GatewayEvent::PositionEnd,
        ],
        GatewayRequest::ReqAccountSummary { req_id, .. } => vec![
            summary(*req_id, "DU111", "NetLiquidation", "100000.00"),
            summary(*req_id, "DU111", "BuyingPower", "400000.00"),
            summary(*req_id, "DU222", "NetLiquidation", "2500.00"),
            GatewayEvent::AccountSummaryEnd { req_id: *req_id },
        ],
        GatewayRequest::ReqAccountUpdates {
            subscribe: true,
            acct_code,
        } => vec![
            GatewayEvent::UpdateAccountTime {
                time_stamp: "10:15".to_string(),
            },
            GatewayEvent::UpdateAccountValue(AccountValueRecord {
                key: "CashBalance".to_string(),
                value: "1000".to_string(),
                currency: "USD".to_string(),
                account_name: acct_code.clone(),
            }),
            GatewayEvent::AccountDownloadEnd {
                account_name: acct_code.clone(),
            },
        ],
        GatewayRequest::ReqExecutions { req_id, .. } => vec![
            GatewayEvent::ExecDetails {
                req_id: *req_id,
                contract: Contract::stock("AAPL"),
                execution: fixtures::execution("0001f4e8.01", 100),
            },
            GatewayEvent::ExecDetailsEnd { req_id: *req_id },
            GatewayEvent::CommissionReport(fixtures::commission("0001f4e8.01", 1.25)),
        ],
        GatewayRequest::ReqContractDetails { req_id, contract } => vec![
            fixtures::contract_details(*req_id, contract.clone(), 265_598),
            GatewayEvent::ContractDetailsEnd { req_id: *req_id },
        ],
        _ => Vec::new(),
    })
}

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn market_data_completes_at_the_sample_threshold() {
    let (gateway, gws) = harness(broker()).await;
    let out = gateway
        .get_market_data("AAPL", &ContractArgs::default())
        .await
        .unwrap();
    assert!(out.complete);
    assert_eq!(out.result.len(), 6);
    assert_eq!(gws[1].sent_names(), vec!["req_mkt_data", "cancel_mkt_data"]);
}

#[tokio::test(start_paused = true)]
async fn market_data_returns_partial_samples_on_disconnect() {
    let (gateway, gws) = harness(broker()).await;
    let dropper = gws[1].clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(600)).await;
        dropper.drop_connection();
    });

    let out = gateway
        .get_market_data("THIN", &ContractArgs::default())
        .await
        .unwrap();
    assert!(!out.complete);
    assert_eq!(out.result.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn abandoned_market_request_still_unsubscribes() {
    let (gateway, gws) = harness(broker()).await;
    let abandoned = tokio::time::timeout(
        Duration::from_secs(1),
        gateway.get_market_data("SILENT", &ContractArgs::default()),
    )
    .await;

    assert!(abandoned.is_err(), "the caller gave up before the budget");
    assert_eq!(gws[1].sent_names(), vec!["req_mkt_data", "cancel_mkt_data"]);
    assert!(gateway
        .store()
        .read(|st| st.market.is_empty() && st.watched.is_empty()));
    assert_eq!(gateway.pool().snapshot().free, vec![1]);
}

#[tokio::test(start_paused = true)]
async fn abandoned_history_request_still_cancels() {
    let (gateway, gws) = harness(broker()).await;
    let abandoned = tokio::time::timeout(
        Duration::from_secs(1),
        gateway.get_history("AAPL", &ContractArgs::default(), Default::default()),
    )
    .await;

    assert!(abandoned.is_err());
    assert_eq!(
        gws[1].sent_names(),
        vec!["req_historical_data", "cancel_historical_data"]
    );
    assert!(gateway.store().read(|st| st.history.is_empty()));
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn positions_end_on_their_marker_and_unsubscribe() {
    let (gateway, gws) = harness(broker()).await;
    let out = gateway.get_positions().await.unwrap();
    assert!(out.complete);
    assert_eq!(out.result.positions.len(), 2);
    assert_eq!(gws[1].sent_names(), vec!["req_positions", "cancel_positions"]);
}

#[tokio::test(start_paused = true)]
async fn account_summary_nests_account_then_tag() {
    let (gateway, gws) = harness(broker()).await;
    let tags = vec!["NetLiquidation".to_string(), "BuyingPower".to_string()];
    let out = gateway.get_account_summary(&tags).await.unwrap();

    assert!(out.complete);
    assert_eq!(out.result.accounts["DU111"]["BuyingPower"], "400000.00");
    assert_eq!(out.result.accounts["DU222"]["NetLiquidation"], "2500.00");
    assert_eq!(
        gws[1].sent_names(),
        vec!["req_account_summary", "cancel_account_summary"]
    );
    match &gws[1].sent()[0] {
        GatewayRequest::ReqAccountSummary { group, tags, .. } => {
            assert_eq!(group, "All");
            assert_eq!(tags, "NetLiquidation,BuyingPower");
        }
        other => panic!("unexpected request {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn unknown_summary_tag_is_rejected_without_a_request() {
    let (gateway, gws) = harness(broker()).await;
    let err = gateway
        .get_account_summary(&["Karma".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Validation(_)));
    assert!(gws[1].sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn account_update_subscribes_then_unsubscribes() {
    let (gateway, gws) = harness(broker()).await;
    let out = gateway.get_account_update("DU111").await.unwrap();

    assert!(out.complete);
    assert_eq!(out.result.update_account_time.as_deref(), Some("10:15"));
    assert_eq!(out.result.update_account_value["CashBalance"].value, "1000");

    let subscriptions: Vec<bool> = gws[1]
        .sent()
        .into_iter()
        .filter_map(|r| match r {
            GatewayRequest::ReqAccountUpdates { subscribe, acct_code } => {
                assert_eq!(acct_code, "DU111");
                Some(subscribe)
            }
            _ => None,
        })
        .collect();
    assert_eq!(subscriptions, vec![true, false]);
}

// ---------------------------------------------------------------------------
// Reference data / executions
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn contract_details_resolve_the_con_id() {
    let (gateway, _gws) = harness(broker()).await;
    let out = gateway
        .get_contract_details("AAPL", &ContractArgs::default())
        .await
        .unwrap();
    assert!(out.complete);
    assert_eq!(out.result.contract_details[0].summary.con_id, Some(265_598));
}

#[tokio::test(start_paused = true)]
async fn executions_merge_commissions_and_default_the_client_filter() {
    let (gateway, gws) = harness(broker()).await;
    let out = gateway
        .get_executions(ExecutionFilter::default())
        .await
        .unwrap();

    assert!(out.complete);
    assert_eq!(out.result.exec_details.len(), 1);
    assert_eq!(
        out.result.commission_report["0001f4e8.01"].commission,
        1.25,
        "commission arriving after the end marker is still merged"
    );
    match &gws[1].sent()[0] {
        GatewayRequest::ReqExecutions { filter, .. } => assert_eq!(filter.client_id, Some(0)),
        other => panic!("unexpected request {other:?}"),
    }
}
