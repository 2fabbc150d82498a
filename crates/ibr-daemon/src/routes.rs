//! Axum router and all HTTP handlers for ibr-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers only extract arguments, call the façade and
//! map the result: `200` with the operation's JSON, otherwise the error's
//! status with its `{id, errorCode, errorMsg}` record.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ibr_facade::{GatewayError, HistoryParams};
use ibr_schemas::args::ContractArgs;
use ibr_schemas::ExecutionFilter;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    api_types::{
        summary_tags, AccountUpdateQuery, ArgumentErrorResponse, ArgumentMessages, CancelQuery,
        HealthResponse, OrderBody, MISSING_TAGS_MSG,
    },
    state::AppState,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/history/:symbol", get(history))
        .route("/market/:symbol", get(market))
        .route(
            "/order",
            get(open_orders).post(place_order).delete(cancel_order),
        )
        .route("/order/oca", post(place_order_oca))
        .route("/account/positions", get(positions))
        .route("/account/summary", get(account_summary))
        .route("/account/update", get(account_update))
        .route("/contract/:symbol", get(contract_details))
        .route("/executions", get(executions))
        .route("/clients", get(clients))
        .with_state(state)
}

/// Map a façade result onto the HTTP boundary.
fn respond<T: Serialize>(op: &'static str, result: Result<T, GatewayError>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => {
            let status =
                StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::BAD_REQUEST);
            warn!(op, status = status.as_u16(), error = %e, "request failed");
            (status, Json(e.to_record())).into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
            config_hash: st.config_hash.clone(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

pub(crate) async fn history(
    State(st): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(contract): Query<ContractArgs>,
    Query(params): Query<HistoryParams>,
) -> Response {
    let result = st.gateway.get_history(&symbol, &contract, params).await;
    respond("history", result)
}

pub(crate) async fn market(
    State(st): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(contract): Query<ContractArgs>,
) -> Response {
    let result = st.gateway.get_market_data(&symbol, &contract).await;
    respond("market", result)
}

// ---------------------------------------------------------------------------
// /order
// ---------------------------------------------------------------------------

pub(crate) async fn open_orders(State(st): State<Arc<AppState>>) -> Response {
    respond("open_orders", st.gateway.get_open_orders().await)
}

pub(crate) async fn place_order(
    State(st): State<Arc<AppState>>,
    Json(body): Json<OrderBody>,
) -> Response {
    let items = body.into_items();
    info!(count = items.len(), "place order request");
    respond("place_orders", st.gateway.place_orders(&items).await)
}

pub(crate) async fn cancel_order(
    State(st): State<Arc<AppState>>,
    Query(q): Query<CancelQuery>,
) -> Response {
    respond("cancel_order", st.gateway.cancel_order(q.order_id).await)
}

pub(crate) async fn place_order_oca(
    State(st): State<Arc<AppState>>,
    Json(items): Json<Vec<ibr_schemas::args::OrderArgs>>,
) -> Response {
    info!(count = items.len(), "oca order request");
    respond("place_order_oca", st.gateway.place_order_oca(&items).await)
}

// ---------------------------------------------------------------------------
// /account
// ---------------------------------------------------------------------------

pub(crate) async fn positions(State(st): State<Arc<AppState>>) -> Response {
    respond("positions", st.gateway.get_positions().await)
}

/// `tag` may repeat, so the raw pairs are extracted rather than a struct.
pub(crate) async fn account_summary(
    State(st): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let tags = summary_tags(&params);
    if tags.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ArgumentErrorResponse {
                message: ArgumentMessages {
                    tags: MISSING_TAGS_MSG.to_string(),
                },
            }),
        )
            .into_response();
    }
    respond("account_summary", st.gateway.get_account_summary(&tags).await)
}

pub(crate) async fn account_update(
    State(st): State<Arc<AppState>>,
    Query(q): Query<AccountUpdateQuery>,
) -> Response {
    let result = st.gateway.get_account_update(&q.acct_code).await;
    respond("account_update", result)
}

// ---------------------------------------------------------------------------
// Reference data and executions
// ---------------------------------------------------------------------------

pub(crate) async fn contract_details(
    State(st): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(contract): Query<ContractArgs>,
) -> Response {
    let result = st.gateway.get_contract_details(&symbol, &contract).await;
    respond("contract_details", result)
}

pub(crate) async fn executions(
    State(st): State<Arc<AppState>>,
    Query(filter): Query<ExecutionFilter>,
) -> Response {
    respond("executions", st.gateway.get_executions(filter).await)
}

// ---------------------------------------------------------------------------
// GET /clients
// ---------------------------------------------------------------------------

pub(crate) async fn clients(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(st.gateway.client_states()))
}
