//! Result shapes returned by façade operations.

use std::collections::BTreeMap;

use ibr_correlation::OrderEntry;
use ibr_pool::PoolSnapshot;
use ibr_schemas::{ErrorRecord, Identifier, OrderStatusRecord};
use serde::Serialize;

/// Accumulated entry contents plus whether the completion predicate held.
/// `complete == false` means the budget ran out and `result` is partial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome<T> {
    pub complete: bool,
    #[serde(flatten)]
    pub result: T,
}

impl<T> Outcome<T> {
    pub fn new(complete: bool, result: T) -> Self {
        Self { complete, result }
    }
}

/// Statuses that end the wait for a placed order.
pub const ACCEPTED_STATUSES: &[&str] = &["Filled", "Submitted", "PreSubmitted", "Cancelled"];

pub(crate) fn status_in(status: &str, accepted: &[&str]) -> bool {
    accepted.iter().any(|s| s.eq_ignore_ascii_case(status))
}

/// Condensed view of one order after a place/modify call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trailing_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aux_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lmt_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_fill_price: Option<f64>,
}

impl OrderSummary {
    pub(crate) fn from_entry(
        status: &OrderStatusRecord,
        entry: &OrderEntry,
        accepted: &[&str],
    ) -> Self {
        let order = entry.open_order.as_ref().map(|o| &o.order);
        let order_type = order.map(|o| o.order_type.clone());
        let is_trail = order_type.as_deref().map_or(true, |t| t == "TRAIL");
        let fill = (status.avg_fill_price != 0.0 && status_in(&status.status, accepted))
            .then_some(status.avg_fill_price);
        Self {
            status: status.status.clone(),
            total_quantity: order.map(|o| o.total_quantity),
            order_type,
            trailing_percent: order.and_then(|o| o.trailing_percent).filter(|_| is_trail),
            aux_price: order.and_then(|o| o.aux_price),
            lmt_price: order.and_then(|o| o.lmt_price),
            symbol: entry.open_order.as_ref().map(|o| o.contract.symbol.clone()),
            avg_fill_price: fill,
        }
    }
}

/// Per-order outcome of one submission phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlaceOrdersResponse {
    pub orders: BTreeMap<Identifier, OrderSummary>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<Identifier, ErrorRecord>,
    pub complete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OcaResponse {
    pub open_resp: PlaceOrdersResponse,
    /// Empty when the anchor never filled and the group was not submitted.
    pub close_resp: PlaceOrdersResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub order_id: Identifier,
    #[serde(flatten)]
    pub entry: OrderEntry,
    /// Informational error recorded alongside the status (e.g. code 202).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<ErrorRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStates {
    #[serde(flatten)]
    pub pool: PoolSnapshot,
    pub managed_accounts: Vec<String>,
    pub next_order_id: Identifier,
}
