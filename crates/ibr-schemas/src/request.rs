use serde::{Deserialize, Serialize};

use crate::{Contract, ExecutionFilter, Identifier, Order};

/// Historical-data request fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRequest {
    pub req_id: Identifier,
    pub contract: Contract,
    pub end_date_time: String,
    pub duration_str: String,
    pub bar_size_setting: String,
    pub what_to_show: String,
    pub use_rth: i32,
    pub format_date: i32,
}

/// Requests a Session can send to the external gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum GatewayRequest {
    /// First frame on every connection; binds the connection to a client id.
    StartApi {
        client_id: i32,
    },
    PlaceOrder {
        order_id: Identifier,
        contract: Contract,
        order: Order,
    },
    CancelOrder {
        order_id: Identifier,
    },
    ReqOpenOrders,
    ReqAllOpenOrders,
    ReqHistoricalData(HistoryRequest),
    CancelHistoricalData {
        req_id: Identifier,
    },
    ReqMktData {
        ticker_id: Identifier,
        contract: Contract,
        #[serde(default)]
        generic_tick_list: String,
        #[serde(default)]
        snapshot: bool,
    },
    CancelMktData {
        ticker_id: Identifier,
    },
    ReqPositions,
    CancelPositions,
    ReqAccountSummary {
        req_id: Identifier,
        group: String,
        tags: String,
    },
    CancelAccountSummary {
        req_id: Identifier,
    },
    ReqAccountUpdates {
        subscribe: bool,
        acct_code: String,
    },
    ReqContractDetails {
        req_id: Identifier,
        contract: Contract,
    },
    ReqExecutions {
        req_id: Identifier,
        filter: ExecutionFilter,
    },
}

impl GatewayRequest {
    /// Short name used in log fields.
    pub fn name(&self) -> &'static str {
        match self {
            GatewayRequest::StartApi { .. } => "start_api",
            GatewayRequest::PlaceOrder { .. } => "place_order",
            GatewayRequest::CancelOrder { .. } => "cancel_order",
            GatewayRequest::ReqOpenOrders => "req_open_orders",
            GatewayRequest::ReqAllOpenOrders => "req_all_open_orders",
            GatewayRequest::ReqHistoricalData(_) => "req_historical_data",
            GatewayRequest::CancelHistoricalData { .. } => "cancel_historical_data",
            GatewayRequest::ReqMktData { .. } => "req_mkt_data",
            GatewayRequest::CancelMktData { .. } => "cancel_mkt_data",
            GatewayRequest::ReqPositions => "req_positions",
            GatewayRequest::CancelPositions => "cancel_positions",
            GatewayRequest::ReqAccountSummary { .. } => "req_account_summary",
            GatewayRequest::CancelAccountSummary { .. } => "cancel_account_summary",
            GatewayRequest::ReqAccountUpdates { .. } => "req_account_updates",
            GatewayRequest::ReqContractDetails { .. } => "req_contract_details",
            GatewayRequest::ReqExecutions { .. } => "req_executions",
        }
    }
}
