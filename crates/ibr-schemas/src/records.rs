//! Typed payload records carried by gateway events.
//!
//! Records serialize in camelCase so HTTP responses keep the attribute names
//! clients of the gateway already know.

use serde::{Deserialize, Serialize};

use crate::{Contract, Identifier, Order, RATE_LIMIT_CODE};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error event payload, keyed by the request or order id that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: Identifier,
    #[serde(rename = "errorCode")]
    pub error_code: Option<i32>,
    #[serde(rename = "errorMsg")]
    pub error_msg: String,
}

impl ErrorRecord {
    pub fn new(id: Identifier, error_code: Option<i32>, error_msg: impl Into<String>) -> Self {
        Self {
            id,
            error_code,
            error_msg: error_msg.into(),
        }
    }

    /// Pacing violations are retryable by the HTTP caller.
    pub fn is_rate_limited(&self) -> bool {
        self.error_code == Some(RATE_LIMIT_CODE)
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderState {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrderRecord {
    pub order_id: Identifier,
    pub contract: Contract,
    pub order: Order,
    #[serde(default)]
    pub order_state: OrderState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusRecord {
    pub order_id: Identifier,
    pub status: String,
    #[serde(default)]
    pub filled: f64,
    #[serde(default)]
    pub remaining: f64,
    #[serde(default)]
    pub avg_fill_price: f64,
    #[serde(default)]
    pub perm_id: i64,
    #[serde(default)]
    pub parent_id: Identifier,
    #[serde(default)]
    pub last_fill_price: f64,
    #[serde(default)]
    pub client_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why_held: Option<String>,
}

impl OrderStatusRecord {
    pub fn is_filled(&self) -> bool {
        self.status.eq_ignore_ascii_case("Filled")
    }
}

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarRecord {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: i64,
    #[serde(default)]
    pub count: i32,
    #[serde(default)]
    pub wap: f64,
    #[serde(default)]
    pub has_gaps: bool,
}

/// One market-data tick as accumulated for a feed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum TickSample {
    Price {
        field: i32,
        price: f64,
        #[serde(default)]
        can_auto_execute: bool,
    },
    Size {
        field: i32,
        size: i64,
    },
}

// ---------------------------------------------------------------------------
// Account / portfolio
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRecord {
    pub account: String,
    pub contract: Contract,
    pub position: f64,
    #[serde(default)]
    pub avg_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummaryRecord {
    pub account: String,
    pub tag: String,
    pub value: String,
    #[serde(default)]
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountValueRecord {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub currency: String,
    pub account_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioRecord {
    pub contract: Contract,
    pub position: f64,
    pub market_price: f64,
    pub market_value: f64,
    pub average_cost: f64,
    pub unrealized_pnl: f64,
    pub realized_pnl: f64,
    pub account_name: String,
}

// ---------------------------------------------------------------------------
// Reference data / executions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDetailsRecord {
    /// Fully resolved contract, including the exchange-assigned `conId`.
    pub summary: Contract,
    #[serde(default)]
    pub market_name: String,
    #[serde(default)]
    pub min_tick: f64,
    #[serde(default)]
    pub long_name: String,
    #[serde(default)]
    pub trading_class: String,
    #[serde(default)]
    pub valid_exchanges: String,
    #[serde(default)]
    pub order_types: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub exec_id: String,
    pub order_id: Identifier,
    #[serde(default)]
    pub client_id: i32,
    pub time: String,
    #[serde(default)]
    pub acct_number: String,
    #[serde(default)]
    pub exchange: String,
    pub side: String,
    pub shares: f64,
    pub price: f64,
    #[serde(default)]
    pub perm_id: i64,
    #[serde(default)]
    pub cum_qty: f64,
    #[serde(default)]
    pub avg_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionReportRecord {
    pub exec_id: String,
    pub commission: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realized_pnl: Option<f64>,
    #[serde(default, rename = "yield", skip_serializing_if = "Option::is_none")]
    pub yield_: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yield_redemption_date: Option<i32>,
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Durable side effect emitted by the event router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PersistRecord {
    FilledOrder(OrderStatusRecord),
    Commission(CommissionReportRecord),
}
