use serde::{Deserialize, Serialize};

use crate::Identifier;

/// Instrument description sent with every contract-scoped request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub con_id: Option<i64>,
    pub symbol: String,
    pub sec_type: String,
    pub exchange: String,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_exch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strike: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub combo_legs: Vec<ComboLeg>,
}

impl Contract {
    /// US stock routed through SMART, the defaults applied to every contract
    /// before user-supplied fields override them.
    pub fn stock(symbol: impl Into<String>) -> Self {
        Self {
            con_id: None,
            symbol: symbol.into(),
            sec_type: "STK".to_string(),
            exchange: "SMART".to_string(),
            currency: "USD".to_string(),
            primary_exch: None,
            local_symbol: None,
            expiry: None,
            strike: None,
            right: None,
            multiplier: None,
            combo_legs: Vec::new(),
        }
    }

    pub fn is_combo(&self) -> bool {
        self.sec_type == "BAG"
    }
}

/// One resolved leg of a multi-leg (BAG) contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComboLeg {
    pub con_id: i64,
    pub ratio: i32,
    pub action: String,
    pub exchange: String,
}

/// Order attributes sent with a place-order request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub client_id: i32,
    pub action: String,
    pub total_quantity: i64,
    pub order_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_qty: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lmt_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailing_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trail_stop_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tif: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub good_after_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub good_till_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outside_rth: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmit: Option<bool>,
    /// Bracket child link to the anchor order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Identifier>,
    /// One-cancels-all group name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oca_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oca_type: Option<i32>,
}

/// Filter applied to an executions request. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acct_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sec_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
}
