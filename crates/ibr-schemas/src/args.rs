//! Explicit field tables for user-supplied request arguments.
//!
//! Each table lists exactly the attributes a caller may set for one request
//! kind. Contracts start from [`Contract::stock`] defaults and every present
//! field overrides the default; nothing is copied by name at runtime.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ComboLeg, Contract, Identifier, Order};

pub const SEC_TYPES: &[&str] = &["STK", "OPT", "FUT", "IND", "FOP", "CASH", "BAG", "NEWS"];

pub const ORDER_TYPES: &[&str] = &[
    "LMT", "MTL", "MKT PRT", "QUOTE", "STP", "STP LMT", "TRAIL LIT", "TRAIL MIT", "TRAIL",
    "TRAIL LIMIT", "MKT", "MIT", "MOC", "MOO", "PEG MKT", "REL", "BOX TOP", "LOC", "LOO", "LIT",
    "PEG MID", "VWAP", "GAT", "GTD", "GTC", "IOC", "OCA", "VOL",
];

pub const ACTIONS: &[&str] = &["BUY", "SELL", "SSHORT"];

pub const TIFS: &[&str] = &["DAY", "DAT", "GTC", "IOC", "GTD"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgsError {
    #[error("missing required field `{0}`")]
    Missing(&'static str),
    #[error("invalid `{field}`={value:?}; expected one of {allowed:?}")]
    NotAllowed {
        field: &'static str,
        value: String,
        allowed: &'static [&'static str],
    },
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn check_choice(
    field: &'static str,
    value: Option<&str>,
    allowed: &'static [&'static str],
) -> Result<(), ArgsError> {
    match value {
        Some(v) if !allowed.contains(&v) => Err(ArgsError::NotAllowed {
            field,
            value: v.to_string(),
            allowed,
        }),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// ContractArgs
// ---------------------------------------------------------------------------

/// Contract fields accepted by history, market-data and contract lookups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArgs {
    pub sec_type: Option<String>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
    pub primary_exch: Option<String>,
    pub local_symbol: Option<String>,
    pub expiry: Option<String>,
    pub strike: Option<f64>,
    pub right: Option<String>,
    pub multiplier: Option<String>,
    pub con_id: Option<i64>,
}

impl ContractArgs {
    pub fn validate(&self) -> Result<(), ArgsError> {
        check_choice("secType", self.sec_type.as_deref(), SEC_TYPES)
    }

    pub fn to_contract(&self, symbol: &str) -> Contract {
        let mut c = Contract::stock(symbol);
        if let Some(v) = &self.sec_type {
            c.sec_type = v.clone();
        }
        if let Some(v) = &self.exchange {
            c.exchange = v.clone();
        }
        if let Some(v) = &self.currency {
            c.currency = v.clone();
        }
        c.primary_exch = self.primary_exch.clone();
        c.local_symbol = self.local_symbol.clone();
        c.expiry = self.expiry.clone();
        c.strike = self.strike;
        c.right = self.right.clone();
        c.multiplier = self.multiplier.clone();
        c.con_id = self.con_id;
        c
    }
}

// ---------------------------------------------------------------------------
// ComboLegArgs
// ---------------------------------------------------------------------------

/// One leg of a multi-leg order, before its `conId` has been resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComboLegArgs {
    pub symbol: String,
    #[serde(default)]
    pub sec_type: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(default)]
    pub strike: Option<f64>,
    #[serde(default)]
    pub right: Option<String>,
    #[serde(default)]
    pub multiplier: Option<String>,
    #[serde(default = "default_ratio")]
    pub ratio: i32,
    pub action: String,
}

fn default_ratio() -> i32 {
    1
}

impl ComboLegArgs {
    pub fn validate(&self) -> Result<(), ArgsError> {
        check_choice("comboLegs.action", Some(self.action.as_str()), ACTIONS)?;
        check_choice("comboLegs.secType", self.sec_type.as_deref(), SEC_TYPES)?;
        if self.ratio <= 0 {
            return Err(ArgsError::Invalid {
                field: "comboLegs.ratio",
                reason: format!("must be positive, got {}", self.ratio),
            });
        }
        Ok(())
    }

    /// Contract used to look up this leg's exchange-assigned `conId`.
    pub fn lookup_contract(&self) -> Contract {
        let mut c = Contract::stock(self.symbol.clone());
        if let Some(v) = &self.sec_type {
            c.sec_type = v.clone();
        }
        if let Some(v) = &self.exchange {
            c.exchange = v.clone();
        }
        if let Some(v) = &self.currency {
            c.currency = v.clone();
        }
        c.expiry = self.expiry.clone();
        c.strike = self.strike;
        c.right = self.right.clone();
        c.multiplier = self.multiplier.clone();
        c
    }

    pub fn to_leg(&self, con_id: i64) -> ComboLeg {
        ComboLeg {
            con_id,
            ratio: self.ratio,
            action: self.action.clone(),
            exchange: self
                .exchange
                .clone()
                .unwrap_or_else(|| "SMART".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// OrderArgs
// ---------------------------------------------------------------------------

/// One item of a place-order request: contract fields plus order fields.
///
/// `order_id` absent means a new order; present means modify that order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderArgs {
    // contract
    pub symbol: Option<String>,
    pub sec_type: Option<String>,
    pub exchange: Option<String>,
    pub primary_exch: Option<String>,
    pub currency: Option<String>,
    pub local_symbol: Option<String>,
    pub expiry: Option<String>,
    pub strike: Option<f64>,
    pub right: Option<String>,
    pub multiplier: Option<String>,
    pub con_id: Option<i64>,
    #[serde(default)]
    pub combo_legs: Vec<ComboLegArgs>,

    // order
    pub order_id: Option<Identifier>,
    pub action: Option<String>,
    pub total_quantity: Option<i64>,
    pub min_qty: Option<i64>,
    pub order_type: Option<String>,
    pub lmt_price: Option<f64>,
    pub aux_price: Option<f64>,
    pub trailing_percent: Option<f64>,
    pub trail_stop_price: Option<f64>,
    pub tif: Option<String>,
    pub good_after_time: Option<String>,
    pub good_till_date: Option<String>,
    pub outside_rth: Option<bool>,
    pub account: Option<String>,
    pub transmit: Option<bool>,
}

impl OrderArgs {
    pub fn validate(&self) -> Result<(), ArgsError> {
        if self.symbol.as_deref().map_or(true, str::is_empty) {
            return Err(ArgsError::Missing("symbol"));
        }
        match self.total_quantity {
            None => return Err(ArgsError::Missing("totalQuantity")),
            Some(q) if q <= 0 => {
                return Err(ArgsError::Invalid {
                    field: "totalQuantity",
                    reason: format!("must be positive, got {q}"),
                })
            }
            Some(_) => {}
        }
        let action = self.action.as_deref().ok_or(ArgsError::Missing("action"))?;
        check_choice("action", Some(action), ACTIONS)?;
        let order_type = self
            .order_type
            .as_deref()
            .ok_or(ArgsError::Missing("orderType"))?;
        check_choice("orderType", Some(order_type), ORDER_TYPES)?;
        check_choice("tif", self.tif.as_deref(), TIFS)?;
        check_choice("secType", self.sec_type.as_deref(), SEC_TYPES)?;

        if self.sec_type.as_deref() == Some("BAG") && self.combo_legs.is_empty() {
            return Err(ArgsError::Missing("comboLegs"));
        }
        for leg in &self.combo_legs {
            leg.validate()?;
        }
        Ok(())
    }

    /// Orders carrying a future activation time are not waited on.
    pub fn has_deferred_activation(&self) -> bool {
        self.good_after_time.is_some()
    }

    /// Contract for this item, without combo legs (those need resolving).
    pub fn to_contract(&self) -> Contract {
        let mut c = Contract::stock(self.symbol.clone().unwrap_or_default());
        if let Some(v) = &self.sec_type {
            c.sec_type = v.clone();
        }
        if let Some(v) = &self.exchange {
            c.exchange = v.clone();
        }
        if let Some(v) = &self.currency {
            c.currency = v.clone();
        }
        c.primary_exch = self.primary_exch.clone();
        c.local_symbol = self.local_symbol.clone();
        c.expiry = self.expiry.clone();
        c.strike = self.strike;
        c.right = self.right.clone();
        c.multiplier = self.multiplier.clone();
        c.con_id = self.con_id;
        c
    }

    pub fn to_order(&self, client_id: i32) -> Order {
        Order {
            client_id,
            action: self.action.clone().unwrap_or_default(),
            total_quantity: self.total_quantity.unwrap_or_default(),
            order_type: self.order_type.clone().unwrap_or_default(),
            min_qty: self.min_qty,
            lmt_price: self.lmt_price,
            aux_price: self.aux_price,
            trailing_percent: self.trailing_percent,
            trail_stop_price: self.trail_stop_price,
            tif: self.tif.clone(),
            good_after_time: self.good_after_time.clone(),
            good_till_date: self.good_till_date.clone(),
            outside_rth: self.outside_rth,
            account: self.account.clone(),
            transmit: self.transmit,
            parent_id: None,
            oca_group: None,
            oca_type: None,
        }
    }
}
