//! Decoded gateway callbacks.
//!
//! Every inbound frame is decoded exactly once, at the Session boundary, into
//! one `GatewayEvent` variant with explicit fields. Downstream code matches on
//! the variant; nothing inspects payload shapes at runtime.

use serde::{Deserialize, Serialize};

use crate::records::{
    AccountSummaryRecord, AccountValueRecord, BarRecord, CommissionReportRecord,
    ContractDetailsRecord, ExecutionRecord, OpenOrderRecord, OrderStatusRecord, PortfolioRecord,
    PositionRecord,
};
use crate::{ErrorRecord, Identifier};

/// Marker the gateway puts in the `date` of the bar that terminates a
/// historical-data stream.
const HISTORY_FINISHED_PREFIX: &str = "finished";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum GatewayEvent {
    // connection-ack
    NextValidId {
        order_id: Identifier,
    },
    ManagedAccounts {
        accounts_list: String,
    },

    // history
    HistoricalData {
        req_id: Identifier,
        bar: BarRecord,
    },
    HistoricalDataEnd {
        req_id: Identifier,
        #[serde(default)]
        start: Option<String>,
        #[serde(default)]
        end: Option<String>,
    },

    // orders
    OpenOrder(OpenOrderRecord),
    OrderStatus(OrderStatusRecord),
    OpenOrderEnd,

    // positions
    Position(PositionRecord),
    PositionEnd,

    // account summary
    AccountSummary {
        req_id: Identifier,
        #[serde(flatten)]
        record: AccountSummaryRecord,
    },
    AccountSummaryEnd {
        req_id: Identifier,
    },

    // account updates
    UpdateAccountTime {
        time_stamp: String,
    },
    UpdateAccountValue(AccountValueRecord),
    UpdatePortfolio(PortfolioRecord),
    AccountDownloadEnd {
        account_name: String,
    },

    // contract details
    ContractDetails {
        req_id: Identifier,
        details: ContractDetailsRecord,
    },
    ContractDetailsEnd {
        req_id: Identifier,
    },

    // executions
    ExecDetails {
        req_id: Identifier,
        contract: crate::Contract,
        execution: ExecutionRecord,
    },
    ExecDetailsEnd {
        req_id: Identifier,
    },
    CommissionReport(CommissionReportRecord),

    // market data
    TickPrice {
        ticker_id: Identifier,
        field: i32,
        price: f64,
        #[serde(default)]
        can_auto_execute: bool,
    },
    TickSize {
        ticker_id: Identifier,
        field: i32,
        size: i64,
    },

    Error(ErrorRecord),
}

/// Event kind tag used to key the Session handler registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    NextValidId,
    ManagedAccounts,
    HistoricalData,
    HistoricalDataEnd,
    OpenOrder,
    OrderStatus,
    OpenOrderEnd,
    Position,
    PositionEnd,
    AccountSummary,
    AccountSummaryEnd,
    UpdateAccountTime,
    UpdateAccountValue,
    UpdatePortfolio,
    AccountDownloadEnd,
    ContractDetails,
    ContractDetailsEnd,
    ExecDetails,
    ExecDetailsEnd,
    CommissionReport,
    TickPrice,
    TickSize,
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 23] = [
        EventKind::NextValidId,
        EventKind::ManagedAccounts,
        EventKind::HistoricalData,
        EventKind::HistoricalDataEnd,
        EventKind::OpenOrder,
        EventKind::OrderStatus,
        EventKind::OpenOrderEnd,
        EventKind::Position,
        EventKind::PositionEnd,
        EventKind::AccountSummary,
        EventKind::AccountSummaryEnd,
        EventKind::UpdateAccountTime,
        EventKind::UpdateAccountValue,
        EventKind::UpdatePortfolio,
        EventKind::AccountDownloadEnd,
        EventKind::ContractDetails,
        EventKind::ContractDetailsEnd,
        EventKind::ExecDetails,
        EventKind::ExecDetailsEnd,
        EventKind::CommissionReport,
        EventKind::TickPrice,
        EventKind::TickSize,
        EventKind::Error,
    ];
}

impl GatewayEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GatewayEvent::NextValidId { .. } => EventKind::NextValidId,
            GatewayEvent::ManagedAccounts { .. } => EventKind::ManagedAccounts,
            GatewayEvent::HistoricalData { .. } => EventKind::HistoricalData,
            GatewayEvent::HistoricalDataEnd { .. } => EventKind::HistoricalDataEnd,
            GatewayEvent::OpenOrder(_) => EventKind::OpenOrder,
            GatewayEvent::OrderStatus(_) => EventKind::OrderStatus,
            GatewayEvent::OpenOrderEnd => EventKind::OpenOrderEnd,
            GatewayEvent::Position(_) => EventKind::Position,
            GatewayEvent::PositionEnd => EventKind::PositionEnd,
            GatewayEvent::AccountSummary { .. } => EventKind::AccountSummary,
            GatewayEvent::AccountSummaryEnd { .. } => EventKind::AccountSummaryEnd,
            GatewayEvent::UpdateAccountTime { .. } => EventKind::UpdateAccountTime,
            GatewayEvent::UpdateAccountValue(_) => EventKind::UpdateAccountValue,
            GatewayEvent::UpdatePortfolio(_) => EventKind::UpdatePortfolio,
            GatewayEvent::AccountDownloadEnd { .. } => EventKind::AccountDownloadEnd,
            GatewayEvent::ContractDetails { .. } => EventKind::ContractDetails,
            GatewayEvent::ContractDetailsEnd { .. } => EventKind::ContractDetailsEnd,
            GatewayEvent::ExecDetails { .. } => EventKind::ExecDetails,
            GatewayEvent::ExecDetailsEnd { .. } => EventKind::ExecDetailsEnd,
            GatewayEvent::CommissionReport(_) => EventKind::CommissionReport,
            GatewayEvent::TickPrice { .. } => EventKind::TickPrice,
            GatewayEvent::TickSize { .. } => EventKind::TickSize,
            GatewayEvent::Error(_) => EventKind::Error,
        }
    }

    /// The identifier embedded in the event, if its kind carries one.
    pub fn id(&self) -> Option<Identifier> {
        match self {
            GatewayEvent::NextValidId { order_id } => Some(*order_id),
            GatewayEvent::HistoricalData { req_id, .. }
            | GatewayEvent::HistoricalDataEnd { req_id, .. }
            | GatewayEvent::AccountSummary { req_id, .. }
            | GatewayEvent::AccountSummaryEnd { req_id }
            | GatewayEvent::ContractDetails { req_id, .. }
            | GatewayEvent::ContractDetailsEnd { req_id }
            | GatewayEvent::ExecDetails { req_id, .. }
            | GatewayEvent::ExecDetailsEnd { req_id } => Some(*req_id),
            GatewayEvent::OpenOrder(o) => Some(o.order_id),
            GatewayEvent::OrderStatus(s) => Some(s.order_id),
            GatewayEvent::TickPrice { ticker_id, .. } | GatewayEvent::TickSize { ticker_id, .. } => {
                Some(*ticker_id)
            }
            GatewayEvent::Error(e) => Some(e.id),
            _ => None,
        }
    }

    /// Fold protocol quirks into the explicit variant set.
    ///
    /// The gateway terminates a history stream with a bar dated
    /// `finished-<start>-<end>`; that bar becomes `HistoricalDataEnd`.
    pub fn normalize(self) -> Self {
        match self {
            GatewayEvent::HistoricalData { req_id, bar }
                if bar.date.starts_with(HISTORY_FINISHED_PREFIX) =>
            {
                let mut parts = bar.date.splitn(3, '-').skip(1);
                GatewayEvent::HistoricalDataEnd {
                    req_id,
                    start: parts.next().map(str::to_string),
                    end: parts.next().map(str::to_string),
                }
            }
            other => other,
        }
    }
}
