//! Correlation entries and the store that guards them.
//!
//! Every mutation happens under one mutex and is followed by a wake-up of
//! all waiters, so a waiter that registered its entry before sending its
//! request can never miss an event written afterwards.

use std::collections::{BTreeMap, HashMap, HashSet};

use ibr_schemas::{
    AccountValueRecord, BarRecord, CommissionReportRecord, Contract, ContractDetailsRecord,
    ErrorRecord, ExecutionRecord, Identifier, OpenOrderRecord, OrderStatusRecord,
    PortfolioRecord, PositionRecord, SlotId, TickSample, CONNECTION_ERROR_ID,
};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEnd {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Bars keyed by their reported date, so arrival order does not matter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub bars: BTreeMap<String, BarRecord>,
    pub finished: Option<HistoryEnd>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrdersEntry {
    pub open_orders: Vec<OpenOrderRecord>,
    pub order_statuses: Vec<OrderStatusRecord>,
    pub open_order_end: bool,
}

/// Latest open-order and status record for one order id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEntry {
    pub open_order: Option<OpenOrderRecord>,
    pub order_status: Option<OrderStatusRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsEntry {
    pub positions: Vec<PositionRecord>,
    pub position_end: bool,
}

/// `account -> tag -> value`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummaryEntry {
    pub accounts: BTreeMap<String, BTreeMap<String, String>>,
    pub account_summary_end: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdateEntry {
    pub update_account_time: Option<String>,
    /// Keyed by value key, last write wins.
    pub update_account_value: BTreeMap<String, AccountValueRecord>,
    pub update_portfolio: Vec<PortfolioRecord>,
    pub account_download_end: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDetailsEntry {
    pub contract_details: Vec<ContractDetailsRecord>,
    pub contract_details_end: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDetail {
    pub contract: Contract,
    pub execution: ExecutionRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionsEntry {
    pub exec_details: Vec<ExecutionDetail>,
    /// Keyed by execution id.
    pub commission_report: BTreeMap<String, CommissionReportRecord>,
    pub exec_details_end: bool,
}

impl ExecutionsEntry {
    pub fn holds_execution(&self, exec_id: &str) -> bool {
        self.exec_details
            .iter()
            .any(|d| d.execution.exec_id == exec_id)
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Names one registered request: which entry it owns and which ids its
/// errors arrive under. Slot-keyed kinds take the slot from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKey {
    History(Identifier),
    Market(Identifier),
    OpenOrders,
    Orders(Vec<Identifier>),
    Positions,
    AccountSummary(Identifier),
    AccountUpdate,
    ContractDetails(Identifier),
    Executions(Identifier),
}

impl EntryKey {
    /// Ids whose gateway errors belong to this request.
    pub fn error_ids(&self) -> &[Identifier] {
        match self {
            EntryKey::History(id)
            | EntryKey::Market(id)
            | EntryKey::AccountSummary(id)
            | EntryKey::ContractDetails(id)
            | EntryKey::Executions(id) => std::slice::from_ref(id),
            EntryKey::Orders(ids) => ids,
            EntryKey::OpenOrders | EntryKey::Positions | EntryKey::AccountUpdate => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Everything the router may write into. Only registered entries accept
/// writes. Errors are kept only for `(slot, id)` pairs a registered request
/// is watching, plus the latest connection-level error per slot.
#[derive(Debug, Default)]
pub struct StoreState {
    pub history: HashMap<Identifier, HistoryEntry>,
    pub market: HashMap<Identifier, Vec<TickSample>>,
    pub open_orders: HashMap<SlotId, OpenOrdersEntry>,
    pub orders: HashMap<Identifier, OrderEntry>,
    pub positions: HashMap<SlotId, PositionsEntry>,
    pub account_summary: HashMap<Identifier, AccountSummaryEntry>,
    pub account_update: HashMap<SlotId, AccountUpdateEntry>,
    pub contract_details: HashMap<(SlotId, Identifier), ContractDetailsEntry>,
    pub executions: HashMap<(SlotId, Identifier), ExecutionsEntry>,
    pub errors: HashMap<(SlotId, Identifier), ErrorRecord>,
    pub watched: HashSet<(SlotId, Identifier)>,
    pub managed_accounts: Vec<String>,
}

impl StoreState {
    pub fn error_for(&self, slot: SlotId, id: Identifier) -> Option<&ErrorRecord> {
        self.errors.get(&(slot, id))
    }

    /// Record `err` if a live request on `slot` watches its id, or if it is
    /// a connection-level error. Returns whether it was kept.
    pub fn record_error(&mut self, slot: SlotId, err: &ErrorRecord) -> bool {
        let key = (slot, err.id);
        if err.id != CONNECTION_ERROR_ID && !self.watched.contains(&key) {
            return false;
        }
        self.errors.insert(key, err.clone());
        true
    }
}

#[derive(Debug, Default)]
pub struct CorrelationStore {
    state: Mutex<StoreState>,
    changed: Notify,
}

impl CorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a snapshot under the store lock.
    pub fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        f(&self.state.lock())
    }

    /// Mutate under the store lock and wake every waiter.
    pub fn write<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let out = f(&mut self.state.lock());
        self.changed.notify_waiters();
        out
    }

    /// Wake-up source for waiters. Enable the `notified()` future before
    /// checking state to avoid missing a write.
    pub fn changed(&self) -> &Notify {
        &self.changed
    }

    // -- registration (reset) ------------------------------------------------

    /// Register a fresh entry for `key` on `slot`, clear stale errors for
    /// its ids and start watching them.
    pub fn begin(&self, slot: SlotId, key: &EntryKey) {
        let mut st = self.state.lock();
        for id in key.error_ids() {
            st.errors.remove(&(slot, *id));
            st.watched.insert((slot, *id));
        }
        match key {
            EntryKey::History(id) => {
                st.history.insert(*id, HistoryEntry::default());
            }
            EntryKey::Market(id) => {
                st.market.insert(*id, Vec::new());
            }
            EntryKey::OpenOrders => {
                st.open_orders.insert(slot, OpenOrdersEntry::default());
            }
            EntryKey::Orders(ids) => {
                for id in ids {
                    st.orders.insert(*id, OrderEntry::default());
                }
            }
            EntryKey::Positions => {
                st.positions.insert(slot, PositionsEntry::default());
            }
            EntryKey::AccountSummary(id) => {
                st.account_summary.insert(*id, AccountSummaryEntry::default());
            }
            EntryKey::AccountUpdate => {
                st.account_update.insert(slot, AccountUpdateEntry::default());
            }
            EntryKey::ContractDetails(id) => {
                st.contract_details
                    .insert((slot, *id), ContractDetailsEntry::default());
            }
            EntryKey::Executions(id) => {
                st.executions.insert((slot, *id), ExecutionsEntry::default());
            }
        }
    }

    /// Drop whatever is left of `key` on `slot`: the entry, its errors and
    /// the watch on its ids. Errors arriving afterwards are not kept.
    pub fn discard(&self, slot: SlotId, key: &EntryKey) {
        let mut st = self.state.lock();
        for id in key.error_ids() {
            st.errors.remove(&(slot, *id));
            st.watched.remove(&(slot, *id));
        }
        match key {
            EntryKey::History(id) => {
                st.history.remove(id);
            }
            EntryKey::Market(id) => {
                st.market.remove(id);
            }
            EntryKey::OpenOrders => {
                st.open_orders.remove(&slot);
            }
            EntryKey::Orders(ids) => {
                for id in ids {
                    st.orders.remove(id);
                }
            }
            EntryKey::Positions => {
                st.positions.remove(&slot);
            }
            EntryKey::AccountSummary(id) => {
                st.account_summary.remove(id);
            }
            EntryKey::AccountUpdate => {
                st.account_update.remove(&slot);
            }
            EntryKey::ContractDetails(id) => {
                st.contract_details.remove(&(slot, *id));
            }
            EntryKey::Executions(id) => {
                st.executions.remove(&(slot, *id));
            }
        }
    }

    // -- consumption (pop) ---------------------------------------------------

    pub fn take_history(&self, req_id: Identifier) -> HistoryEntry {
        self.state.lock().history.remove(&req_id).unwrap_or_default()
    }

    pub fn take_market(&self, ticker_id: Identifier) -> Vec<TickSample> {
        self.state.lock().market.remove(&ticker_id).unwrap_or_default()
    }

    pub fn take_open_orders(&self, slot: SlotId) -> OpenOrdersEntry {
        self.state.lock().open_orders.remove(&slot).unwrap_or_default()
    }

    pub fn take_order(&self, order_id: Identifier) -> OrderEntry {
        self.state.lock().orders.remove(&order_id).unwrap_or_default()
    }

    pub fn take_positions(&self, slot: SlotId) -> PositionsEntry {
        self.state.lock().positions.remove(&slot).unwrap_or_default()
    }

    pub fn take_account_summary(&self, req_id: Identifier) -> AccountSummaryEntry {
        self.state
            .lock()
            .account_summary
            .remove(&req_id)
            .unwrap_or_default()
    }

    pub fn take_account_update(&self, slot: SlotId) -> AccountUpdateEntry {
        self.state
            .lock()
            .account_update
            .remove(&slot)
            .unwrap_or_default()
    }

    pub fn take_contract_details(&self, slot: SlotId, req_id: Identifier) -> ContractDetailsEntry {
        self.state
            .lock()
            .contract_details
            .remove(&(slot, req_id))
            .unwrap_or_default()
    }

    pub fn take_executions(&self, slot: SlotId, req_id: Identifier) -> ExecutionsEntry {
        self.state
            .lock()
            .executions
            .remove(&(slot, req_id))
            .unwrap_or_default()
    }

    pub fn error(&self, slot: SlotId, id: Identifier) -> Option<ErrorRecord> {
        self.state.lock().errors.get(&(slot, id)).cloned()
    }

    pub fn managed_accounts(&self) -> Vec<String> {
        self.state.lock().managed_accounts.clone()
    }
}
