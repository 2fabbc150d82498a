use std::sync::Arc;

use ibr_schemas::{GatewayEvent, PersistRecord, SlotId, TickSample};
use ibr_session::Handler;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, trace, warn};

use crate::store::{ExecutionDetail, HistoryEnd, StoreState};
use crate::{CorrelationStore, IdAllocator};

/// Writes each decoded event into the correlation entry it belongs to.
///
/// Streams keyed by an identifier (history, ticks, account summary, contract
/// details, executions) land in the entry for that id. Streams the gateway
/// sends without an id (open orders, positions, account updates) land in the
/// entry for the slot they arrived on. Unregistered entries are left alone,
/// and an error is kept only while a live request on its slot watches its id.
pub struct EventRouter {
    store: Arc<CorrelationStore>,
    ids: Arc<IdAllocator>,
    persist: Option<UnboundedSender<PersistRecord>>,
}

impl EventRouter {
    pub fn new(
        store: Arc<CorrelationStore>,
        ids: Arc<IdAllocator>,
        persist: Option<UnboundedSender<PersistRecord>>,
    ) -> Self {
        Self {
            store,
            ids,
            persist,
        }
    }

    /// Session handler that forwards to [`EventRouter::dispatch`].
    pub fn handler(self: &Arc<Self>) -> Handler {
        let router = self.clone();
        Arc::new(move |slot: SlotId, event: &GatewayEvent| router.dispatch(slot, event))
    }

    pub fn dispatch(&self, slot: SlotId, event: &GatewayEvent) {
        trace!(slot, kind = ?event.kind(), id = ?event.id(), "event");
        match event {
            GatewayEvent::NextValidId { order_id } => {
                self.ids.observe_next_valid_id(*order_id);
                info!(slot, order_id, "next valid order id");
                self.store.write(|_| ());
            }
            GatewayEvent::ManagedAccounts { accounts_list } => {
                let accounts: Vec<String> = accounts_list
                    .split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(str::to_string)
                    .collect();
                debug!(slot, ?accounts, "managed accounts");
                self.store.write(|st| st.managed_accounts = accounts);
            }
            GatewayEvent::OrderStatus(status) if status.is_filled() => {
                self.persist(PersistRecord::FilledOrder(status.clone()));
                self.store.write(|st| apply(st, slot, event));
            }
            GatewayEvent::CommissionReport(report) => {
                self.persist(PersistRecord::Commission(report.clone()));
                self.store.write(|st| apply(st, slot, event));
            }
            GatewayEvent::Error(err) => {
                warn!(
                    slot,
                    id = err.id,
                    code = ?err.error_code,
                    msg = %err.error_msg,
                    "gateway error"
                );
                if !self.store.write(|st| st.record_error(slot, err)) {
                    debug!(slot, id = err.id, "no live request for error; not kept");
                }
            }
            _ => self.store.write(|st| apply(st, slot, event)),
        }
    }

    fn persist(&self, record: PersistRecord) {
        let Some(tx) = &self.persist else {
            return;
        };
        if tx.send(record).is_err() {
            warn!("persistence writer is gone; record dropped");
        }
    }
}

fn apply(st: &mut StoreState, slot: SlotId, event: &GatewayEvent) {
    match event {
        GatewayEvent::NextValidId { .. } | GatewayEvent::ManagedAccounts { .. } => {}

        GatewayEvent::HistoricalData { req_id, bar } => {
            if let Some(e) = st.history.get_mut(req_id) {
                e.bars.insert(bar.date.clone(), bar.clone());
            }
        }
        GatewayEvent::HistoricalDataEnd { req_id, start, end } => {
            if let Some(e) = st.history.get_mut(req_id) {
                e.finished = Some(HistoryEnd {
                    start: start.clone(),
                    end: end.clone(),
                });
            }
        }

        GatewayEvent::OpenOrder(rec) => {
            if let Some(e) = st.open_orders.get_mut(&slot) {
                e.open_orders.push(rec.clone());
            }
            if let Some(e) = st.orders.get_mut(&rec.order_id) {
                e.open_order = Some(rec.clone());
            }
        }
        GatewayEvent::OrderStatus(rec) => {
            if let Some(e) = st.open_orders.get_mut(&slot) {
                e.order_statuses.push(rec.clone());
            }
            if let Some(e) = st.orders.get_mut(&rec.order_id) {
                e.order_status = Some(rec.clone());
            }
        }
        GatewayEvent::OpenOrderEnd => {
            if let Some(e) = st.open_orders.get_mut(&slot) {
                e.open_order_end = true;
            }
        }

        GatewayEvent::Position(rec) => {
            if let Some(e) = st.positions.get_mut(&slot) {
                e.positions.push(rec.clone());
            }
        }
        GatewayEvent::PositionEnd => {
            if let Some(e) = st.positions.get_mut(&slot) {
                e.position_end = true;
            }
        }

        GatewayEvent::AccountSummary { req_id, record } => {
            if let Some(e) = st.account_summary.get_mut(req_id) {
                e.accounts
                    .entry(record.account.clone())
                    .or_default()
                    .insert(record.tag.clone(), record.value.clone());
            }
        }
        GatewayEvent::AccountSummaryEnd { req_id } => {
            if let Some(e) = st.account_summary.get_mut(req_id) {
                e.account_summary_end = true;
            }
        }

        GatewayEvent::UpdateAccountTime { time_stamp } => {
            if let Some(e) = st.account_update.get_mut(&slot) {
                e.update_account_time = Some(time_stamp.clone());
            }
        }
        GatewayEvent::UpdateAccountValue(rec) => {
            if let Some(e) = st.account_update.get_mut(&slot) {
                e.update_account_value.insert(rec.key.clone(), rec.clone());
            }
        }
        GatewayEvent::UpdatePortfolio(rec) => {
            if let Some(e) = st.account_update.get_mut(&slot) {
                e.update_portfolio.push(rec.clone());
            }
        }
        GatewayEvent::AccountDownloadEnd { .. } => {
            if let Some(e) = st.account_update.get_mut(&slot) {
                e.account_download_end = true;
            }
        }

        GatewayEvent::ContractDetails { req_id, details } => {
            if let Some(e) = st.contract_details.get_mut(&(slot, *req_id)) {
                e.contract_details.push(details.clone());
            }
        }
        GatewayEvent::ContractDetailsEnd { req_id } => {
            if let Some(e) = st.contract_details.get_mut(&(slot, *req_id)) {
                e.contract_details_end = true;
            }
        }

        GatewayEvent::ExecDetails {
            req_id,
            contract,
            execution,
        } => {
            if let Some(e) = st.executions.get_mut(&(slot, *req_id)) {
                e.exec_details.push(ExecutionDetail {
                    contract: contract.clone(),
                    execution: execution.clone(),
                });
            }
        }
        GatewayEvent::ExecDetailsEnd { req_id } => {
            if let Some(e) = st.executions.get_mut(&(slot, *req_id)) {
                e.exec_details_end = true;
            }
        }
        GatewayEvent::CommissionReport(rec) => {
            let holder = st
                .executions
                .iter_mut()
                .find(|((s, _), e)| *s == slot && e.holds_execution(&rec.exec_id));
            if let Some((_, e)) = holder {
                e.commission_report.insert(rec.exec_id.clone(), rec.clone());
            }
        }

        GatewayEvent::TickPrice {
            ticker_id,
            field,
            price,
            can_auto_execute,
        } => {
            if let Some(ticks) = st.market.get_mut(ticker_id) {
                ticks.push(TickSample::Price {
                    field: *field,
                    price: *price,
                    can_auto_execute: *can_auto_execute,
                });
            }
        }
        GatewayEvent::TickSize {
            ticker_id,
            field,
            size,
        } => {
            if let Some(ticks) = st.market.get_mut(ticker_id) {
                ticks.push(TickSample::Size {
                    field: *field,
                    size: *size,
                });
            }
        }

        GatewayEvent::Error(err) => {
            st.record_error(slot, err);
        }
    }
}
