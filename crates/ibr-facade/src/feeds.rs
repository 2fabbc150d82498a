//! Subscription-style market feeds: historical bars and tick snapshots.

use ibr_correlation::{EntryKey, HistoryEntry};
use ibr_pool::LeaseKind;
use ibr_schemas::args::ContractArgs;
use ibr_schemas::{GatewayRequest, HistoryRequest, TickSample};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Check, Gateway, GatewayError, Outcome, WaitPlan};

/// Historical-data query fields; any left unset take the gateway defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    pub end_date_time: Option<String>,
    pub duration_str: Option<String>,
    pub bar_size_setting: Option<String>,
    pub what_to_show: Option<String>,
    #[serde(rename = "useRTH")]
    pub use_rth: Option<i32>,
    pub format_date: Option<i32>,
}

impl HistoryParams {
    fn into_request(self, req_id: i64, contract: ibr_schemas::Contract) -> HistoryRequest {
        HistoryRequest {
            req_id,
            contract,
            end_date_time: self
                .end_date_time
                .unwrap_or_else(|| chrono::Local::now().format("%Y%m%d %H:%M:%S").to_string()),
            duration_str: self.duration_str.unwrap_or_else(|| "1 D".to_string()),
            bar_size_setting: self.bar_size_setting.unwrap_or_else(|| "1 min".to_string()),
            what_to_show: self.what_to_show.unwrap_or_else(|| "TRADES".to_string()),
            use_rth: self.use_rth.unwrap_or(0),
            format_date: self.format_date.unwrap_or(2),
        }
    }
}

impl Gateway {
    /// Bars for `symbol` keyed by date, until the end marker arrives.
    pub async fn get_history(
        &self,
        symbol: &str,
        contract: &ContractArgs,
        params: HistoryParams,
    ) -> Result<Outcome<HistoryEntry>, GatewayError> {
        contract.validate()?;
        let lease = self.lease(LeaseKind::Feed).await?;
        let session = lease.session();
        let req_id = self.ids.next_request_id();
        let request = params.into_request(req_id, contract.to_contract(symbol));
        info!(slot = lease.slot(), req_id, symbol, "history requested");

        let mut reg = self.register(session, EntryKey::History(req_id));
        session.send(GatewayRequest::ReqHistoricalData(request))?;
        reg.cancel_with(GatewayRequest::CancelHistoricalData { req_id });
        let slot = reg.slot();

        let waited = self
            .wait(
                session,
                WaitPlan::new("history", self.settings.timeout_iterations),
                |st| {
                    if let Some(err) = st.error_for(slot, req_id) {
                        return Check::Failed(GatewayError::Protocol(err.clone()));
                    }
                    match st.history.get(&req_id) {
                        Some(e) if e.finished.is_some() => Check::Done,
                        _ => Check::Pending,
                    }
                },
            )
            .await;

        let entry = self.store.take_history(req_id);
        drop(reg);
        Ok(Outcome::new(waited?, entry))
    }

    /// Tick samples for `symbol` until enough have arrived or the session
    /// drops, whichever is first.
    pub async fn get_market_data(
        &self,
        symbol: &str,
        contract: &ContractArgs,
    ) -> Result<Outcome<Vec<TickSample>>, GatewayError> {
        contract.validate()?;
        let lease = self.lease(LeaseKind::Feed).await?;
        let session = lease.session();
        let ticker_id = self.ids.next_request_id();
        let min_samples = self.settings.min_market_samples;
        info!(slot = lease.slot(), ticker_id, symbol, "market data requested");

        let mut reg = self.register(session, EntryKey::Market(ticker_id));
        let request = GatewayRequest::ReqMktData {
            ticker_id,
            contract: contract.to_contract(symbol),
            generic_tick_list: String::new(),
            snapshot: false,
        };
        session.send(request)?;
        reg.cancel_with(GatewayRequest::CancelMktData { ticker_id });
        let slot = reg.slot();

        let waited = self
            .wait(
                session,
                WaitPlan::new("market_data", self.settings.timeout_iterations)
                    .finish_on_disconnect(),
                |st| {
                    if let Some(err) = st.error_for(slot, ticker_id) {
                        return Check::Failed(GatewayError::Protocol(err.clone()));
                    }
                    match st.market.get(&ticker_id) {
                        Some(ticks) if ticks.len() >= min_samples => Check::Done,
                        _ => Check::Pending,
                    }
                },
            )
            .await;

        let ticks = self.store.take_market(ticker_id);
        drop(reg);
        Ok(Outcome::new(waited?, ticks))
    }
}
