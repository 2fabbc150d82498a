//! Account, position and reference-data reads. All run on pooled slots.

use ibr_correlation::{
    AccountSummaryEntry, AccountUpdateEntry, ContractDetailsEntry, EntryKey, ExecutionsEntry,
    PositionsEntry,
};
use ibr_pool::LeaseKind;
use ibr_schemas::args::ContractArgs;
use ibr_schemas::{ExecutionFilter, GatewayRequest};
use tracing::info;

use crate::{Check, Gateway, GatewayError, Outcome, WaitPlan};

/// Tags accepted by an account-summary request.
pub const ACCOUNT_SUMMARY_TAGS: &[&str] = &[
    "AccountType",
    "NetLiquidation",
    "TotalCashValue",
    "SettledCash",
    "AccruedCash",
    "BuyingPower",
    "EquityWithLoanValue",
    "PreviousDayEquityWithLoanValue",
    "GrossPositionValue",
    "RegTEquity",
    "RegTMargin",
    "SMA",
    "InitMarginReq",
    "MaintMarginReq",
    "AvailableFunds",
    "ExcessLiquidity",
    "Cushion",
    "FullInitMarginReq",
    "FullMaintMarginReq",
    "FullAvailableFunds",
    "FullExcessLiquidity",
    "LookAheadNextChange",
    "LookAheadInitMarginReq",
    "LookAheadMaintMarginReq",
    "LookAheadAvailableFunds",
    "LookAheadExcessLiquidity",
    "HighestSeverity",
    "DayTradesRemaining",
    "Leverage",
];

impl Gateway {
    pub async fn get_positions(&self) -> Result<Outcome<PositionsEntry>, GatewayError> {
        let lease = self.lease(LeaseKind::Feed).await?;
        let session = lease.session();
        let slot = lease.slot();

        let mut reg = self.register(session, EntryKey::Positions);
        session.send(GatewayRequest::ReqPositions)?;
        reg.cancel_with(GatewayRequest::CancelPositions);
        let waited = self
            .wait(
                session,
                WaitPlan::new("positions", self.settings.timeout_iterations),
                |st| match st.positions.get(&slot) {
                    Some(e) if e.position_end => Check::Done,
                    _ => Check::Pending,
                },
            )
            .await;

        let entry = self.store.take_positions(slot);
        drop(reg);
        Ok(Outcome::new(waited?, entry))
    }

    /// Summary values for `tags` across all accounts, nested account → tag.
    pub async fn get_account_summary(
        &self,
        tags: &[String],
    ) -> Result<Outcome<AccountSummaryEntry>, GatewayError> {
        if tags.is_empty() {
            return Err(GatewayError::Validation(
                "at least one account summary tag is required".to_string(),
            ));
        }
        if let Some(bad) = tags
            .iter()
            .find(|t| !ACCOUNT_SUMMARY_TAGS.contains(&t.as_str()))
        {
            return Err(GatewayError::Validation(format!(
                "unknown account summary tag {bad:?}"
            )));
        }

        let lease = self.lease(LeaseKind::Feed).await?;
        let session = lease.session();
        let req_id = self.ids.next_request_id();
        info!(slot = lease.slot(), req_id, tags = tags.len(), "account summary requested");

        let mut reg = self.register(session, EntryKey::AccountSummary(req_id));
        let request = GatewayRequest::ReqAccountSummary {
            req_id,
            group: "All".to_string(),
            tags: tags.join(","),
        };
        session.send(request)?;
        reg.cancel_with(GatewayRequest::CancelAccountSummary { req_id });
        let slot = reg.slot();
        let waited = self
            .wait(
                session,
                WaitPlan::new("account_summary", self.settings.timeout_iterations),
                |st| {
                    if let Some(err) = st.error_for(slot, req_id) {
                        return Check::Failed(GatewayError::Protocol(err.clone()));
                    }
                    match st.account_summary.get(&req_id) {
                        Some(e) if e.account_summary_end => Check::Done,
                        _ => Check::Pending,
                    }
                },
            )
            .await;

        let entry = self.store.take_account_summary(req_id);
        drop(reg);
        Ok(Outcome::new(waited?, entry))
    }

    /// Account values and portfolio for `acct_code` until the download ends.
    pub async fn get_account_update(
        &self,
        acct_code: &str,
    ) -> Result<Outcome<AccountUpdateEntry>, GatewayError> {
        if acct_code.trim().is_empty() {
            return Err(GatewayError::Validation("acctCode is required".to_string()));
        }
        let lease = self.lease(LeaseKind::Feed).await?;
        let session = lease.session();
        let slot = lease.slot();
        info!(slot, acct_code, "account update requested");

        let mut reg = self.register(session, EntryKey::AccountUpdate);
        session.send(GatewayRequest::ReqAccountUpdates {
            subscribe: true,
            acct_code: acct_code.to_string(),
        })?;
        reg.cancel_with(GatewayRequest::ReqAccountUpdates {
            subscribe: false,
            acct_code: acct_code.to_string(),
        });
        let waited = self
            .wait(
                session,
                WaitPlan::new("account_update", self.settings.timeout_iterations),
                |st| match st.account_update.get(&slot) {
                    Some(e) if e.account_download_end => Check::Done,
                    _ => Check::Pending,
                },
            )
            .await;

        let entry = self.store.take_account_update(slot);
        drop(reg);
        Ok(Outcome::new(waited?, entry))
    }

    pub async fn get_contract_details(
        &self,
        symbol: &str,
        contract: &ContractArgs,
    ) -> Result<Outcome<ContractDetailsEntry>, GatewayError> {
        contract.validate()?;
        let lease = self.lease(LeaseKind::Feed).await?;
        let session = lease.session();
        let slot = lease.slot();
        let req_id = self.ids.next_request_id();

        let _reg = self.register(session, EntryKey::ContractDetails(req_id));
        session.send(GatewayRequest::ReqContractDetails {
            req_id,
            contract: contract.to_contract(symbol),
        })?;
        let waited = self
            .wait(
                session,
                WaitPlan::new("contract_details", self.settings.timeout_iterations),
                |st| {
                    if let Some(err) = st.error_for(slot, req_id) {
                        return Check::Failed(GatewayError::Protocol(err.clone()));
                    }
                    match st.contract_details.get(&(slot, req_id)) {
                        Some(e) if e.contract_details_end => Check::Done,
                        _ => Check::Pending,
                    }
                },
            )
            .await;

        let entry = self.store.take_contract_details(slot, req_id);
        Ok(Outcome::new(waited?, entry))
    }

    /// Executions matching `filter`. An unset client id means the reserved
    /// slot's, where orders are placed.
    pub async fn get_executions(
        &self,
        mut filter: ExecutionFilter,
    ) -> Result<Outcome<ExecutionsEntry>, GatewayError> {
        if filter.client_id.is_none() {
            filter.client_id = Some(self.reserved_client_id());
        }
        let lease = self.lease(LeaseKind::Feed).await?;
        let session = lease.session();
        let slot = lease.slot();
        let req_id = self.ids.next_request_id();

        let _reg = self.register(session, EntryKey::Executions(req_id));
        session.send(GatewayRequest::ReqExecutions { req_id, filter })?;
        let iterations = (self.settings.timeout_iterations / 2).max(1);
        let waited = self
            .wait(session, WaitPlan::new("executions", iterations), |st| {
                if let Some(err) = st.error_for(slot, req_id) {
                    return Check::Failed(GatewayError::Protocol(err.clone()));
                }
                match st.executions.get(&(slot, req_id)) {
                    Some(e) if e.exec_details_end => Check::Done,
                    _ => Check::Pending,
                }
            })
            .await;

        let entry = self.store.take_executions(slot, req_id);
        Ok(Outcome::new(waited?, entry))
    }
}
