//! ibr-facade
//!
//! Synchronous Operation Façade.
//!
//! Every operation runs the same skeleton:
//! 1. lease a slot (order ops take the reserved slot, feeds a pooled one)
//! 2. register the correlation entry, clearing any stale error
//! 3. send the request on the leased session
//! 4. wait for the kind-specific completion predicate, waking on every
//!    store write and re-checking connectivity on each poll tick
//! 5. send the matching cancel for subscription feeds, even on timeout
//! 6. pop the entry and release the slot (lease drop)
//!
//! The cancel and the entry cleanup run when the request's registration is
//! dropped, so they also happen when the caller's future is dropped mid-wait.
//!
//! The worst-case wait is `poll × iterations`, the same bound a plain
//! sleep-poll loop would give.

mod account;
mod error;
mod feeds;
mod orders;
mod response;

use std::sync::Arc;
use std::time::Duration;

use ibr_config::TimingConfig;
use ibr_correlation::{CorrelationStore, EntryKey, EventRouter, IdAllocator, StoreState};
use ibr_pool::{LeaseKind, SlotLease, SlotPool, RESERVED_SLOT};
use ibr_schemas::{GatewayRequest, SlotId};
use ibr_session::Session;
use tokio::time::Instant;
use tracing::{debug, warn};

pub use account::ACCOUNT_SUMMARY_TAGS;
pub use error::{GatewayError, CONNECTION_FAULT_ID, POOL_FAULT_ID};
pub use feeds::HistoryParams;
pub use response::{
    CancelResponse, ClientStates, OcaResponse, OrderSummary, Outcome, PlaceOrdersResponse,
    ACCEPTED_STATUSES,
};

#[derive(Debug, Clone, Copy)]
pub struct FacadeSettings {
    pub poll: Duration,
    pub timeout_iterations: u32,
    pub oca_timeout_iterations: u32,
    pub min_market_samples: usize,
    /// Re-send `ReqOpenOrders` every this many ticks while waiting on orders.
    /// 0 disables the refresh.
    pub open_orders_refresh_every: u32,
}

impl FacadeSettings {
    pub fn from_timing(t: &TimingConfig) -> Self {
        Self {
            poll: t.poll_interval(),
            timeout_iterations: t.timeout_iterations,
            oca_timeout_iterations: t.oca_timeout_iterations,
            min_market_samples: t.min_market_samples,
            open_orders_refresh_every: t.open_orders_refresh_every,
        }
    }
}

// ---------------------------------------------------------------------------
// Wait machinery
// ---------------------------------------------------------------------------

/// Result of evaluating a completion predicate against the store.
pub(crate) enum Check {
    Done,
    Pending,
    Failed(GatewayError),
}

/// What a lost connection means for the wait in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnDisconnect {
    Fail,
    /// Stop waiting and hand back whatever accumulated.
    Finish,
}

pub(crate) struct WaitPlan {
    pub operation: &'static str,
    pub iterations: u32,
    pub on_disconnect: OnDisconnect,
    /// Request re-sent every `open_orders_refresh_every` ticks.
    pub refresh: Option<GatewayRequest>,
}

impl WaitPlan {
    pub fn new(operation: &'static str, iterations: u32) -> Self {
        Self {
            operation,
            iterations,
            on_disconnect: OnDisconnect::Fail,
            refresh: None,
        }
    }

    pub fn finish_on_disconnect(mut self) -> Self {
        self.on_disconnect = OnDisconnect::Finish;
        self
    }

    pub fn refreshing(mut self, request: GatewayRequest) -> Self {
        self.refresh = Some(request);
        self
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// A registered correlation entry for one in-flight request.
///
/// Dropping it sends the armed cancel (if any) and discards what is left of
/// the entry, then stops the store watching the request's error ids.
pub(crate) struct Registration<'a> {
    gateway: &'a Gateway,
    session: &'a Session,
    key: EntryKey,
    cancel: Option<GatewayRequest>,
}

impl Registration<'_> {
    pub fn slot(&self) -> SlotId {
        self.session.slot()
    }

    /// Send `request` when this registration ends. Arm it only once the
    /// subscription itself went out.
    pub fn cancel_with(&mut self, request: GatewayRequest) {
        self.cancel = Some(request);
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if let Some(request) = self.cancel.take() {
            self.gateway.send_best_effort(self.session, request);
        }
        self.gateway.store.discard(self.session.slot(), &self.key);
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

pub struct Gateway {
    pool: Arc<SlotPool>,
    store: Arc<CorrelationStore>,
    ids: Arc<IdAllocator>,
    settings: FacadeSettings,
}

impl Gateway {
    pub fn new(
        pool: Arc<SlotPool>,
        store: Arc<CorrelationStore>,
        ids: Arc<IdAllocator>,
        settings: FacadeSettings,
    ) -> Self {
        Self {
            pool,
            store,
            ids,
            settings,
        }
    }

    /// Register `router` for every event kind on every slot.
    pub fn attach_router(sessions: &[Arc<Session>], router: &Arc<EventRouter>) {
        for s in sessions {
            s.on_all(router.handler());
        }
    }

    pub fn pool(&self) -> &Arc<SlotPool> {
        &self.pool
    }

    pub fn store(&self) -> &Arc<CorrelationStore> {
        &self.store
    }

    pub fn settings(&self) -> &FacadeSettings {
        &self.settings
    }

    /// Slot and connection introspection.
    pub fn client_states(&self) -> ClientStates {
        ClientStates {
            pool: self.pool.snapshot(),
            managed_accounts: self.store.managed_accounts(),
            next_order_id: self.ids.peek_order_id(),
        }
    }

    pub(crate) async fn lease(&self, kind: LeaseKind) -> Result<SlotLease, GatewayError> {
        let lease = self.pool.acquire(kind).await?;
        if !lease.session().is_connected() {
            return Err(GatewayError::NotConnected);
        }
        Ok(lease)
    }

    pub(crate) fn reserved_client_id(&self) -> i32 {
        self.pool
            .session(RESERVED_SLOT)
            .map(|s| s.client_id())
            .unwrap_or_default()
    }

    /// Register `key` on `session`'s slot, clearing stale state for it.
    pub(crate) fn register<'a>(&'a self, session: &'a Session, key: EntryKey) -> Registration<'a> {
        self.store.begin(session.slot(), &key);
        Registration {
            gateway: self,
            session,
            key,
            cancel: None,
        }
    }

    /// Send without failing the operation; used for unsubscribes and refreshes.
    pub(crate) fn send_best_effort(&self, session: &Session, request: GatewayRequest) {
        let name = request.name();
        if let Err(e) = session.send(request) {
            debug!(slot = session.slot(), request = name, error = %e, "best-effort send skipped");
        }
    }

    /// Wait until `check` reports done or failed, the budget runs out, or
    /// the session drops. Returns `Ok(true)` when the predicate held and
    /// `Ok(false)` on timeout (or on disconnect with [`OnDisconnect::Finish`]).
    pub(crate) async fn wait<F>(
        &self,
        session: &Session,
        plan: WaitPlan,
        mut check: F,
    ) -> Result<bool, GatewayError>
    where
        F: FnMut(&StoreState) -> Check,
    {
        let poll = self.settings.poll;
        let start = Instant::now();
        let deadline = start + poll * plan.iterations;
        let mut next_tick = start + poll;
        let mut ticks: u32 = 0;

        loop {
            let notified = self.store.changed().notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.store.read(&mut check) {
                Check::Done => {
                    debug!(slot = session.slot(), op = plan.operation, ticks, "complete");
                    return Ok(true);
                }
                Check::Failed(e) => {
                    debug!(slot = session.slot(), op = plan.operation, error = %e, "failed");
                    return Err(e);
                }
                Check::Pending => {}
            }

            if !session.is_connected() {
                warn!(slot = session.slot(), op = plan.operation, "connection lost while waiting");
                return match plan.on_disconnect {
                    OnDisconnect::Fail => Err(GatewayError::ConnectionLost),
                    OnDisconnect::Finish => Ok(false),
                };
            }
            if Instant::now() >= deadline {
                warn!(
                    slot = session.slot(),
                    op = plan.operation,
                    iterations = plan.iterations,
                    "wait budget exhausted"
                );
                return Ok(false);
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(next_tick.min(deadline)) => {
                    if Instant::now() >= next_tick {
                        ticks += 1;
                        next_tick += poll;
                        self.refresh(session, &plan, ticks);
                    }
                }
            }
        }
    }

    fn refresh(&self, session: &Session, plan: &WaitPlan, ticks: u32) {
        let every = self.settings.open_orders_refresh_every;
        let Some(request) = &plan.refresh else {
            return;
        };
        if every == 0 || ticks % every != 0 {
            return;
        }
        self.send_best_effort(session, request.clone());
    }
}
