//! ibr-pool
//!
//! Slot Pool / Lease Manager.
//!
//! Slot 0 is reserved for order-mutating operations and guarded by its own
//! latch. Slots `1..=N` are shared by feed and read operations through a
//! FIFO free list. A lease is an RAII guard: dropping it returns the slot.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ibr_schemas::SlotId;
use ibr_session::Session;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const RESERVED_SLOT: SlotId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseKind {
    /// The reserved order slot.
    Order,
    /// Any pooled slot.
    Feed,
}

impl fmt::Display for LeaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaseKind::Order => f.write_str("order"),
            LeaseKind::Feed => f.write_str("feed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeaseError {
    #[error("no {kind} slot available")]
    PoolExhausted { kind: LeaseKind },
    #[error("slot {slot} is not connected to the gateway")]
    NotConnected { slot: SlotId },
}

#[derive(Debug, Clone, Copy)]
pub struct LeaseSettings {
    pub poll: Duration,
    pub max_iterations: u32,
    /// Pause between disconnect and reconnect on checkout.
    pub settle: Duration,
}

impl LeaseSettings {
    pub fn budget(&self) -> Duration {
        self.poll * self.max_iterations
    }
}

#[derive(Debug)]
struct PoolState {
    reserved_in_use: bool,
    free: VecDeque<SlotId>,
}

pub struct SlotPool {
    sessions: Vec<Arc<Session>>,
    state: Mutex<PoolState>,
    released: Notify,
    settings: LeaseSettings,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotStatus {
    pub slot: SlotId,
    pub client_id: i32,
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSnapshot {
    pub reserved_in_use: bool,
    pub free: Vec<SlotId>,
    pub slots: Vec<SlotStatus>,
}

impl SlotPool {
    /// `sessions[0]` becomes the reserved slot; the rest are pooled.
    pub fn new(sessions: Vec<Arc<Session>>, settings: LeaseSettings) -> Arc<Self> {
        let free = (1..sessions.len()).collect();
        Arc::new(Self {
            sessions,
            state: Mutex::new(PoolState {
                reserved_in_use: false,
                free,
            }),
            released: Notify::new(),
            settings,
        })
    }

    pub fn sessions(&self) -> &[Arc<Session>] {
        &self.sessions
    }

    pub fn session(&self, slot: SlotId) -> Option<&Arc<Session>> {
        self.sessions.get(slot)
    }

    /// Connect every slot. Failures are logged; checkout repairs them.
    pub async fn connect_all(&self) {
        for s in &self.sessions {
            if let Err(e) = s.connect().await {
                warn!(slot = s.slot(), error = %e, "initial connect failed");
            }
        }
    }

    pub async fn disconnect_all(&self) {
        for s in &self.sessions {
            s.disconnect().await;
        }
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let st = self.state.lock();
        PoolSnapshot {
            reserved_in_use: st.reserved_in_use,
            free: st.free.iter().copied().collect(),
            slots: self
                .sessions
                .iter()
                .map(|s| SlotStatus {
                    slot: s.slot(),
                    client_id: s.client_id(),
                    connected: s.is_connected(),
                })
                .collect(),
        }
    }

    fn try_take(&self, kind: LeaseKind) -> Option<SlotId> {
        let mut st = self.state.lock();
        match kind {
            LeaseKind::Order => {
                if st.reserved_in_use || self.sessions.is_empty() {
                    None
                } else {
                    st.reserved_in_use = true;
                    Some(RESERVED_SLOT)
                }
            }
            LeaseKind::Feed => st.free.pop_front(),
        }
    }

    fn release(&self, slot: SlotId) {
        {
            let mut st = self.state.lock();
            if slot == RESERVED_SLOT {
                st.reserved_in_use = false;
            } else if !st.free.contains(&slot) {
                st.free.push_back(slot);
            }
        }
        debug!(slot, "slot released");
        self.released.notify_waiters();
    }

    /// Lease a slot, waiting up to `poll × max_iterations`.
    ///
    /// A disconnected slot is reconnected once on checkout. If that fails a
    /// pooled slot goes back to the free list and `NotConnected` is returned;
    /// the reserved slot is handed out anyway so the caller sees the fault.
    pub async fn acquire(self: &Arc<Self>, kind: LeaseKind) -> Result<SlotLease, LeaseError> {
        let deadline = Instant::now() + self.settings.budget();
        let slot = loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(slot) = self.try_take(kind) {
                break slot;
            }
            if Instant::now() >= deadline {
                warn!(%kind, "lease wait exhausted");
                return Err(LeaseError::PoolExhausted { kind });
            }
            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(self.settings.poll) => {}
            }
        };

        let session = self.sessions[slot].clone();
        let lease = SlotLease {
            pool: self.clone(),
            slot,
            session,
        };
        debug!(slot, %kind, "slot leased");

        if !lease.session.is_connected() {
            info!(slot, "slot not connected, reconnecting");
            if let Err(e) = lease.session.reconnect(self.settings.settle).await {
                warn!(slot, error = %e, "reconnect failed");
            }
            if !lease.session.is_connected() && slot != RESERVED_SLOT {
                // dropping the lease puts the slot back on the free list
                return Err(LeaseError::NotConnected { slot });
            }
        }
        Ok(lease)
    }
}

/// Exclusive hold on one slot until dropped.
pub struct SlotLease {
    pool: Arc<SlotPool>,
    slot: SlotId,
    session: Arc<Session>,
}

impl SlotLease {
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl fmt::Debug for SlotLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotLease").field("slot", &self.slot).finish()
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        self.pool.release(self.slot);
    }
}
