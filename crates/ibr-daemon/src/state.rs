//! Shared runtime state for ibr-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. Everything that talks
//! to the gateway goes through the [`Gateway`] façade held here.

use std::sync::Arc;

use ibr_config::GatewayConfig;
use ibr_correlation::{CorrelationStore, EventRouter, IdAllocator};
use ibr_facade::{FacadeSettings, Gateway};
use ibr_pool::{LeaseSettings, SlotPool};
use ibr_schemas::PersistRecord;
use ibr_session::Session;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            service: "ibr-daemon",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    pub build: BuildInfo,
    pub gateway: Gateway,
    /// Fingerprint of the effective config, echoed by /health.
    pub config_hash: String,
}

impl AppState {
    /// Wire one slot per session: shared store and id allocator, an Event
    /// Router registered on every slot, and the Slot Pool over all of them.
    ///
    /// Sessions are not connected here; call `connect_all` on the pool.
    pub fn from_sessions(
        sessions: Vec<Arc<Session>>,
        config: &GatewayConfig,
        persist: Option<UnboundedSender<PersistRecord>>,
        config_hash: impl Into<String>,
    ) -> Self {
        let store = Arc::new(CorrelationStore::new());
        let ids = Arc::new(IdAllocator::new(config.ids.threshold));
        let router = Arc::new(EventRouter::new(store.clone(), ids.clone(), persist));
        Gateway::attach_router(&sessions, &router);

        let timing = &config.timing;
        let pool = SlotPool::new(
            sessions,
            LeaseSettings {
                poll: timing.lease_poll(),
                max_iterations: timing.lease_iterations,
                settle: timing.settle(),
            },
        );
        let settings = FacadeSettings::from_timing(timing);

        Self {
            build: BuildInfo::default(),
            gateway: Gateway::new(pool, store, ids, settings),
            config_hash: config_hash.into(),
        }
    }
}
