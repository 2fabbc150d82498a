//! ibr-testkit
//!
//! In-memory stand-ins for the external gateway so every layer above the
//! transport can be driven deterministically:
//! - [`ScriptedGateway`]: a [`Transport`](ibr_session::Transport) that
//!   answers each request with events produced by a responder closure
//! - [`fixtures`]: small builders for the records those events carry
//! - [`scripted_sessions`]: one Session per slot, each on its own gateway

pub mod fixtures;
mod scripted;

use std::sync::Arc;

use ibr_session::Session;

pub use scripted::{Responder, ScriptedGateway};

/// Build `slots` sessions, slot `i` with client id `i`, each backed by a
/// fresh `ScriptedGateway` sharing `responder`.
pub fn scripted_sessions(
    slots: usize,
    responder: Responder,
) -> (Vec<Arc<Session>>, Vec<Arc<ScriptedGateway>>) {
    let mut sessions = Vec::with_capacity(slots);
    let mut gateways = Vec::with_capacity(slots);
    for slot in 0..slots {
        let gw = Arc::new(ScriptedGateway::new(responder.clone()));
        sessions.push(Arc::new(Session::new(slot, slot as i32, gw.clone())));
        gateways.push(gw);
    }
    (sessions, gateways)
}
