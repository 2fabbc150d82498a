//! ibr-correlation
//!
//! Turns the gateway's interleaved callback stream back into per-request
//! results.
//!
//! - [`IdAllocator`] hands out order ids and feed/request ids from disjoint
//!   sub-ranges of the one identifier namespace.
//! - [`CorrelationStore`] holds one entry per in-flight request. A façade
//!   call registers (resets) the entry before sending, the router is the only
//!   writer afterwards, and the façade pops it when done.
//! - [`EventRouter`] is registered on every Session and writes each event
//!   into the entry its identifier (or slot) names.

mod ids;
mod router;
mod store;

pub use ids::IdAllocator;
pub use router::EventRouter;
pub use store::{
    AccountSummaryEntry, AccountUpdateEntry, ContractDetailsEntry, CorrelationStore, EntryKey,
    ExecutionDetail, ExecutionsEntry, HistoryEnd, HistoryEntry, OpenOrdersEntry, OrderEntry,
    PositionsEntry, StoreState,
};
