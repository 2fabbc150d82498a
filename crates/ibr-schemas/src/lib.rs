//! ibr-schemas
//!
//! Wire-level vocabulary shared by every crate in the gateway:
//! - `GatewayRequest`: what a Session sends to the external trading gateway
//! - `GatewayEvent`: the decoded callback stream coming back
//! - typed payload records carried by events and returned over HTTP
//! - `args`: the explicit per-request field tables used to build contracts
//!   and orders from user input
//!
//! No I/O and no shared state lives here.

pub mod args;
mod contract;
mod event;
mod records;
mod request;

pub use contract::{ComboLeg, Contract, ExecutionFilter, Order};
pub use event::{EventKind, GatewayEvent};
pub use records::{
    AccountSummaryRecord, AccountValueRecord, BarRecord, CommissionReportRecord,
    ContractDetailsRecord, ErrorRecord, ExecutionRecord, OpenOrderRecord, OrderState,
    OrderStatusRecord, PersistRecord, PortfolioRecord, PositionRecord, TickSample,
};
pub use request::{GatewayRequest, HistoryRequest};

/// Identifier shared by orders and feed requests (ticker / request ids).
///
/// The external gateway keys error events by this value with no kind tag,
/// so order ids and request ids must never overlap.
pub type Identifier = i64;

/// Index of a connection slot. Slot 0 is reserved for order operations.
pub type SlotId = usize;

/// Identifier the gateway attaches to connection-level errors that are not
/// associated with any request.
pub const CONNECTION_ERROR_ID: Identifier = -1;

/// Gateway error code for a pacing violation ("retry later").
pub const RATE_LIMIT_CODE: i32 = 162;

/// Gateway error code emitted alongside a successful cancel.
pub const ORDER_CANCELLED_CODE: i32 = 202;
