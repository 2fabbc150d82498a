use ibr_pool::LeaseError;
use ibr_schemas::{ErrorRecord, Identifier};
use ibr_session::TransportError;
use thiserror::Error;

/// Connection-level failures reuse the id the gateway puts on its own.
pub use ibr_schemas::CONNECTION_ERROR_ID as CONNECTION_FAULT_ID;
/// Id used for slot exhaustion.
pub const POOL_FAULT_ID: Identifier = -2;

/// Code the gateway library uses for "couldn't connect".
const NOT_CONNECTED_CODE: i32 = 502;

const NOT_CONNECTED_MSG: &str = "Couldn't connect to TWS.  Confirm that \"Enable ActiveX and Socket Clients\" is enabled on the TWS \"Configure->API\" menu.";
const POOL_EXHAUSTED_MSG: &str = "Too many requests.  Client ID not available in time.  Try request later";

/// Structured failure of one façade operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    #[error("not connected to the gateway")]
    NotConnected,
    #[error("no slot available in time")]
    PoolExhausted,
    #[error("connection lost while waiting")]
    ConnectionLost,
    #[error("gateway error {code:?} for id {id}: {msg}", code = .0.error_code, id = .0.id, msg = .0.error_msg)]
    Protocol(ErrorRecord),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },
}

impl GatewayError {
    /// 429 marks errors the caller should retry later; everything else is 400.
    pub fn http_status(&self) -> u16 {
        match self {
            GatewayError::PoolExhausted => 429,
            GatewayError::Protocol(rec) if rec.error_code.is_none() || rec.is_rate_limited() => 429,
            _ => 400,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.http_status() == 429
    }

    /// JSON error shape `{ id, errorCode, errorMsg }` returned to HTTP callers.
    pub fn to_record(&self) -> ErrorRecord {
        match self {
            GatewayError::NotConnected => {
                ErrorRecord::new(CONNECTION_FAULT_ID, Some(NOT_CONNECTED_CODE), NOT_CONNECTED_MSG)
            }
            GatewayError::PoolExhausted => ErrorRecord::new(POOL_FAULT_ID, None, POOL_EXHAUSTED_MSG),
            GatewayError::ConnectionLost => {
                ErrorRecord::new(CONNECTION_FAULT_ID, Some(NOT_CONNECTED_CODE), "Connection lost")
            }
            GatewayError::Protocol(rec) => rec.clone(),
            GatewayError::Validation(msg) => ErrorRecord::new(0, Some(400), msg.clone()),
            GatewayError::Timeout { operation } => {
                ErrorRecord::new(0, Some(408), format!("{operation} timed out"))
            }
        }
    }
}

impl From<LeaseError> for GatewayError {
    fn from(e: LeaseError) -> Self {
        match e {
            LeaseError::PoolExhausted { .. } => GatewayError::PoolExhausted,
            LeaseError::NotConnected { .. } => GatewayError::NotConnected,
        }
    }
}

impl From<TransportError> for GatewayError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::NotConnected | TransportError::Connect { .. } => {
                GatewayError::NotConnected
            }
            TransportError::Send(_) | TransportError::Codec(_) => GatewayError::ConnectionLost,
        }
    }
}

impl From<ibr_schemas::args::ArgsError> for GatewayError {
    fn from(e: ibr_schemas::args::ArgsError) -> Self {
        GatewayError::Validation(e.to_string())
    }
}
