//! Driver error types.

use gridlink_protocol::{ProtocolError, SqlState};
use thiserror::Error;

/// Errors raised by session operations.
///
/// Each variant maps onto one SQLSTATE; the public call wrapper turns an
/// error into a diagnostic record carrying that state and the error's
/// display text.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Already connected.")]
    AlreadyConnected,

    #[error("Failed to establish connection with the host.")]
    CannotConnect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    NotConnected(&'static str),

    #[error("{0}")]
    LinkFailure(String),

    #[error("{0}")]
    General(String),

    #[error("Not enough memory.")]
    MemoryAllocation,

    #[error("{0}")]
    NotImplemented(String),

    #[error("{0}")]
    OptionTypeOutOfRange(String),

    #[error("{0}")]
    InvalidConnectionStringAttribute(String),

    #[error("{0}")]
    ConnectionRejected(String),

    /// The handshake response could not be decoded. Reported with the same
    /// SQLSTATE as a rejection but kept apart from link failures.
    #[error("Malformed handshake response: {0}")]
    MalformedHandshake(#[source] ProtocolError),
}

impl DriverError {
    /// Returns the SQLSTATE reported for this error.
    pub fn sql_state(&self) -> SqlState {
        match self {
            DriverError::AlreadyConnected => SqlState::S08002AlreadyConnected,
            DriverError::CannotConnect { .. } => SqlState::S08001CannotConnect,
            DriverError::NotConnected(_) => SqlState::S08003NotConnected,
            DriverError::LinkFailure(_) => SqlState::S08S01LinkFailure,
            DriverError::General(_) => SqlState::SHY000GeneralError,
            DriverError::MemoryAllocation => SqlState::SHY001MemoryAllocation,
            DriverError::NotImplemented(_) => SqlState::SHYC00OptionalFeatureNotImplemented,
            DriverError::OptionTypeOutOfRange(_) => SqlState::SHY092OptionTypeOutOfRange,
            DriverError::InvalidConnectionStringAttribute(_) => {
                SqlState::S01S00InvalidConnectionStringAttribute
            }
            DriverError::ConnectionRejected(_) => SqlState::S08004ConnectionRejected,
            DriverError::MalformedHandshake(_) => SqlState::S08004ConnectionRejected,
        }
    }

    /// Returns whether the error leaves the transport closed.
    pub fn closes_transport(&self) -> bool {
        matches!(
            self,
            DriverError::LinkFailure(_)
                | DriverError::ConnectionRejected(_)
                | DriverError::MalformedHandshake(_)
        )
    }
}

/// Errors from handle lookups in a [`HandleTable`](crate::HandleTable).
///
/// These correspond to the calling convention's invalid-handle return and
/// never produce diagnostic records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandleError {
    #[error("invalid connection handle: {0}")]
    InvalidConnection(u64),

    #[error("invalid statement handle: {0}")]
    InvalidStatement(u64),
}
