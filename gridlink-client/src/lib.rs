//! # gridlink-client
//!
//! Connection session for the gridlink SQL driver.
//!
//! This crate provides:
//! - Blocking TCP transport and an in-memory transport for tests
//! - Frame send/receive loops that survive partial I/O
//! - The version handshake
//! - Connection strings, YAML DSN files and environment overrides
//! - Diagnostic records and tri-state call results
//! - The session state machine, statements and a handle arena

pub mod config;
pub mod connection;
pub mod diagnostic;
pub mod error;
pub mod framer;
pub mod handles;
pub mod handshake;
pub mod info;
pub mod statement;
pub mod table;
pub mod transport;

pub use config::{ConfigError, Configuration, DsnRegistry};
pub use connection::{attribute, Connection, SessionState};
pub use diagnostic::{CallResult, DiagnosticRecord, DiagnosticSink, SqlResult};
pub use error::{DriverError, HandleError};
pub use framer::Framer;
pub use handles::{ConnectionHandle, StatementHandle};
pub use info::{info_type, ConnectionInfo, InfoValue};
pub use statement::Statement;
pub use table::HandleTable;
pub use transport::{MemoryTransport, TcpTransport, Transport};
