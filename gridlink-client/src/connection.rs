//! Connection session.
//!
//! A [`Connection`] owns one transport and moves between two states:
//!
//! ```text
//! Disconnected --establish--> Connected --release/close/link failure--> Disconnected
//! ```
//!
//! Every public call clears the session's diagnostics, runs, and reports a
//! [`CallResult`]. Internal operations return `Result<_, DriverError>` and
//! only the call wrapper turns an error into a diagnostic record.

use crate::config::Configuration;
use crate::diagnostic::{CallResult, DiagnosticRecord, DiagnosticSink};
use crate::error::DriverError;
use crate::framer::Framer;
use crate::handles::ConnectionHandle;
use crate::handshake;
use crate::info::ConnectionInfo;
use crate::statement::Statement;
use crate::transport::{TcpTransport, Transport};
use bytes::Bytes;
use gridlink_protocol::{MessageCodec, ProtocolVersion, SqlState};

/// Connection attribute identifiers.
pub mod attribute {
    /// Read-only: whether the connection is dead.
    pub const CONNECTION_DEAD: i32 = 1209;

    pub const SQL_CD_TRUE: u32 = 1;
    pub const SQL_CD_FALSE: u32 = 0;
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
}

/// A session with one backend node.
#[derive(Debug)]
pub struct Connection<T: Transport = TcpTransport> {
    handle: ConnectionHandle,
    state: SessionState,
    framer: Framer<T>,
    codec: MessageCodec,
    config: Configuration,
    protocol_version: Option<ProtocolVersion>,
    diagnostics: DiagnosticSink,
}

impl Connection<TcpTransport> {
    /// Creates a disconnected session over TCP.
    pub fn new() -> Self {
        Self::with_transport(TcpTransport::new())
    }
}

impl Default for Connection<TcpTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> Connection<T> {
    /// Creates a disconnected session over `transport`.
    pub fn with_transport(transport: T) -> Self {
        Self {
            handle: ConnectionHandle::next(),
            state: SessionState::Disconnected,
            framer: Framer::new(transport),
            codec: MessageCodec::new(),
            config: Configuration::default(),
            protocol_version: None,
            diagnostics: DiagnosticSink::new(),
        }
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle
    }

    /// Reports Disconnected as soon as the transport is gone, even before
    /// the session has noticed.
    pub fn state(&self) -> SessionState {
        if self.is_connected() {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        }
    }

    /// Returns whether the session is connected and its transport open.
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected && self.framer.is_open()
    }

    /// Configuration of the last establish attempt that got past
    /// validation.
    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// Version negotiated by the current session.
    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.protocol_version
    }

    pub fn codec(&self) -> &MessageCodec {
        &self.codec
    }

    /// Records left by the most recent call.
    pub fn diagnostics(&self) -> &[DiagnosticRecord] {
        self.diagnostics.records()
    }

    /// Returns a record of the most recent call by 1-based position.
    pub fn status_record(&self, number: usize) -> Option<&DiagnosticRecord> {
        self.diagnostics.status_record(number)
    }

    pub fn transport(&self) -> &T {
        self.framer.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.framer.transport_mut()
    }

    /// Connects and negotiates with the node described by `config`.
    pub fn establish(&mut self, config: Configuration) -> CallResult<()> {
        self.api_call(|conn| conn.internal_establish(config))
    }

    /// Parses `connect_string` and connects with the result.
    pub fn establish_with(&mut self, connect_string: &str) -> CallResult<()> {
        self.api_call(|conn| {
            let config = Configuration::from_connect_string(connect_string)
                .map_err(|e| DriverError::General(e.to_string()))?;
            conn.internal_establish(config)
        })
    }

    /// Closes a connected session.
    pub fn release(&mut self) -> CallResult<()> {
        self.api_call(|conn| {
            let connected = conn.is_connected();
            conn.disconnect();
            if connected {
                Ok(())
            } else {
                Err(DriverError::NotConnected("Connection is not open."))
            }
        })
    }

    /// Closes the session in any state.
    pub fn close(&mut self) -> CallResult<()> {
        self.api_call(|conn| {
            conn.disconnect();
            Ok(())
        })
    }

    /// Creates a statement bound to this session.
    pub fn create_statement(&mut self) -> CallResult<Statement> {
        self.api_call(|conn| Ok(Statement::new(conn.handle)))
    }

    /// Writes the value of info type `type_id` into `buf` and returns its
    /// full length.
    pub fn get_info(&mut self, type_id: u16, buf: &mut [u8]) -> CallResult<usize> {
        self.api_call(|conn| {
            let version = conn
                .protocol_version
                .unwrap_or_else(|| conn.codec.protocol_version());
            let info = ConnectionInfo::new(&conn.config, version);

            let written = info.write(type_id, buf)?;
            if written.truncated {
                conn.diagnostics.warn(
                    SqlState::S01004DataTruncated,
                    "Buffer is too small for the data. Truncated from the right.",
                );
            }
            Ok(written.len)
        })
    }

    /// Writes the value of attribute `attr` into `buf` and returns its
    /// length.
    pub fn get_attribute(&mut self, attr: i32, buf: Option<&mut [u8]>) -> CallResult<usize> {
        self.api_call(|conn| {
            let Some(buf) = buf else {
                return Err(DriverError::General("Data buffer is NULL.".to_string()));
            };

            match attr {
                attribute::CONNECTION_DEAD => {
                    let value = if conn.is_connected() {
                        attribute::SQL_CD_FALSE
                    } else {
                        attribute::SQL_CD_TRUE
                    };
                    let bytes = value.to_ne_bytes();
                    if buf.len() < bytes.len() {
                        return Err(DriverError::General(
                            "Buffer is too small for the attribute value.".to_string(),
                        ));
                    }
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                _ => Err(DriverError::NotImplemented(
                    "Specified attribute is not supported.".to_string(),
                )),
            }
        })
    }

    /// Sets attribute `attr`. No attribute is currently writable.
    pub fn set_attribute(&mut self, attr: i32, _value: &[u8]) -> CallResult<()> {
        self.api_call(|_| match attr {
            attribute::CONNECTION_DEAD => Err(DriverError::OptionTypeOutOfRange(
                "Attribute is read only.".to_string(),
            )),
            _ => Err(DriverError::NotImplemented(
                "Specified attribute is not supported.".to_string(),
            )),
        })
    }

    /// Statements commit implicitly, so there is nothing to do.
    pub fn transaction_commit(&mut self) -> CallResult<()> {
        self.api_call(|_| Ok(()))
    }

    pub fn transaction_rollback(&mut self) -> CallResult<()> {
        self.api_call(|_| {
            Err(DriverError::NotImplemented(
                "Rollback operation is not supported.".to_string(),
            ))
        })
    }

    /// Sends one message.
    pub fn send(&mut self, payload: &[u8]) -> Result<(), DriverError> {
        self.ensure_connected()?;
        let result = self.framer.send(payload);
        self.track_link(result)
    }

    /// Receives one message.
    pub fn receive(&mut self) -> Result<Bytes, DriverError> {
        self.ensure_connected()?;
        let result = self.framer.receive();
        self.track_link(result)
    }

    /// Sends `request` and waits for the matching response.
    pub fn sync_message(&mut self, request: &[u8]) -> Result<Bytes, DriverError> {
        self.send(request)?;
        self.receive()
    }

    fn api_call<R>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<R, DriverError>,
    ) -> CallResult<R> {
        self.diagnostics.clear();
        let outcome = op(self);
        self.diagnostics.complete(outcome)
    }

    fn internal_establish(&mut self, config: Configuration) -> Result<(), DriverError> {
        if self.is_connected() {
            return Err(DriverError::AlreadyConnected);
        }

        let (host, port) = config
            .endpoint()
            .map_err(|e| DriverError::InvalidConnectionStringAttribute(e.to_string()))?;
        let request = handshake::prepare(&config)?;

        let timeout = config.login_timeout();
        self.config = config;

        let transport = self.framer.transport_mut();
        transport.set_connect_timeout(timeout);
        transport
            .connect(&host, port)
            .map_err(|source| {
                tracing::debug!("Failed to connect to {}:{}: {}", host, port, source);
                DriverError::CannotConnect {
                    host: host.clone(),
                    port,
                    source,
                }
            })?;

        match handshake::negotiate(&mut self.framer, &self.codec, &request) {
            Ok(version) => {
                self.codec.set_protocol_version(version);
                self.protocol_version = Some(version);
                self.state = SessionState::Connected;
                tracing::debug!(
                    "{} established with {}:{} (protocol {})",
                    self.handle,
                    host,
                    port,
                    version
                );
                Ok(())
            }
            Err(e) => {
                self.disconnect();
                Err(e)
            }
        }
    }

    fn ensure_connected(&self) -> Result<(), DriverError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(DriverError::NotConnected("Connection is not established"))
        }
    }

    /// Drops to Disconnected when an I/O error left the transport closed.
    fn track_link<R>(&mut self, result: Result<R, DriverError>) -> Result<R, DriverError> {
        if let Err(e) = &result {
            if e.closes_transport() || !self.framer.is_open() {
                tracing::debug!("{} lost its link: {}", self.handle, e);
                self.disconnect();
            }
        }
        result
    }

    fn disconnect(&mut self) {
        if self.state == SessionState::Connected {
            tracing::debug!("{} disconnected", self.handle);
        }
        self.framer.close();
        self.state = SessionState::Disconnected;
        self.protocol_version = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::SqlResult;
    use crate::info::info_type;
    use crate::transport::MemoryTransport;
    use gridlink_protocol::{encode_frame, HandshakeResponse, FRAME_HEADER_SIZE};

    fn reply(response: &HandshakeResponse) -> Vec<u8> {
        let codec = MessageCodec::new();
        encode_frame(&codec.encode_handshake_response(response))
            .unwrap()
            .to_vec()
    }

    fn accepting() -> MemoryTransport {
        let mut transport = MemoryTransport::new();
        transport.push_inbound(&reply(&HandshakeResponse::accepted()));
        transport
    }

    fn connected() -> Connection<MemoryTransport> {
        let mut conn = Connection::with_transport(accepting());
        let res = conn.establish(Configuration::default());
        assert_eq!(res.result, SqlResult::Success);
        conn
    }

    fn first_state<R>(res: &CallResult<R>) -> &'static str {
        res.sql_state().map(|s| s.as_str()).unwrap_or("")
    }

    #[test]
    fn test_establish_success() {
        let conn = connected();

        assert!(conn.is_connected());
        assert_eq!(conn.state(), SessionState::Connected);
        assert_eq!(conn.protocol_version(), Some(ProtocolVersion::VERSION_2_1_5));
        assert_eq!(conn.codec().protocol_version(), ProtocolVersion::VERSION_2_1_5);
        assert!(conn.diagnostics().is_empty());

        let sent = conn.transport().sent();
        let request = conn
            .codec()
            .decode_handshake_request(&sent[FRAME_HEADER_SIZE..])
            .unwrap();
        assert_eq!(request.protocol_version, ProtocolVersion::VERSION_2_1_5);
    }

    #[test]
    fn test_establish_older_version_omits_lazy() {
        let mut conn = Connection::with_transport(accepting());
        let res = conn.establish_with("PROTOCOL_VERSION=2.1.0;LAZY=true");
        assert!(res.is_success());

        // type + version + client + four flags
        assert_eq!(conn.transport().sent().len(), FRAME_HEADER_SIZE + 12);
        assert_eq!(conn.protocol_version(), Some(ProtocolVersion::VERSION_2_1_0));
    }

    #[test]
    fn test_establish_twice() {
        let mut conn = connected();
        let before = conn.configuration().clone();

        let config = Configuration::from_connect_string("SCHEMA=OTHER").unwrap();
        let res = conn.establish(config);

        assert!(res.is_error());
        assert_eq!(first_state(&res), "08002");
        assert!(conn.is_connected());
        assert_eq!(conn.configuration(), &before);
        assert_eq!(conn.transport().connect_calls(), 1);
    }

    #[test]
    fn test_malformed_address_before_connect() {
        let mut conn = Connection::with_transport(accepting());
        let res = conn.establish_with("ADDRESS=db:notaport");

        assert_eq!(first_state(&res), "01S00");
        assert_eq!(conn.transport().connect_calls(), 0);
        assert!(!conn.is_connected());
    }

    #[test]
    fn test_unsupported_version_before_connect() {
        let mut conn = Connection::with_transport(accepting());
        let res = conn.establish_with("PROTOCOL_VERSION=9.9.9");

        assert_eq!(first_state(&res), "01S00");
        assert_eq!(
            conn.status_record(1).unwrap().message(),
            "Protocol version is not supported: 9.9.9"
        );
        assert_eq!(conn.transport().connect_calls(), 0);
    }

    #[test]
    fn test_bad_connect_string() {
        let mut conn = Connection::with_transport(accepting());
        let res = conn.establish_with("SCHEMA");

        assert_eq!(first_state(&res), "HY000");
        assert_eq!(conn.transport().connect_calls(), 0);
    }

    #[test]
    fn test_connect_refused() {
        let mut conn = Connection::with_transport(MemoryTransport::new().refusing_connections());
        let res = conn.establish(Configuration::default());

        assert_eq!(first_state(&res), "08001");
        assert_eq!(
            conn.status_record(1).unwrap().message(),
            "Failed to establish connection with the host."
        );
        assert_eq!(conn.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_handshake_rejected() {
        let mut transport = MemoryTransport::new();
        transport.push_inbound(&reply(&HandshakeResponse::rejected(
            ProtocolVersion::new(2, 0, 0),
            Some("Version mismatch".to_string()),
        )));
        let mut conn = Connection::with_transport(transport);

        let res = conn.establish(Configuration::default());
        assert!(res.is_error());
        assert_eq!(first_state(&res), "08004");

        let message = conn.status_record(1).unwrap().message().to_string();
        assert!(message.contains("Version mismatch"));
        assert!(message.contains("2.0.0"));
        assert!(!conn.transport().is_open());
        assert_eq!(conn.state(), SessionState::Disconnected);
        assert_eq!(conn.protocol_version(), None);
    }

    #[test]
    fn test_handshake_no_reply() {
        let mut conn = Connection::with_transport(MemoryTransport::new());
        let res = conn.establish(Configuration::default());

        assert_eq!(first_state(&res), "08S01");
        assert!(!conn.transport().is_open());
    }

    #[test]
    fn test_handshake_malformed_reply() {
        let mut transport = MemoryTransport::new();
        transport.push_inbound(&encode_frame(&[0]).unwrap());
        let mut conn = Connection::with_transport(transport);

        let res = conn.establish(Configuration::default());
        assert_eq!(first_state(&res), "08004");
        assert!(!conn.is_connected());
        assert!(!conn.transport().is_open());
    }

    #[test]
    fn test_reestablish_after_failure() {
        let mut transport = MemoryTransport::new();
        transport.push_inbound(&reply(&HandshakeResponse::rejected(
            ProtocolVersion::new(2, 0, 0),
            None,
        )));
        transport.push_inbound(&reply(&HandshakeResponse::accepted()));
        let mut conn = Connection::with_transport(transport);

        assert!(conn.establish(Configuration::default()).is_error());
        assert!(conn.establish(Configuration::default()).is_success());
        assert!(conn.is_connected());
        assert!(conn.diagnostics().is_empty());
    }

    #[test]
    fn test_release_and_close() {
        let mut conn = Connection::with_transport(MemoryTransport::new());
        let res = conn.release();
        assert_eq!(first_state(&res), "08003");
        assert_eq!(
            conn.status_record(1).unwrap().message(),
            "Connection is not open."
        );

        let mut conn = connected();
        assert!(conn.release().is_success());
        assert!(!conn.is_connected());
        assert!(!conn.transport().is_open());

        assert!(conn.close().is_success());
        assert!(conn.close().is_success());
    }

    #[test]
    fn test_get_info_truncated() {
        let mut conn = connected();
        let mut buf = [0u8; 4];

        let res = conn.get_info(info_type::DBMS_NAME, &mut buf);
        assert_eq!(res.result, SqlResult::SuccessWithInfo);
        assert_eq!(res.value, Some(8));
        assert_eq!(first_state(&res), "01004");
        assert_eq!(&buf, b"Gri\0");
    }

    #[test]
    fn test_get_info_errors() {
        let mut conn = connected();

        let res = conn.get_info(4242, &mut [0u8; 16]);
        assert_eq!(first_state(&res), "HYC00");
        assert_eq!(conn.status_record(1).unwrap().message(), "Not implemented.");

        let res = conn.get_info(info_type::TXN_CAPABLE, &mut [0u8; 1]);
        assert_eq!(first_state(&res), "HY000");
    }

    #[test]
    fn test_get_info_without_connection() {
        let mut conn = Connection::with_transport(MemoryTransport::new());
        let mut buf = [0u8; 16];
        let res = conn.get_info(info_type::DATABASE_NAME, &mut buf);
        assert_eq!(res.result, SqlResult::Success);
        assert_eq!(&buf[..7], b"PUBLIC\0");
    }

    #[test]
    fn test_connection_dead_attribute() {
        let mut conn = connected();
        let mut buf = [0xffu8; 4];

        let res = conn.get_attribute(attribute::CONNECTION_DEAD, Some(&mut buf[..]));
        assert_eq!(res.value, Some(4));
        assert_eq!(u32::from_ne_bytes(buf), attribute::SQL_CD_FALSE);

        conn.transport_mut().close();
        conn.get_attribute(attribute::CONNECTION_DEAD, Some(&mut buf[..]));
        assert_eq!(u32::from_ne_bytes(buf), attribute::SQL_CD_TRUE);
    }

    #[test]
    fn test_attribute_errors() {
        let mut conn = connected();

        let res = conn.get_attribute(attribute::CONNECTION_DEAD, None);
        assert_eq!(first_state(&res), "HY000");
        assert_eq!(conn.status_record(1).unwrap().message(), "Data buffer is NULL.");

        let res = conn.get_attribute(attribute::CONNECTION_DEAD, Some(&mut [0u8; 2][..]));
        assert_eq!(first_state(&res), "HY000");

        let res = conn.get_attribute(101, Some(&mut [0u8; 4][..]));
        assert_eq!(first_state(&res), "HYC00");

        let res = conn.set_attribute(attribute::CONNECTION_DEAD, &[0, 0, 0, 0]);
        assert_eq!(first_state(&res), "HY092");
        assert_eq!(conn.status_record(1).unwrap().message(), "Attribute is read only.");

        let res = conn.set_attribute(101, &[]);
        assert_eq!(first_state(&res), "HYC00");
    }

    #[test]
    fn test_transactions() {
        let mut conn = connected();
        assert_eq!(conn.transaction_commit().result, SqlResult::Success);

        let res = conn.transaction_rollback();
        assert_eq!(first_state(&res), "HYC00");
        assert_eq!(
            conn.status_record(1).unwrap().message(),
            "Rollback operation is not supported."
        );
    }

    #[test]
    fn test_diagnostics_reset_per_call() {
        let mut conn = connected();
        conn.transaction_rollback();
        assert_eq!(conn.diagnostics().len(), 1);

        conn.transaction_commit();
        assert!(conn.diagnostics().is_empty());
    }

    #[test]
    fn test_sync_message() {
        let mut conn = connected();
        conn.transport_mut()
            .push_inbound(&encode_frame(b"pong").unwrap());

        let response = conn.sync_message(b"ping").unwrap();
        assert_eq!(&response[..], b"pong");
        assert!(conn.transport().sent().ends_with(b"\x04\x00\x00\x00ping"));
    }

    #[test]
    fn test_sync_message_not_connected() {
        let mut conn = Connection::with_transport(MemoryTransport::new());
        let err = conn.sync_message(b"ping").unwrap_err();
        assert!(matches!(err, DriverError::NotConnected(_)));
        assert_eq!(err.to_string(), "Connection is not established");
        assert_eq!(conn.transport().send_calls(), 0);
    }

    #[test]
    fn test_link_failure_disconnects() {
        let mut conn = connected();
        // No response queued
        let err = conn.sync_message(b"ping").unwrap_err();

        assert_eq!(err.sql_state(), SqlState::S08S01LinkFailure);
        assert_eq!(conn.state(), SessionState::Disconnected);
        assert_eq!(conn.protocol_version(), None);
    }

    #[test]
    fn test_transport_closed_under_session() {
        let mut conn = connected();
        conn.transport_mut().close();

        assert_eq!(conn.state(), SessionState::Disconnected);
        assert!(!conn.is_connected());

        let res = conn.release();
        assert_eq!(first_state(&res), "08003");
        assert_eq!(conn.state(), SessionState::Disconnected);
        assert_eq!(conn.protocol_version(), None);

        // The queued handshake reply was consumed by the first session
        let res = conn.establish(Configuration::default());
        assert_eq!(first_state(&res), "08S01");
        assert_eq!(conn.state(), SessionState::Disconnected);
        assert_eq!(conn.protocol_version(), None);
    }

    #[test]
    fn test_failed_establish_drops_negotiated_version() {
        let mut conn = connected();
        conn.transport_mut().close();
        conn.transport_mut().push_inbound(&reply(&HandshakeResponse::rejected(
            ProtocolVersion::new(2, 0, 0),
            None,
        )));

        let res = conn.establish_with("PROTOCOL_VERSION=2.1.0");
        assert_eq!(first_state(&res), "08004");
        assert_eq!(conn.protocol_version(), None);
        assert!(!conn.transport().is_open());
    }

    #[test]
    fn test_login_timeout_is_forwarded() {
        let mut conn = Connection::with_transport(accepting());
        assert!(conn.establish_with("LOGIN_TIMEOUT=7").is_success());
        assert_eq!(
            conn.transport().connect_timeout(),
            Some(std::time::Duration::from_secs(7))
        );
    }
}
