//! Statements.

use crate::connection::Connection;
use crate::diagnostic::{CallResult, DiagnosticRecord, DiagnosticSink};
use crate::error::DriverError;
use crate::handles::{ConnectionHandle, StatementHandle};
use crate::transport::Transport;
use bytes::Bytes;

/// A statement created by a [`Connection`].
///
/// The statement refers to its session by handle only; every operation
/// takes the session explicitly and checks that it is the creator.
#[derive(Debug)]
pub struct Statement {
    handle: StatementHandle,
    connection: ConnectionHandle,
    diagnostics: DiagnosticSink,
}

impl Statement {
    pub(crate) fn new(connection: ConnectionHandle) -> Self {
        Self {
            handle: StatementHandle::next(),
            connection,
            diagnostics: DiagnosticSink::new(),
        }
    }

    pub fn handle(&self) -> StatementHandle {
        self.handle
    }

    /// Handle of the session that created this statement.
    pub fn connection(&self) -> ConnectionHandle {
        self.connection
    }

    pub fn diagnostics(&self) -> &[DiagnosticRecord] {
        self.diagnostics.records()
    }

    pub fn status_record(&self, number: usize) -> Option<&DiagnosticRecord> {
        self.diagnostics.status_record(number)
    }

    /// Sends `request` through `conn` and returns the response payload.
    pub fn exchange<T: Transport>(
        &mut self,
        conn: &mut Connection<T>,
        request: &[u8],
    ) -> CallResult<Bytes> {
        self.diagnostics.clear();

        let outcome = if conn.handle() != self.connection {
            Err(DriverError::General(format!(
                "Statement {} does not belong to connection {}.",
                self.handle,
                conn.handle()
            )))
        } else {
            conn.sync_message(request)
        };

        self.diagnostics.complete(outcome)
    }
}
