//! Handle arena for sessions and their statements.
//!
//! Callers that work with raw handle ids keep sessions and statements in a
//! [`HandleTable`]. Freeing a session invalidates every statement it
//! created, so a statement can never outlive its session.

use crate::connection::Connection;
use crate::diagnostic::CallResult;
use crate::error::HandleError;
use crate::handles::{ConnectionHandle, StatementHandle};
use crate::statement::Statement;
use crate::transport::{TcpTransport, Transport};
use bytes::Bytes;
use std::collections::HashMap;

#[derive(Debug)]
pub struct HandleTable<T: Transport = TcpTransport> {
    connections: HashMap<ConnectionHandle, Connection<T>>,
    statements: HashMap<StatementHandle, Statement>,
}

impl<T: Transport> HandleTable<T> {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
            statements: HashMap::new(),
        }
    }

    /// Adds a disconnected session over `transport`.
    pub fn alloc_connection(&mut self, transport: T) -> ConnectionHandle {
        let conn = Connection::with_transport(transport);
        let handle = conn.handle();
        self.connections.insert(handle, conn);
        tracing::trace!("Allocated {}", handle);
        handle
    }

    pub fn connection(&self, handle: ConnectionHandle) -> Result<&Connection<T>, HandleError> {
        self.connections
            .get(&handle)
            .ok_or(HandleError::InvalidConnection(handle.id()))
    }

    pub fn connection_mut(
        &mut self,
        handle: ConnectionHandle,
    ) -> Result<&mut Connection<T>, HandleError> {
        self.connections
            .get_mut(&handle)
            .ok_or(HandleError::InvalidConnection(handle.id()))
    }

    /// Creates a statement on the session `handle`.
    pub fn create_statement(
        &mut self,
        handle: ConnectionHandle,
    ) -> Result<CallResult<StatementHandle>, HandleError> {
        let result = self.connection_mut(handle)?.create_statement();

        Ok(result.map(|stmt| {
            let stmt_handle = stmt.handle();
            self.statements.insert(stmt_handle, stmt);
            stmt_handle
        }))
    }

    pub fn statement(&self, handle: StatementHandle) -> Result<&Statement, HandleError> {
        self.statements
            .get(&handle)
            .ok_or(HandleError::InvalidStatement(handle.id()))
    }

    /// Runs one request/response exchange for statement `handle`.
    pub fn statement_exchange(
        &mut self,
        handle: StatementHandle,
        request: &[u8],
    ) -> Result<CallResult<Bytes>, HandleError> {
        let stmt = self
            .statements
            .get_mut(&handle)
            .ok_or(HandleError::InvalidStatement(handle.id()))?;
        let conn = self
            .connections
            .get_mut(&stmt.connection())
            .ok_or(HandleError::InvalidConnection(stmt.connection().id()))?;

        Ok(stmt.exchange(conn, request))
    }

    pub fn free_statement(&mut self, handle: StatementHandle) -> Result<(), HandleError> {
        self.statements
            .remove(&handle)
            .map(|_| ())
            .ok_or(HandleError::InvalidStatement(handle.id()))
    }

    /// Closes and removes a session along with its statements.
    ///
    /// Returns the number of statements freed.
    pub fn free_connection(&mut self, handle: ConnectionHandle) -> Result<usize, HandleError> {
        let mut conn = self
            .connections
            .remove(&handle)
            .ok_or(HandleError::InvalidConnection(handle.id()))?;
        conn.close();

        let before = self.statements.len();
        self.statements.retain(|_, stmt| stmt.connection() != handle);
        let freed = before - self.statements.len();

        tracing::trace!("Freed {} and {} statement(s)", handle, freed);
        Ok(freed)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }
}

impl<T: Transport> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
