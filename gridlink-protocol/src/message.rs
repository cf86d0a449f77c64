//! Handshake message types.
//!
//! Message bodies other than the handshake belong to the statement layer and
//! travel through the session as opaque payloads.

use crate::version::ProtocolVersion;

/// Request type tag written as the first byte of a request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum RequestType {
    Handshake = 1,
}

impl RequestType {
    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            1 => Some(RequestType::Handshake),
            _ => None,
        }
    }
}

/// Kind of client announcing itself in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum ClientType {
    Odbc = 0,
}

impl ClientType {
    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            0 => Some(ClientType::Odbc),
            _ => None,
        }
    }
}

/// Version and feature negotiation request sent once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub protocol_version: ProtocolVersion,
    pub distributed_joins: bool,
    pub enforce_join_order: bool,
    pub replicated_only: bool,
    pub collocated: bool,
    pub lazy: bool,
}

impl HandshakeRequest {
    /// Creates a request for `protocol_version` with every feature flag off.
    pub fn new(protocol_version: ProtocolVersion) -> Self {
        Self {
            protocol_version,
            distributed_joins: false,
            enforce_join_order: false,
            replicated_only: false,
            collocated: false,
            lazy: false,
        }
    }

    pub fn with_distributed_joins(mut self, enabled: bool) -> Self {
        self.distributed_joins = enabled;
        self
    }

    pub fn with_enforce_join_order(mut self, enabled: bool) -> Self {
        self.enforce_join_order = enabled;
        self
    }

    pub fn with_replicated_only(mut self, enabled: bool) -> Self {
        self.replicated_only = enabled;
        self
    }

    pub fn with_collocated(mut self, enabled: bool) -> Self {
        self.collocated = enabled;
        self
    }

    pub fn with_lazy(mut self, enabled: bool) -> Self {
        self.lazy = enabled;
        self
    }
}

/// The backend's answer to a [`HandshakeRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    pub accepted: bool,
    /// Version the node runs; only reported on rejection.
    pub server_version: Option<ProtocolVersion>,
    /// Additional rejection details supplied by the node.
    pub error: Option<String>,
}

impl HandshakeResponse {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            server_version: None,
            error: None,
        }
    }

    pub fn rejected(server_version: ProtocolVersion, error: Option<String>) -> Self {
        Self {
            accepted: false,
            server_version: Some(server_version),
            error,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }
}
