//! Protocol error types and SQLSTATE codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Protocol-level errors that can occur while framing or (de)serializing messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("message length is negative: {0}")]
    NegativeLength(i32),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("truncated message: need {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("unexpected request type: {0}")]
    UnexpectedRequestType(i8),

    #[error("unexpected client type: {0}")]
    UnexpectedClientType(i8),

    #[error("invalid string type tag: {0}")]
    InvalidStringTag(i8),

    #[error("invalid string length: {0}")]
    InvalidStringLength(i32),

    #[error("invalid UTF-8 in payload")]
    InvalidUtf8,

    #[error("invalid protocol version: '{0}'")]
    InvalidVersion(String),
}

/// SQLSTATE codes reported in diagnostic records.
///
/// Callers match on the five-character code, so the codes are part of the
/// driver contract and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlState {
    /// String data, right truncated.
    #[serde(rename = "01004")]
    S01004DataTruncated,
    /// Invalid connection string attribute.
    #[serde(rename = "01S00")]
    S01S00InvalidConnectionStringAttribute,
    /// Client unable to establish connection.
    #[serde(rename = "08001")]
    S08001CannotConnect,
    /// Connection name in use.
    #[serde(rename = "08002")]
    S08002AlreadyConnected,
    /// Connection does not exist.
    #[serde(rename = "08003")]
    S08003NotConnected,
    /// Server rejected the connection.
    #[serde(rename = "08004")]
    S08004ConnectionRejected,
    /// Communication link failure.
    #[serde(rename = "08S01")]
    S08S01LinkFailure,
    /// General error.
    #[serde(rename = "HY000")]
    SHY000GeneralError,
    /// Memory allocation error.
    #[serde(rename = "HY001")]
    SHY001MemoryAllocation,
    /// Option type out of range.
    #[serde(rename = "HY092")]
    SHY092OptionTypeOutOfRange,
    /// Optional feature not implemented.
    #[serde(rename = "HYC00")]
    SHYC00OptionalFeatureNotImplemented,
}

impl SqlState {
    /// Returns the five-character SQLSTATE code.
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlState::S01004DataTruncated => "01004",
            SqlState::S01S00InvalidConnectionStringAttribute => "01S00",
            SqlState::S08001CannotConnect => "08001",
            SqlState::S08002AlreadyConnected => "08002",
            SqlState::S08003NotConnected => "08003",
            SqlState::S08004ConnectionRejected => "08004",
            SqlState::S08S01LinkFailure => "08S01",
            SqlState::SHY000GeneralError => "HY000",
            SqlState::SHY001MemoryAllocation => "HY001",
            SqlState::SHY092OptionTypeOutOfRange => "HY092",
            SqlState::SHYC00OptionalFeatureNotImplemented => "HYC00",
        }
    }

    /// Returns whether the code is a warning (class `01`) rather than an error.
    pub fn is_warning(&self) -> bool {
        self.as_str().starts_with("01")
    }

    /// Returns the class origin reported by `SQL_DIAG_CLASS_ORIGIN`.
    pub fn class_origin(&self) -> &'static str {
        if self.as_str().starts_with("IM") {
            "ODBC 3.0"
        } else {
            "ISO 9075"
        }
    }

    /// Returns the subclass origin reported by `SQL_DIAG_SUBCLASS_ORIGIN`.
    ///
    /// Subclasses introduced by ODBC (`xxSxx`, and everything in class `IM`)
    /// report "ODBC 3.0".
    pub fn subclass_origin(&self) -> &'static str {
        let code = self.as_str().as_bytes();
        if code[2] == b'S' || self.as_str().starts_with("IM") {
            "ODBC 3.0"
        } else {
            "ISO 9075"
        }
    }
}

impl fmt::Display for SqlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
