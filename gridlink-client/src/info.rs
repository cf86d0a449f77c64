//! GetInfo values reported by a connection.

use crate::config::Configuration;
use crate::error::DriverError;
use gridlink_protocol::ProtocolVersion;
use std::collections::HashMap;

/// Info type identifiers.
pub mod info_type {
    pub const DATA_SOURCE_NAME: u16 = 2;
    pub const DRIVER_NAME: u16 = 6;
    pub const DRIVER_VER: u16 = 7;
    pub const SERVER_NAME: u16 = 13;
    pub const SEARCH_PATTERN_ESCAPE: u16 = 14;
    pub const DATABASE_NAME: u16 = 16;
    pub const DBMS_NAME: u16 = 17;
    pub const DBMS_VER: u16 = 18;
    pub const DATA_SOURCE_READ_ONLY: u16 = 25;
    pub const IDENTIFIER_QUOTE_CHAR: u16 = 29;
    pub const MAX_SCHEMA_NAME_LEN: u16 = 32;
    pub const SCHEMA_TERM: u16 = 39;
    pub const CATALOG_NAME_SEPARATOR: u16 = 41;
    pub const TABLE_TERM: u16 = 45;
    pub const TXN_CAPABLE: u16 = 46;
    pub const USER_NAME: u16 = 47;
    pub const DRIVER_ODBC_VER: u16 = 77;
    pub const GETDATA_EXTENSIONS: u16 = 81;
    pub const ODBC_INTERFACE_CONFORMANCE: u16 = 152;
    pub const MAX_IDENTIFIER_LEN: u16 = 10005;

    /// Returns the symbolic name of an info type.
    pub fn name(type_id: u16) -> Option<&'static str> {
        let name = match type_id {
            DATA_SOURCE_NAME => "SQL_DATA_SOURCE_NAME",
            DRIVER_NAME => "SQL_DRIVER_NAME",
            DRIVER_VER => "SQL_DRIVER_VER",
            SERVER_NAME => "SQL_SERVER_NAME",
            SEARCH_PATTERN_ESCAPE => "SQL_SEARCH_PATTERN_ESCAPE",
            DATABASE_NAME => "SQL_DATABASE_NAME",
            DBMS_NAME => "SQL_DBMS_NAME",
            DBMS_VER => "SQL_DBMS_VER",
            DATA_SOURCE_READ_ONLY => "SQL_DATA_SOURCE_READ_ONLY",
            IDENTIFIER_QUOTE_CHAR => "SQL_IDENTIFIER_QUOTE_CHAR",
            MAX_SCHEMA_NAME_LEN => "SQL_MAX_SCHEMA_NAME_LEN",
            SCHEMA_TERM => "SQL_SCHEMA_TERM",
            CATALOG_NAME_SEPARATOR => "SQL_CATALOG_NAME_SEPARATOR",
            TABLE_TERM => "SQL_TABLE_TERM",
            TXN_CAPABLE => "SQL_TXN_CAPABLE",
            USER_NAME => "SQL_USER_NAME",
            DRIVER_ODBC_VER => "SQL_DRIVER_ODBC_VER",
            GETDATA_EXTENSIONS => "SQL_GETDATA_EXTENSIONS",
            ODBC_INTERFACE_CONFORMANCE => "SQL_ODBC_INTERFACE_CONFORMANCE",
            MAX_IDENTIFIER_LEN => "SQL_MAX_IDENTIFIER_LEN",
            _ => return None,
        };
        Some(name)
    }
}

const PRODUCT_NAME: &str = "Gridlink";
const ODBC_VERSION: &str = "03.00";

const SQL_TC_NONE: u16 = 0;
const SQL_GD_ANY_COLUMN: u32 = 0x0001;
const SQL_GD_ANY_ORDER: u32 = 0x0002;
const SQL_OIC_CORE: u32 = 1;
const IDENTIFIER_LEN_LIMIT: u16 = 128;

/// A single GetInfo value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoValue {
    Str(String),
    U16(u16),
    U32(u32),
}

impl std::fmt::Display for InfoValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfoValue::Str(s) => write!(f, "{}", s),
            InfoValue::U16(v) => write!(f, "{}", v),
            InfoValue::U32(v) => write!(f, "{}", v),
        }
    }
}

/// Outcome of writing a value into a caller buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoWritten {
    /// Full length of the value in bytes, excluding any NUL terminator.
    pub len: usize,
    /// Whether a string value did not fit.
    pub truncated: bool,
}

/// GetInfo values derived from a connection's configuration.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    values: HashMap<u16, InfoValue>,
}

impl ConnectionInfo {
    pub fn new(config: &Configuration, version: ProtocolVersion) -> Self {
        use info_type::*;

        let server = config
            .endpoint()
            .map(|(host, _)| host)
            .unwrap_or_else(|_| config.server.clone());

        let values = HashMap::from([
            (
                DATA_SOURCE_NAME,
                InfoValue::Str(config.dsn.clone().unwrap_or_default()),
            ),
            (
                DRIVER_NAME,
                InfoValue::Str(env!("CARGO_PKG_NAME").to_string()),
            ),
            (DRIVER_VER, InfoValue::Str(driver_version())),
            (SERVER_NAME, InfoValue::Str(server)),
            (SEARCH_PATTERN_ESCAPE, InfoValue::Str("\\".to_string())),
            (DATABASE_NAME, InfoValue::Str(config.schema.clone())),
            (DBMS_NAME, InfoValue::Str(PRODUCT_NAME.to_string())),
            (
                DBMS_VER,
                InfoValue::Str(format!(
                    "{:02}.{:02}.{:04}",
                    version.major(),
                    version.minor(),
                    version.maintenance()
                )),
            ),
            (DATA_SOURCE_READ_ONLY, InfoValue::Str("N".to_string())),
            (IDENTIFIER_QUOTE_CHAR, InfoValue::Str("\"".to_string())),
            (MAX_SCHEMA_NAME_LEN, InfoValue::U16(0)),
            (SCHEMA_TERM, InfoValue::Str("schema".to_string())),
            (CATALOG_NAME_SEPARATOR, InfoValue::Str(".".to_string())),
            (TABLE_TERM, InfoValue::Str("table".to_string())),
            (TXN_CAPABLE, InfoValue::U16(SQL_TC_NONE)),
            (USER_NAME, InfoValue::Str(String::new())),
            (DRIVER_ODBC_VER, InfoValue::Str(ODBC_VERSION.to_string())),
            (
                GETDATA_EXTENSIONS,
                InfoValue::U32(SQL_GD_ANY_COLUMN | SQL_GD_ANY_ORDER),
            ),
            (ODBC_INTERFACE_CONFORMANCE, InfoValue::U32(SQL_OIC_CORE)),
            (MAX_IDENTIFIER_LEN, InfoValue::U16(IDENTIFIER_LEN_LIMIT)),
        ]);

        Self { values }
    }

    pub fn value(&self, type_id: u16) -> Option<&InfoValue> {
        self.values.get(&type_id)
    }

    /// Writes the value of `type_id` into `buf`.
    ///
    /// Strings are NUL-terminated and truncated to fit; an empty buffer
    /// only queries the length. Integers are written in native byte order
    /// and must fit entirely.
    pub fn write(&self, type_id: u16, buf: &mut [u8]) -> Result<InfoWritten, DriverError> {
        let value = self
            .value(type_id)
            .ok_or_else(|| DriverError::NotImplemented("Not implemented.".to_string()))?;

        match value {
            InfoValue::Str(s) => Ok(write_str(s, buf)),
            InfoValue::U16(v) => write_int(&v.to_ne_bytes(), buf),
            InfoValue::U32(v) => write_int(&v.to_ne_bytes(), buf),
        }
    }
}

fn write_str(s: &str, buf: &mut [u8]) -> InfoWritten {
    let bytes = s.as_bytes();
    let Some(room) = buf.len().checked_sub(1) else {
        return InfoWritten {
            len: bytes.len(),
            truncated: false,
        };
    };

    let n = bytes.len().min(room);
    buf[..n].copy_from_slice(&bytes[..n]);
    buf[n] = 0;

    InfoWritten {
        len: bytes.len(),
        truncated: n < bytes.len(),
    }
}

fn write_int(bytes: &[u8], buf: &mut [u8]) -> Result<InfoWritten, DriverError> {
    if buf.len() < bytes.len() {
        return Err(DriverError::General(format!(
            "Buffer is too small: {} bytes required, {} provided.",
            bytes.len(),
            buf.len()
        )));
    }

    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(InfoWritten {
        len: bytes.len(),
        truncated: false,
    })
}

/// Driver version in `##.##.####` form.
fn driver_version() -> String {
    let part = |s: &str| s.parse::<u32>().unwrap_or(0);
    format!(
        "{:02}.{:02}.{:04}",
        part(env!("CARGO_PKG_VERSION_MAJOR")),
        part(env!("CARGO_PKG_VERSION_MINOR")),
        part(env!("CARGO_PKG_VERSION_PATCH"))
    )
}
