//! Connection configuration.
//!
//! A configuration is assembled in the following order (later overrides
//! earlier):
//! 1. Default values
//! 2. The DSN entry named by the connection string (from a YAML DSN file)
//! 3. Attributes given explicitly in the connection string
//! 4. Environment variables, when requested

use gridlink_protocol::{ProtocolVersion, DEFAULT_PORT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Driver name reported when none is configured.
pub const DEFAULT_DRIVER: &str = "gridlink";

/// Host used when neither ADDRESS nor SERVER is given.
pub const DEFAULT_SERVER: &str = "localhost";

/// Schema used when none is configured.
pub const DEFAULT_SCHEMA: &str = "PUBLIC";

/// Rows fetched per cursor page.
pub const DEFAULT_PAGE_SIZE: u32 = 1024;

/// Environment variable naming the DSN file.
pub const DSN_FILE_ENV: &str = "GRIDLINK_DSN_FILE";

/// Connection configuration.
///
/// Scalar attributes are validated when the connection string is parsed.
/// `address` and `protocol_version` are kept as text and validated when
/// read, just before a session uses them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Name of the DSN this configuration came from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dsn: Option<String>,
    pub driver: String,
    /// `host[:port]`; takes precedence over `server` and `port`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub server: String,
    pub port: u16,
    pub schema: String,
    pub page_size: u32,
    pub protocol_version: String,
    pub distributed_joins: bool,
    pub enforce_join_order: bool,
    pub replicated_only: bool,
    pub collocated: bool,
    pub lazy: bool,
    /// TCP connect timeout in seconds (0 = no timeout).
    pub login_timeout_secs: u64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            dsn: None,
            driver: DEFAULT_DRIVER.to_string(),
            address: None,
            server: DEFAULT_SERVER.to_string(),
            port: DEFAULT_PORT,
            schema: DEFAULT_SCHEMA.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            protocol_version: ProtocolVersion::current().to_string(),
            distributed_joins: false,
            enforce_join_order: false,
            replicated_only: false,
            collocated: false,
            lazy: false,
            login_timeout_secs: 0,
        }
    }
}

impl Configuration {
    /// Parses a connection string on top of the defaults.
    pub fn from_connect_string(s: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_connect_string(s)?;
        Ok(config)
    }

    /// Parses a connection string, starting from the DSN it names (if any).
    pub fn resolve(s: &str, registry: &DsnRegistry) -> Result<Self, ConfigError> {
        let attributes = parse_connect_string(s)?;

        let mut config = match attributes.iter().rev().find(|(k, _)| k == "DSN") {
            Some((_, name)) => registry
                .get(name)
                .ok_or_else(|| ConfigError::UnknownDsn(name.clone()))?,
            None => Self::default(),
        };

        for (key, value) in &attributes {
            config.set_attribute(key, value)?;
        }
        Ok(config)
    }

    /// Applies every attribute of a connection string.
    pub fn apply_connect_string(&mut self, s: &str) -> Result<(), ConfigError> {
        for (key, value) in parse_connect_string(s)? {
            self.set_attribute(&key, &value)?;
        }
        Ok(())
    }

    /// Sets one attribute by its connection-string key (case-insensitive).
    ///
    /// Unknown keys are ignored.
    pub fn set_attribute(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let key = key.trim().to_ascii_uppercase();
        let value = value.trim();

        match key.as_str() {
            "DSN" => self.dsn = Some(value.to_string()),
            "DRIVER" => self.driver = value.to_string(),
            "ADDRESS" => {
                self.address = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            "SERVER" | "HOST" => self.server = value.to_string(),
            "PORT" => self.port = parse_number(&key, value)?,
            "SCHEMA" => self.schema = value.to_string(),
            "PAGE_SIZE" => {
                let size: u32 = parse_number(&key, value)?;
                if size == 0 {
                    return Err(invalid_value(&key, value));
                }
                self.page_size = size;
            }
            "PROTOCOL_VERSION" => self.protocol_version = value.to_string(),
            "DISTRIBUTED_JOINS" => self.distributed_joins = parse_bool(&key, value)?,
            "ENFORCE_JOIN_ORDER" => self.enforce_join_order = parse_bool(&key, value)?,
            "REPLICATED_ONLY" => self.replicated_only = parse_bool(&key, value)?,
            "COLLOCATED" => self.collocated = parse_bool(&key, value)?,
            "LAZY" => self.lazy = parse_bool(&key, value)?,
            "LOGIN_TIMEOUT" => self.login_timeout_secs = parse_number(&key, value)?,
            _ => tracing::warn!("Ignoring unknown connection string attribute: {}", key),
        }
        Ok(())
    }

    /// Returns the host and port to connect to.
    pub fn endpoint(&self) -> Result<(String, u16), ConfigError> {
        let Some(address) = self.address.as_deref() else {
            if self.server.is_empty() {
                return Err(invalid_value("SERVER", &self.server));
            }
            return Ok((self.server.clone(), self.port));
        };

        let (host, port) = if let Some(rest) = address.strip_prefix('[') {
            // Bracketed IPv6 literal
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| invalid_value("ADDRESS", address))?;
            match tail {
                "" => (host, None),
                _ => match tail.strip_prefix(':') {
                    Some(port) => (host, Some(port)),
                    None => return Err(invalid_value("ADDRESS", address)),
                },
            }
        } else if address.matches(':').count() == 1 {
            let (host, port) = address
                .split_once(':')
                .ok_or_else(|| invalid_value("ADDRESS", address))?;
            (host, Some(port))
        } else {
            (address, None)
        };

        if host.is_empty() {
            return Err(invalid_value("ADDRESS", address));
        }

        let port = match port {
            Some(p) => p
                .trim()
                .parse()
                .map_err(|_| invalid_value("ADDRESS", address))?,
            None => self.port,
        };

        Ok((host.to_string(), port))
    }

    /// Returns the configured protocol version.
    pub fn protocol_version(&self) -> Result<ProtocolVersion, ConfigError> {
        self.protocol_version
            .parse()
            .map_err(|_| invalid_value("PROTOCOL_VERSION", &self.protocol_version))
    }

    /// Returns the connect timeout, if one is configured.
    pub fn login_timeout(&self) -> Option<Duration> {
        (self.login_timeout_secs > 0).then(|| Duration::from_secs(self.login_timeout_secs))
    }

    /// Renders the configuration as a connection string.
    pub fn to_connect_string(&self) -> String {
        let mut attrs: Vec<(&str, String)> = Vec::new();

        if let Some(dsn) = &self.dsn {
            attrs.push(("DSN", dsn.clone()));
        }
        attrs.push(("DRIVER", self.driver.clone()));
        match &self.address {
            Some(address) => attrs.push(("ADDRESS", address.clone())),
            None => {
                attrs.push(("SERVER", self.server.clone()));
                attrs.push(("PORT", self.port.to_string()));
            }
        }
        attrs.push(("SCHEMA", self.schema.clone()));
        attrs.push(("PAGE_SIZE", self.page_size.to_string()));
        attrs.push(("PROTOCOL_VERSION", self.protocol_version.clone()));
        attrs.push(("DISTRIBUTED_JOINS", self.distributed_joins.to_string()));
        attrs.push(("ENFORCE_JOIN_ORDER", self.enforce_join_order.to_string()));
        attrs.push(("REPLICATED_ONLY", self.replicated_only.to_string()));
        attrs.push(("COLLOCATED", self.collocated.to_string()));
        attrs.push(("LAZY", self.lazy.to_string()));
        if self.login_timeout_secs > 0 {
            attrs.push(("LOGIN_TIMEOUT", self.login_timeout_secs.to_string()));
        }

        attrs
            .into_iter()
            .map(|(key, value)| {
                if value.contains(';') || value.starts_with('{') {
                    format!("{}={{{}}}", key, value)
                } else {
                    format!("{}={}", key, value)
                }
            })
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Applies environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(address) = std::env::var("GRIDLINK_ADDRESS") {
            if !address.is_empty() {
                self.address = Some(address);
            }
        }

        if let Ok(schema) = std::env::var("GRIDLINK_SCHEMA") {
            self.schema = schema;
        }

        if let Ok(version) = std::env::var("GRIDLINK_PROTOCOL_VERSION") {
            self.protocol_version = version;
        }
    }
}

/// Splits a connection string into upper-cased keys and raw values.
///
/// Values wrapped in `{}` may contain `;`.
pub fn parse_connect_string(s: &str) -> Result<Vec<(String, String)>, ConfigError> {
    let mut attributes = Vec::new();
    let mut rest = s;

    loop {
        rest = rest.trim_start_matches(|c: char| c == ';' || c.is_whitespace());
        if rest.is_empty() {
            break;
        }

        let segment_end = rest.find(';').unwrap_or(rest.len());
        let eq = rest[..segment_end]
            .find('=')
            .ok_or_else(|| ConfigError::InvalidSyntax(rest[..segment_end].trim().to_string()))?;

        let key = rest[..eq].trim();
        if key.is_empty() {
            return Err(ConfigError::InvalidSyntax(rest[..segment_end].trim().to_string()));
        }

        let after_eq = rest[eq + 1..].trim_start();
        let value;
        if let Some(braced) = after_eq.strip_prefix('{') {
            let close = braced.find('}').ok_or_else(|| {
                ConfigError::InvalidSyntax(format!("unterminated value for {}", key))
            })?;
            value = braced[..close].to_string();

            let tail = braced[close + 1..].trim_start();
            if !tail.is_empty() && !tail.starts_with(';') {
                return Err(ConfigError::InvalidSyntax(format!(
                    "unexpected characters after value of {}",
                    key
                )));
            }
            rest = tail;
        } else {
            let end = after_eq.find(';').unwrap_or(after_eq.len());
            value = after_eq[..end].trim().to_string();
            rest = &after_eq[end..];
        }

        attributes.push((key.to_ascii_uppercase(), value));
    }

    Ok(attributes)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid_value(key, value)),
    }
}

fn parse_number<N: std::str::FromStr>(key: &str, value: &str) -> Result<N, ConfigError> {
    value.parse().map_err(|_| invalid_value(key, value))
}

fn invalid_value(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Named configurations loaded from a YAML DSN file.
///
/// ```yaml
/// analytics:
///   address: "db1.internal:10800"
///   schema: SALES
///   distributed_joins: true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DsnRegistry {
    entries: BTreeMap<String, Configuration>,
}

impl DsnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the DSN file named by `GRIDLINK_DSN_FILE`, or returns an empty
    /// registry if the variable is unset.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var(DSN_FILE_ENV) {
            Ok(path) => Self::from_file(path),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Loads DSNs from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let registry: DsnRegistry = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        tracing::debug!("Loaded {} DSN(s) from {}", registry.len(), path.display());
        Ok(registry)
    }

    /// Saves DSNs to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }

    /// Returns the configuration stored under `name` (matched
    /// case-insensitively), tagged with its DSN name.
    pub fn get(&self, name: &str) -> Option<Configuration> {
        let (key, config) = self
            .entries
            .get_key_value(name)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
            })?;

        let mut config = config.clone();
        config.dsn = Some(key.clone());
        Some(config)
    }

    pub fn insert(&mut self, name: impl Into<String>, config: Configuration) {
        self.entries.insert(name.into(), config);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    InvalidSyntax(String),
    InvalidValue { key: String, value: String },
    UnknownDsn(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read DSN file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse DSN file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidSyntax(segment) => {
                write!(f, "invalid connection string near '{}'", segment)
            }
            ConfigError::InvalidValue { key, value } => {
                write!(f, "invalid value '{}' for attribute {}", value, key)
            }
            ConfigError::UnknownDsn(name) => write!(f, "data source '{}' is not defined", name),
        }
    }
}

impl std::error::Error for ConfigError {}
