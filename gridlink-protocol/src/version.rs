//! Protocol versions.

use crate::error::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// A `major.minor.maintenance` protocol version.
///
/// Versions are totally ordered component by component. The version a
/// session negotiates is fixed for the lifetime of that session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion {
    major: i16,
    minor: i16,
    maintenance: i16,
}

impl ProtocolVersion {
    /// First version spoken by the driver.
    pub const VERSION_2_1_0: ProtocolVersion = ProtocolVersion::new(2, 1, 0);
    /// Adds the `lazy` handshake flag.
    pub const VERSION_2_1_5: ProtocolVersion = ProtocolVersion::new(2, 1, 5);

    /// Versions this driver can negotiate, oldest first.
    pub const SUPPORTED: [ProtocolVersion; 2] = [Self::VERSION_2_1_0, Self::VERSION_2_1_5];

    pub const fn new(major: i16, minor: i16, maintenance: i16) -> Self {
        Self {
            major,
            minor,
            maintenance,
        }
    }

    /// Returns the newest supported version.
    pub const fn current() -> Self {
        Self::VERSION_2_1_5
    }

    pub fn major(&self) -> i16 {
        self.major
    }

    pub fn minor(&self) -> i16 {
        self.minor
    }

    pub fn maintenance(&self) -> i16 {
        self.maintenance
    }

    /// Returns whether this driver can speak this version.
    pub fn is_supported(&self) -> bool {
        Self::SUPPORTED.contains(self)
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.maintenance)
    }
}

impl FromStr for ProtocolVersion {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidVersion(s.to_string());

        let mut parts = s.trim().split('.');
        let mut next = || -> Result<i16, ProtocolError> {
            let part = parts.next().ok_or_else(invalid)?;
            let value: i16 = part.parse().map_err(|_| invalid())?;
            if value < 0 {
                return Err(invalid());
            }
            Ok(value)
        };

        let major = next()?;
        let minor = next()?;
        let maintenance = next()?;

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self::new(major, minor, maintenance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let v: ProtocolVersion = "2.1.5".parse().unwrap();
        assert_eq!(v, ProtocolVersion::VERSION_2_1_5);
        assert_eq!(v.to_string(), "2.1.5");
        assert_eq!(v.major(), 2);
        assert_eq!(v.minor(), 1);
        assert_eq!(v.maintenance(), 5);

        let v: ProtocolVersion = " 2.1.0 ".parse().unwrap();
        assert_eq!(v, ProtocolVersion::VERSION_2_1_0);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in ["", "2", "2.1", "2.1.5.1", "2.x.0", "-2.1.0", "2..5", "99999.0.0"] {
            let result = input.parse::<ProtocolVersion>();
            assert!(
                matches!(result, Err(ProtocolError::InvalidVersion(_))),
                "expected '{}' to be rejected",
                input
            );
        }
    }

    #[test]
    fn test_ordering() {
        assert!(ProtocolVersion::VERSION_2_1_0 < ProtocolVersion::VERSION_2_1_5);
        assert!(ProtocolVersion::new(2, 2, 0) > ProtocolVersion::VERSION_2_1_5);
        assert!(ProtocolVersion::new(1, 9, 9) < ProtocolVersion::VERSION_2_1_0);
    }

    #[test]
    fn test_supported_set() {
        assert!(ProtocolVersion::VERSION_2_1_0.is_supported());
        assert!(ProtocolVersion::VERSION_2_1_5.is_supported());
        assert!(ProtocolVersion::current().is_supported());
        assert!(!ProtocolVersion::new(2, 1, 1).is_supported());
        assert!(!ProtocolVersion::new(3, 0, 0).is_supported());
        assert_eq!(ProtocolVersion::default(), ProtocolVersion::current());
    }
}
