//! Opaque handle identifiers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)
}

/// Identifies a connection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionHandle(u64);

impl ConnectionHandle {
    /// Allocates a handle distinct from every other handle in the process.
    pub fn next() -> Self {
        Self(next_id())
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Identifies a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatementHandle(u64);

impl StatementHandle {
    pub fn next() -> Self {
        Self(next_id())
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StatementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stmt#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique() {
        let a = ConnectionHandle::next();
        let b = ConnectionHandle::next();
        let s = StatementHandle::next();

        assert_ne!(a, b);
        assert_ne!(a.id(), s.id());
        assert_ne!(b.id(), s.id());
        assert!(a.to_string().starts_with("conn#"));
        assert!(s.to_string().starts_with("stmt#"));
    }
}
