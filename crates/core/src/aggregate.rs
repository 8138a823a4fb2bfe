//! Optimistic concurrency primitives for aggregates.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Optimistic concurrency expectation for an aggregate.
///
/// Commands built from a loaded write model carry `Exact(processed_sequence)`;
/// the store rejects the push when the aggregate advanced in the meantime.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectedVersion {
    /// Skip version checking (cascade side effects, idempotent appends).
    Any,
    /// Require the aggregate to be at an exact sequence.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> Result<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(Error::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_matches_everything() {
        assert!(ExpectedVersion::Any.matches(0));
        assert!(ExpectedVersion::Any.matches(42));
    }

    #[test]
    fn exact_rejects_advanced_stream() {
        assert!(ExpectedVersion::Exact(3).check(3).is_ok());
        let err = ExpectedVersion::Exact(3).check(4).unwrap_err();
        assert!(err.is_conflict());
    }
}
