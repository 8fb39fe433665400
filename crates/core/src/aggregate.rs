//! Aggregate root trait and optimistic concurrency versioning.

use crate::error::{DomainError, DomainResult};

/// Aggregate root marker + minimal interface.
///
/// Every mutable domain record carries a version stamp that changes on each
/// mutation. Stores compare-and-swap on it at commit time.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the aggregate's state.
    ///
    /// Starts at 1 when the aggregate is first persisted and grows by one per
    /// committed mutation.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for an aggregate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ExpectedVersion {
    /// No token was presented; the version read at load time is used.
    #[default]
    Any,
    /// Require the aggregate to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }

    /// Pin the expectation to the version that was just read.
    ///
    /// `Any` becomes `Exact(read)`; an explicit token is kept as is.
    pub fn pin(self, read: u64) -> u64 {
        match self {
            ExpectedVersion::Any => read,
            ExpectedVersion::Exact(v) => v,
        }
    }
}

impl From<Option<u64>> for ExpectedVersion {
    fn from(value: Option<u64>) -> Self {
        value.map(ExpectedVersion::Exact).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn any_matches_every_version() {
        assert!(ExpectedVersion::Any.matches(0));
        assert!(ExpectedVersion::Any.matches(42));
    }

    #[test]
    fn exact_mismatch_is_a_conflict() {
        let err = ExpectedVersion::Exact(3).check(4).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn pin_prefers_presented_token() {
        assert_eq!(ExpectedVersion::Any.pin(7), 7);
        assert_eq!(ExpectedVersion::Exact(2).pin(7), 2);
    }

    proptest! {
        #[test]
        fn exact_matches_only_itself(expected in 0u64..1000, actual in 0u64..1000) {
            prop_assert_eq!(ExpectedVersion::Exact(expected).matches(actual), expected == actual);
        }
    }
}
