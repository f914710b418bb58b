use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Opaque revision token assigned by the datastore on every write.
///
/// Tokens follow the `<generation>-<hex>` shape. The generation starts at 1
/// when a document is created and increases by one on every successful
/// update; the hex suffix makes tokens from concurrent writers distinct even
/// at the same generation. Callers must treat the token as opaque and only
/// round-trip it into the next update's compare field.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rev(String);

impl Rev {
    /// Wrap a token received from a client or a backend.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The token for a freshly created document.
    pub fn initial() -> Self {
        Self::with_generation(1)
    }

    /// The token that replaces this one after a successful write.
    pub fn next(&self) -> Self {
        Self::with_generation(self.generation().unwrap_or(0) + 1)
    }

    fn with_generation(generation: u64) -> Self {
        Self(format!("{generation}-{}", uuid::Uuid::now_v7().simple()))
    }

    /// Parse the generation counter from the token.
    pub fn generation(&self) -> Result<u64, TypeError> {
        let (generation, suffix) = self
            .0
            .split_once('-')
            .ok_or_else(|| TypeError::InvalidRevision(self.0.clone()))?;
        if suffix.is_empty() {
            return Err(TypeError::InvalidRevision(self.0.clone()));
        }
        generation
            .parse()
            .map_err(|_| TypeError::InvalidRevision(self.0.clone()))
    }

    /// Returns `true` when no token is present (never written).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Rev {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rev({})", self.0)
    }
}

impl fmt::Display for Rev {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn initial_is_generation_one() {
        assert_eq!(Rev::initial().generation().unwrap(), 1);
    }

    #[test]
    fn next_increments_generation_and_changes_token() {
        let first = Rev::initial();
        let second = first.next();
        assert_eq!(second.generation().unwrap(), 2);
        assert_ne!(first, second);
        assert_eq!(second.next().generation().unwrap(), 3);
    }

    #[test]
    fn tokens_at_same_generation_differ() {
        assert_ne!(Rev::initial(), Rev::initial());
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(Rev::new("nonsense").generation().is_err());
        assert!(Rev::new("x-abc").generation().is_err());
        assert!(Rev::new("3-").generation().is_err());
    }

    #[test]
    fn next_of_malformed_restarts_at_one() {
        assert_eq!(Rev::new("garbage").next().generation().unwrap(), 1);
    }

    #[test]
    fn empty_token() {
        assert!(Rev::default().is_empty());
        assert!(!Rev::initial().is_empty());
    }

    proptest! {
        #[test]
        fn next_always_advances_by_one(generation in 1u64..1_000_000, suffix in "[0-9a-f]{1,32}") {
            let rev = Rev::new(format!("{generation}-{suffix}"));
            let next = rev.next();
            prop_assert_eq!(next.generation().unwrap(), generation + 1);
            prop_assert_ne!(next, rev);
        }
    }
}
