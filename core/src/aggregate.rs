//! Aggregate identification and versioning types.
//!
//! Every persisted aggregate lives under an [`AggregateKey`] (its kind plus its id)
//! and carries a [`Version`] that the store bumps on each committed write. The
//! version is what turns concurrent writers into detectable conflicts instead of
//! lost updates.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error raised when an aggregate cannot be encoded to or decoded from its stored bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Codec error for {kind}: {message}")]
pub struct CodecError {
    /// Aggregate kind being encoded or decoded.
    pub kind: &'static str,
    /// Underlying codec message.
    pub message: String,
}

/// Unique storage key for one aggregate instance.
///
/// The key is the pair `(kind, id)`, e.g. `("conference", "7f3c…")`. Two aggregates
/// of different kinds may share an id without colliding.
///
/// # Examples
///
/// ```
/// use conference_core::aggregate::AggregateKey;
///
/// let key = AggregateKey::new("profile", "user-42");
/// assert_eq!(key.kind(), "profile");
/// assert_eq!(key.id(), "user-42");
/// assert_eq!(key.to_string(), "profile/user-42");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AggregateKey {
    kind: String,
    id: String,
}

impl AggregateKey {
    /// Create a new key from a kind and an id.
    #[must_use]
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// The aggregate kind (e.g. `"conference"`).
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The aggregate id within its kind.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Aggregate version number for optimistic concurrency control.
///
/// A freshly created aggregate is committed at version 1; every later commit
/// increments the version by one. An absent aggregate has no version at all,
/// which is how "must not exist yet" expectations are expressed.
///
/// # Examples
///
/// ```
/// use conference_core::aggregate::Version;
///
/// let v1 = Version::FIRST;
/// assert_eq!(v1.next(), Version::new(2));
/// assert_eq!(Version::new(5).value(), 5);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// Version assigned to an aggregate on its first commit.
    pub const FIRST: Self = Self(1);

    /// Create a new `Version` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the version number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Get the next version (current + 1).
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// An independently owned, independently versioned unit of persisted state.
///
/// Implementors pick a stable `KIND` and expose their id; the storage layer takes
/// care of versioning. Aggregates are persisted as `bincode` bytes, so they must
/// not rely on self-describing serde features (`untagged`, `flatten`).
///
/// # Example
///
/// ```
/// use conference_core::aggregate::Aggregate;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Counter {
///     id: String,
///     hits: u64,
/// }
///
/// impl Aggregate for Counter {
///     type Id = String;
///     const KIND: &'static str = "counter";
///
///     fn id(&self) -> &String {
///         &self.id
///     }
/// }
///
/// let key = Counter::key_for(&"home".to_string());
/// assert_eq!(key.to_string(), "counter/home");
/// ```
pub trait Aggregate: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Identifier type of this aggregate.
    type Id: fmt::Display + Send + Sync;

    /// Stable kind name used as the first half of the storage key.
    const KIND: &'static str;

    /// The aggregate's own id.
    fn id(&self) -> &Self::Id;

    /// Storage key for an aggregate of this kind with the given id.
    fn key_for(id: &Self::Id) -> AggregateKey {
        AggregateKey::new(Self::KIND, id.to_string())
    }

    /// Storage key for this aggregate instance.
    fn key(&self) -> AggregateKey {
        Self::key_for(self.id())
    }
}

/// Encode an aggregate into its stored byte representation.
///
/// # Errors
///
/// Returns [`CodecError`] if the aggregate cannot be serialized.
pub fn encode<A: Aggregate>(aggregate: &A) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(aggregate).map_err(|e| CodecError {
        kind: A::KIND,
        message: e.to_string(),
    })
}

/// Decode an aggregate from its stored byte representation.
///
/// # Errors
///
/// Returns [`CodecError`] if the bytes are not a valid encoding of `A`.
pub fn decode<A: Aggregate>(bytes: &[u8]) -> Result<A, CodecError> {
    bincode::deserialize(bytes).map_err(|e| CodecError {
        kind: A::KIND,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        id: String,
        hits: u64,
    }

    impl Aggregate for Counter {
        type Id = String;
        const KIND: &'static str = "counter";

        fn id(&self) -> &String {
            &self.id
        }
    }

    mod key_tests {
        use super::*;

        #[test]
        fn display_joins_kind_and_id() {
            let key = AggregateKey::new("conference", "abc");
            assert_eq!(format!("{key}"), "conference/abc");
        }

        #[test]
        fn same_id_different_kind_are_distinct() {
            let a = AggregateKey::new("conference", "1");
            let b = AggregateKey::new("profile", "1");
            assert_ne!(a, b);
        }

        #[test]
        fn key_for_uses_kind() {
            let counter = Counter {
                id: "home".to_string(),
                hits: 3,
            };
            assert_eq!(counter.key(), AggregateKey::new("counter", "home"));
        }
    }

    mod version_tests {
        use super::*;

        #[test]
        fn first_version_is_one() {
            assert_eq!(Version::FIRST.value(), 1);
        }

        #[test]
        fn next_version() {
            assert_eq!(Version::FIRST.next(), Version::new(2));
            assert!(Version::new(2) > Version::FIRST);
        }

        #[test]
        fn display() {
            assert_eq!(format!("{}", Version::new(42)), "42");
        }
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn codec_preserves_aggregate() {
        let counter = Counter {
            id: "home".to_string(),
            hits: 7,
        };
        let bytes = encode(&counter).unwrap();
        let decoded: Counter = decode(&bytes).unwrap();
        assert_eq!(decoded, counter);
    }

    #[test]
    fn decode_garbage_fails_with_kind() {
        let result = decode::<Counter>(&[0xff]);
        let error = result.err();
        assert!(matches!(error, Some(CodecError { kind: "counter", .. })));
    }
}
