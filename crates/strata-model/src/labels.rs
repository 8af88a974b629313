//! Label sets and fingerprints.
//!
//! A series is identified within a tenant by the [`Fingerprint`] of its
//! [`LabelSet`]. Fingerprints are persisted in the WAL, so the hash must be
//! deterministic across processes and restarts — [`FxHasher64`] is seedless,
//! which makes it safe to use as a durable identity.

use std::fmt;
use std::hash::Hasher;

use fxhash::FxHasher64;

/// Opaque 64-bit identity of a label set, unique within a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub u64);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<u64> for Fingerprint {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// A single label name/value pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
    /// Label name.
    pub name: String,
    /// Label value.
    pub value: String,
}

impl Label {
    /// Creates a label pair.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An ordered label set.
///
/// Pairs are kept sorted by name, so two sets with the same pairs compare
/// equal and produce the same fingerprint regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LabelSet(Vec<Label>);

impl LabelSet {
    /// Creates an empty label set.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Builds a label set from pairs, sorting them by name.
    #[must_use]
    pub fn from_pairs(mut pairs: Vec<Label>) -> Self {
        pairs.sort();
        Self(pairs)
    }

    /// Returns the pairs in sorted order.
    #[must_use]
    pub fn pairs(&self) -> &[Label] {
        &self.0
    }

    /// Returns the value for `name`, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.value.as_str())
    }

    /// Returns whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Computes the deterministic 64-bit fingerprint of this set.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = FxHasher64::default();
        for label in &self.0 {
            hasher.write(label.name.as_bytes());
            hasher.write_u8(0xff);
            hasher.write(label.value.as_bytes());
            hasher.write_u8(0xff);
        }
        Fingerprint(hasher.finish())
    }
}

impl fmt::Display for LabelSet {
    /// Canonical string form: `{a="1",b="2"}`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}={:?}", label.name, label.value)?;
        }
        write!(f, "}}")
    }
}

impl FromIterator<(String, String)> for LabelSet {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self::from_pairs(
            iter.into_iter()
                .map(|(name, value)| Label { name, value })
                .collect(),
        )
    }
}
