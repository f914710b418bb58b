use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::identity::strip_storage_prefix;

/// A typed reference to another document.
///
/// On the wire and in storage a reference is a bare ID string; the type
/// parameter only exists at the domain layer so that code scanning for
/// references to a `ThresholdProfile` cannot accidentally compare against a
/// `Card` ID.
pub struct Ref<T> {
    id: String,
    _target: PhantomData<fn() -> T>,
}

impl<T> Ref<T> {
    /// Reference the document with the given ID. A `<datatype>_2_` storage
    /// prefix is stripped so that references compare by bare ID.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self {
            id: strip_storage_prefix(id.as_ref()).to_string(),
            _target: PhantomData,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns `true` if this reference points at `id` (prefix-insensitive).
    pub fn points_to(&self, id: &str) -> bool {
        !self.id.is_empty() && self.id == strip_storage_prefix(id)
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            _target: PhantomData,
        }
    }
}

impl<T> Default for Ref<T> {
    fn default() -> Self {
        Self {
            id: String::new(),
            _target: PhantomData,
        }
    }
}

impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Ref<T> {}

impl<T> Hash for Ref<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref({})", self.id)
    }
}

impl<T> fmt::Display for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl<T> Serialize for Ref<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.id)
    }
}

impl<'de, T> Deserialize<'de> for Ref<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = String::deserialize(deserializer)?;
        Ok(Self::new(id))
    }
}
