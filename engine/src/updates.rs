//! The update protocol: a serializable batch of sets and unsets.
//!
//! On the wire an [`Updates`] batch looks like
//!
//! ```json
//! { "$set": [{ "a.b": 1 }, { "c.0": "x" }], "$unset": [{ "d": "" }] }
//! ```
//!
//! Every entry is a single-key object mapping a path string to a value
//! (`$set`) or to the empty string (`$unset`). Either field may be absent; a
//! batch with neither field is empty.

use crate::{error::Result, Error, Path};
use serde::{de, ser::SerializeMap, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Marker value carried by every `$unset` entry.
pub const UNSET_MARKER: &str = "";

/// A single `$set` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Set {
    /// Target path in dotted form
    pub path: String,
    /// Value to write
    pub value: Value,
}

impl Set {
    /// Create a new set entry.
    pub fn new(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            value,
        }
    }
}

impl TryFrom<Map<String, Value>> for Set {
    type Error = Error;

    fn try_from(map: Map<String, Value>) -> Result<Self> {
        let mut entries = map.into_iter();
        match (entries.next(), entries.next()) {
            (Some((path, value)), None) => Ok(Set { path, value }),
            _ => Err(Error::InvalidUpdates(
                "$set entry must have exactly one key".into(),
            )),
        }
    }
}

impl Serialize for Set {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.path, &self.value)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for Set {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        Set::try_from(map).map_err(de::Error::custom)
    }
}

/// A single `$unset` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unset {
    /// Target path in dotted form
    pub path: String,
}

impl Unset {
    /// Create a new unset entry.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl TryFrom<Map<String, Value>> for Unset {
    type Error = Error;

    /// The marker value is ignored; only the key is meaningful.
    fn try_from(map: Map<String, Value>) -> Result<Self> {
        let mut keys = map.into_iter().map(|(path, _)| path);
        match (keys.next(), keys.next()) {
            (Some(path), None) => Ok(Unset { path }),
            _ => Err(Error::InvalidUpdates(
                "$unset entry must have exactly one key".into(),
            )),
        }
    }
}

impl Serialize for Unset {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.path, UNSET_MARKER)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for Unset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        Unset::try_from(map).map_err(de::Error::custom)
    }
}

/// A batch of writes and deletions against some document.
///
/// Field presence matters: `Some(vec![])` is not the same as `None`, see
/// [`is_empty_updates`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Updates {
    /// Writes, replayed in order
    #[serde(rename = "$set", default, skip_serializing_if = "Option::is_none")]
    pub set: Option<Vec<Set>>,
    /// Deletions, replayed in order after all writes
    #[serde(rename = "$unset", default, skip_serializing_if = "Option::is_none")]
    pub unset: Option<Vec<Unset>>,
}

impl Updates {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a `$set` entry.
    pub fn with_set(mut self, path: &Path, value: Value) -> Self {
        self.set
            .get_or_insert_with(Vec::new)
            .push(Set::new(path.to_string(), value));
        self
    }

    /// Append an `$unset` entry.
    pub fn with_unset(mut self, path: &Path) -> Self {
        self.unset
            .get_or_insert_with(Vec::new)
            .push(Unset::new(path.to_string()));
        self
    }

    /// All `$set` entries, empty if the field is absent.
    pub fn set_entries(&self) -> &[Set] {
        self.set.as_deref().unwrap_or_default()
    }

    /// All `$unset` entries, empty if the field is absent.
    pub fn unset_entries(&self) -> &[Unset] {
        self.unset.as_deref().unwrap_or_default()
    }

    /// Whether neither field is present.
    pub fn is_empty(&self) -> bool {
        is_empty_updates(self)
    }

    /// Parse a batch from its JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Render the batch as JSON text.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Replay `updates` against `target` in place: all sets in order, then all unsets.
///
/// There is no rollback. An invalid path aborts the replay and leaves
/// `target` partially mutated; callers needing atomicity apply to a copy.
pub fn apply_updates(target: &mut Value, updates: &Updates) -> Result<()> {
    tracing::debug!(
        sets = updates.set_entries().len(),
        unsets = updates.unset_entries().len(),
        "applying updates"
    );

    for entry in updates.set_entries() {
        tracing::trace!(path = %entry.path, "set");
        Path::compile(&entry.path)?.set(target, entry.value.clone())?;
    }
    for entry in updates.unset_entries() {
        tracing::trace!(path = %entry.path, "unset");
        Path::compile(&entry.path)?.unset(target)?;
    }
    Ok(())
}

/// Concatenate two batches, `a`'s entries first.
///
/// Overlapping paths are kept as they are; a field is present in the result
/// if it is present in either input.
pub fn merge_updates(a: &Updates, b: &Updates) -> Updates {
    fn concat<T: Clone>(a: &Option<Vec<T>>, b: &Option<Vec<T>>) -> Option<Vec<T>> {
        if a.is_none() && b.is_none() {
            return None;
        }
        let a = a.as_deref().unwrap_or_default();
        let b = b.as_deref().unwrap_or_default();
        Some(a.iter().chain(b).cloned().collect())
    }

    Updates {
        set: concat(&a.set, &b.set),
        unset: concat(&a.unset, &b.unset),
    }
}

/// Whether both `$set` and `$unset` are absent.
///
/// A batch with an empty but present field is not empty.
pub fn is_empty_updates(updates: &Updates) -> bool {
    updates.set.is_none() && updates.unset.is_none()
}
