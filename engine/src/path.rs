//! Object paths - compiled addresses into nested JSON documents.
//!
//! A path is written as dot-separated segments: `a.b.1.c` addresses the
//! property `c` of the second element of the array `b` inside `a`. Tokens made
//! only of digits address array positions, anything else addresses a property.
//! The literal `.` is the identity path, which addresses the whole document.
//!
//! Keys containing a literal `.` cannot be expressed; there is no escaping.

use crate::{error::Result, Error};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Text form of the identity path.
pub const IDENTITY: &str = ".";

/// Largest number of null slots a single array write may pad before its index.
pub const MAX_ARRAY_GAP: usize = 10_000;

/// One addressing step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Named field access
    Property(String),
    /// Positional array access
    Index(usize),
    /// The whole value; only valid as the sole segment of a path
    Identity,
}

impl Segment {
    /// Classify a single token of a dotted path.
    fn parse(token: &str) -> Option<Self> {
        if token.is_empty() {
            return None;
        }
        if token.bytes().all(|b| b.is_ascii_digit()) {
            return token.parse().ok().map(Segment::Index);
        }
        Some(Segment::Property(token.to_string()))
    }

    /// Whether two segments address the same step.
    pub fn is_same(&self, other: &Segment) -> bool {
        self == other
    }

    fn get<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        match self {
            Segment::Property(key) => value.as_object()?.get(key),
            Segment::Index(index) => value.as_array()?.get(*index),
            Segment::Identity => Some(value),
        }
    }

    fn get_mut<'a>(&self, value: &'a mut Value) -> Option<&'a mut Value> {
        match self {
            Segment::Property(key) => value.as_object_mut()?.get_mut(key),
            Segment::Index(index) => value.as_array_mut()?.get_mut(*index),
            Segment::Identity => Some(value),
        }
    }

    /// The empty container a write through this segment needs as its parent.
    fn empty_container(&self) -> Value {
        match self {
            Segment::Property(_) => Value::Object(serde_json::Map::new()),
            Segment::Index(_) => Value::Array(Vec::new()),
            Segment::Identity => Value::Null,
        }
    }

    /// Descend into `value`, creating the child container when it is missing or null.
    ///
    /// `next` is the segment that will be applied to the child and decides
    /// which kind of container gets created.
    fn vivify<'a>(&self, value: &'a mut Value, next: &Segment) -> Result<Option<&'a mut Value>> {
        match self {
            Segment::Property(key) => {
                let Some(object) = value.as_object_mut() else {
                    return Ok(None);
                };
                let child = object.entry(key.clone()).or_insert(Value::Null);
                if child.is_null() {
                    *child = next.empty_container();
                }
                Ok(Some(child))
            }
            Segment::Index(index) => {
                let Some(array) = value.as_array_mut() else {
                    return Ok(None);
                };
                if *index < array.len() {
                    if array[*index].is_null() {
                        array[*index] = next.empty_container();
                    }
                } else {
                    pad_to(array, *index)?;
                    array.push(next.empty_container());
                }
                Ok(array.get_mut(*index))
            }
            Segment::Identity => Ok(Some(value)),
        }
    }

    /// Write `new_value` through this segment. Writes into a value of the
    /// wrong shape are silently dropped.
    fn set(&self, value: &mut Value, new_value: Value) -> Result<()> {
        match self {
            Segment::Property(key) => {
                if let Some(object) = value.as_object_mut() {
                    object.insert(key.clone(), new_value);
                }
            }
            Segment::Index(index) => {
                if let Some(array) = value.as_array_mut() {
                    if *index < array.len() {
                        array[*index] = new_value;
                    } else {
                        // arrays only grow by appending, gaps are null
                        pad_to(array, *index)?;
                        array.push(new_value);
                    }
                }
            }
            Segment::Identity => {
                return Err(Error::InvalidOperation("cannot set identity path".into()));
            }
        }
        Ok(())
    }

    fn unset(&self, value: &mut Value) -> Result<()> {
        match self {
            Segment::Property(key) => {
                if let Some(object) = value.as_object_mut() {
                    object.shift_remove(key);
                }
            }
            Segment::Index(index) => {
                if let Some(array) = value.as_array_mut() {
                    if *index < array.len() {
                        array.remove(*index);
                    }
                }
            }
            Segment::Identity => {
                return Err(Error::InvalidOperation("cannot unset identity path".into()));
            }
        }
        Ok(())
    }
}

/// Pad `array` with nulls up to `index`, refusing gaps wider than [`MAX_ARRAY_GAP`].
fn pad_to(array: &mut Vec<Value>, index: usize) -> Result<()> {
    let gap = index - array.len();
    if gap > MAX_ARRAY_GAP {
        return Err(Error::InvalidOperation(format!(
            "array index {} is {} slots past the end (limit {})",
            index, gap, MAX_ARRAY_GAP
        )));
    }
    array.resize(index, Value::Null);
    Ok(())
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Property(key) => f.write_str(key),
            Segment::Index(index) => write!(f, "{}", index),
            Segment::Identity => f.write_str(IDENTITY),
        }
    }
}

/// An immutable, compiled object path.
///
/// A path is a (possibly empty) prefix of segments followed by exactly one
/// terminal segment. [`Segment::Identity`] only ever appears as the terminal
/// of a path with an empty prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    prefix: Vec<Segment>,
    terminal: Segment,
}

impl Path {
    /// Compile a dotted path string.
    ///
    /// `"."` compiles to the identity path. Any empty token (including the
    /// empty string itself) is rejected with [`Error::InvalidPath`], and so is
    /// an all-digit token too large for a `usize` array index.
    pub fn compile(text: &str) -> Result<Self> {
        if text == IDENTITY {
            return Ok(Self::identity());
        }

        let mut segments = text
            .split('.')
            .map(|token| Segment::parse(token).ok_or_else(|| Error::InvalidPath(text.to_string())))
            .collect::<Result<Vec<_>>>()?;

        let terminal = segments
            .pop()
            .ok_or_else(|| Error::InvalidPath(text.to_string()))?;

        Ok(Self {
            prefix: segments,
            terminal,
        })
    }

    /// The path addressing the whole document.
    pub fn identity() -> Self {
        Self {
            prefix: Vec::new(),
            terminal: Segment::Identity,
        }
    }

    /// Whether this is the identity path.
    pub fn is_identity(&self) -> bool {
        self.prefix.is_empty() && self.terminal == Segment::Identity
    }

    /// All non-identity segments, outermost first.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        let terminal = (!self.is_identity()).then_some(&self.terminal);
        self.prefix.iter().chain(terminal)
    }

    /// The last segment.
    pub fn terminal(&self) -> &Segment {
        &self.terminal
    }

    /// The enclosing path, or `None` for the identity path.
    ///
    /// The parent of a single-segment path is the identity path.
    pub fn parent(&self) -> Option<Self> {
        if self.is_identity() {
            return None;
        }
        let mut prefix = self.prefix.clone();
        Some(match prefix.pop() {
            Some(terminal) => Self { prefix, terminal },
            None => Self::identity(),
        })
    }

    /// Whether both paths address the same location.
    pub fn is_same(&self, other: &Path) -> bool {
        self.prefix.len() == other.prefix.len()
            && self
                .prefix
                .iter()
                .zip(&other.prefix)
                .all(|(a, b)| a.is_same(b))
            && self.terminal.is_same(&other.terminal)
    }

    /// Whether this path lies strictly beneath `parent`.
    ///
    /// Every non-identity path is a child of the identity path. The identity
    /// path is never a child of anything, not even itself.
    pub fn is_child_of(&self, parent: &Path) -> bool {
        if self.is_identity() {
            return false;
        }
        if parent.is_identity() {
            return true;
        }
        if parent.prefix.len() >= self.prefix.len() {
            return false;
        }
        parent
            .prefix
            .iter()
            .zip(&self.prefix)
            .all(|(a, b)| a.is_same(b))
            && parent.terminal.is_same(&self.prefix[parent.prefix.len()])
    }

    /// Whether this path is `other` or lies beneath it.
    pub fn is_child_of_or_same(&self, other: &Path) -> bool {
        if other.is_identity() {
            return true;
        }
        if other.prefix.len() > self.prefix.len() {
            return false;
        }
        self.is_same(other) || self.is_child_of(other)
    }

    /// Concatenate `subpath` onto this path.
    ///
    /// Identity on either side contributes no segments.
    pub fn append(&self, subpath: &Path) -> Path {
        if subpath.is_identity() {
            return self.clone();
        }
        if self.is_identity() {
            return subpath.clone();
        }
        let mut prefix = Vec::with_capacity(self.prefix.len() + 1 + subpath.prefix.len());
        prefix.extend(self.prefix.iter().cloned());
        prefix.push(self.terminal.clone());
        prefix.extend(subpath.prefix.iter().cloned());
        Path {
            prefix,
            terminal: subpath.terminal.clone(),
        }
    }

    /// Read the value at this path. Missing intermediates yield `None`.
    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let parent = self
            .prefix
            .iter()
            .try_fold(root, |value, segment| segment.get(value))?;
        self.terminal.get(parent)
    }

    /// Mutable variant of [`Path::get`]. Never creates intermediates.
    pub fn get_mut<'a>(&self, root: &'a mut Value) -> Option<&'a mut Value> {
        let parent = self
            .prefix
            .iter()
            .try_fold(root, |value, segment| segment.get_mut(value))?;
        self.terminal.get_mut(parent)
    }

    /// Write `value` at this path, creating missing intermediate containers.
    ///
    /// A missing or null intermediate is replaced by an empty object or array,
    /// chosen by the kind of the segment that follows it. Array writes past the
    /// end pad the gap with nulls. A gap wider than [`MAX_ARRAY_GAP`] fails
    /// with [`Error::InvalidOperation`]; intermediates created before the
    /// failing segment stay in place. Writing through the identity path fails
    /// with [`Error::InvalidOperation`] and leaves `root` untouched.
    pub fn set(&self, root: &mut Value, value: Value) -> Result<()> {
        if self.is_identity() {
            return self.terminal.set(root, value);
        }

        let mut current = root;
        for (i, segment) in self.prefix.iter().enumerate() {
            let next = self.prefix.get(i + 1).unwrap_or(&self.terminal);
            current = match segment.vivify(current, next)? {
                Some(child) => child,
                None => return Ok(()),
            };
        }
        self.terminal.set(current, value)
    }

    /// Remove the value at this path.
    ///
    /// Removing an array element shifts the following elements down. Missing
    /// intermediates make this a no-op. Unsetting the identity path fails
    /// with [`Error::InvalidOperation`].
    pub fn unset(&self, root: &mut Value) -> Result<()> {
        if self.is_identity() {
            return self.terminal.unset(root);
        }

        let parent = self
            .prefix
            .iter()
            .try_fold(root, |value, segment| segment.get_mut(value));
        match parent {
            Some(parent) if !parent.is_null() => self.terminal.unset(parent),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_identity() {
            return f.write_str(IDENTITY);
        }
        for segment in &self.prefix {
            write!(f, "{}.", segment)?;
        }
        write!(f, "{}", self.terminal)
    }
}

impl FromStr for Path {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Path::compile(s)
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Path::compile(&text).map_err(serde::de::Error::custom)
    }
}
