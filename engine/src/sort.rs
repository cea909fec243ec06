//! Entity sort engine.
//!
//! An ordered list of [`OrderBy`] specs defines a lexicographic order over
//! entities: the first spec that tells two entities apart decides, later specs
//! only break ties.

use crate::{datetime::IsoDateTime, filter::ForeignFetch, Error, Path};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Caller supplied comparator over two extracted field values.
pub type CompareFn = Arc<dyn Fn(Option<&Value>, Option<&Value>) -> Ordering + Send + Sync>;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(Error::InvalidSpec(format!("unknown sort direction: {}", other))),
        }
    }
}

/// How a primitive field value is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    /// Text order of the value's string form
    String,
    /// Numeric order
    Number,
    /// `false` before `true`
    Boolean,
    /// Chronological order of ISO-8601 strings
    Date,
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveKind::String => write!(f, "string"),
            PrimitiveKind::Number => write!(f, "number"),
            PrimitiveKind::Boolean => write!(f, "boolean"),
            PrimitiveKind::Date => write!(f, "date"),
        }
    }
}

impl FromStr for PrimitiveKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "string" => Ok(PrimitiveKind::String),
            "number" => Ok(PrimitiveKind::Number),
            "boolean" => Ok(PrimitiveKind::Boolean),
            "date" => Ok(PrimitiveKind::Date),
            other => Err(Error::InvalidSpec(format!("unknown value kind: {}", other))),
        }
    }
}

/// Ordering by one field of the entity.
#[derive(Clone)]
pub enum FieldOrder {
    Primitive {
        kind: PrimitiveKind,
        path: Path,
        direction: Direction,
    },
    Function {
        path: Path,
        compare: CompareFn,
        direction: Direction,
    },
}

impl FieldOrder {
    /// Order by the value at `path`, compared as `kind`.
    pub fn primitive(kind: PrimitiveKind, path: Path, direction: Direction) -> Self {
        FieldOrder::Primitive {
            kind,
            path,
            direction,
        }
    }

    /// Order by the value at `path` using a caller comparator.
    pub fn function<F>(path: Path, compare: F, direction: Direction) -> Self
    where
        F: Fn(Option<&Value>, Option<&Value>) -> Ordering + Send + Sync + 'static,
    {
        FieldOrder::Function {
            path,
            compare: Arc::new(compare),
            direction,
        }
    }

    /// Compare two entities by this field.
    ///
    /// A null entity sorts after any other entity regardless of the field.
    /// The direction applies to the whole result.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let (path, direction) = match self {
            FieldOrder::Primitive {
                path, direction, ..
            }
            | FieldOrder::Function {
                path, direction, ..
            } => (path, *direction),
        };

        let ordering = match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let (a, b) = (path.get(a), path.get(b));
                match self {
                    FieldOrder::Primitive { kind, .. } => compare_primitive(*kind, a, b),
                    FieldOrder::Function { compare, .. } => compare(a, b),
                }
            }
        };
        direction.apply(ordering)
    }
}

impl fmt::Debug for FieldOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldOrder::Primitive {
                kind,
                path,
                direction,
            } => f
                .debug_struct("Primitive")
                .field("kind", kind)
                .field("path", &path.to_string())
                .field("direction", direction)
                .finish(),
            FieldOrder::Function {
                path, direction, ..
            } => f
                .debug_struct("Function")
                .field("path", &path.to_string())
                .field("direction", direction)
                .finish_non_exhaustive(),
        }
    }
}

/// One comparator spec of an order-by list.
#[derive(Clone)]
pub enum OrderBy {
    /// Order by a field of the entity itself
    Field(FieldOrder),
    /// Resolve the key at `path` through `fetch`, then order the related
    /// entities by `order`. Unresolved keys on either side compare as equal.
    Foreign {
        path: Path,
        fetch: ForeignFetch,
        order: FieldOrder,
    },
}

impl OrderBy {
    /// Shorthand for a [`FieldOrder::primitive`] spec.
    pub fn primitive(kind: PrimitiveKind, path: Path, direction: Direction) -> Self {
        OrderBy::Field(FieldOrder::primitive(kind, path, direction))
    }

    /// Shorthand for a [`FieldOrder::function`] spec.
    pub fn function<F>(path: Path, compare: F, direction: Direction) -> Self
    where
        F: Fn(Option<&Value>, Option<&Value>) -> Ordering + Send + Sync + 'static,
    {
        OrderBy::Field(FieldOrder::function(path, compare, direction))
    }

    /// Order by the related entities `fetch` resolves from the keys at `path`.
    pub fn foreign<F>(path: Path, fetch: F, order: FieldOrder) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        OrderBy::Foreign {
            path,
            fetch: Arc::new(fetch),
            order,
        }
    }

    /// Compare two entities by this spec alone.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        match self {
            OrderBy::Field(order) => order.compare(a, b),
            OrderBy::Foreign { path, fetch, order } => {
                let resolve = |entity: &Value| {
                    path.get(entity)
                        .filter(|key| !key.is_null())
                        .and_then(|key| fetch(key))
                };
                match (resolve(a), resolve(b)) {
                    (Some(a), Some(b)) => order.compare(&a, &b),
                    _ => Ordering::Equal,
                }
            }
        }
    }
}

impl fmt::Debug for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderBy::Field(order) => f.debug_tuple("Field").field(order).finish(),
            OrderBy::Foreign { path, order, .. } => f
                .debug_struct("Foreign")
                .field("path", &path.to_string())
                .field("order", order)
                .finish_non_exhaustive(),
        }
    }
}

/// Missing and null values sort after present ones. Dates that fail to
/// parse count as missing. Numbers and booleans sort before values of another
/// type, which fall back to text order among themselves.
fn compare_primitive(kind: PrimitiveKind, a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());

    match kind {
        PrimitiveKind::String => present_first(a, b, |a, b| text(a).cmp(&text(b))),
        PrimitiveKind::Number => present_first(a, b, |a, b| match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => text(a).cmp(&text(b)),
        }),
        PrimitiveKind::Boolean => present_first(a, b, |a, b| match (a.as_bool(), b.as_bool()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => text(a).cmp(&text(b)),
        }),
        PrimitiveKind::Date => present_first(
            a.and_then(IsoDateTime::from_value),
            b.and_then(IsoDateTime::from_value),
            |x, y| x.instant.cmp(&y.instant),
        ),
    }
}

fn present_first<T>(
    a: Option<T>,
    b: Option<T>,
    compare: impl FnOnce(T, T) -> Ordering,
) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => compare(a, b),
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Compare two entities by the order-by list. An empty list orders nothing.
pub fn compare_entities(a: &Value, b: &Value, order_by: &[OrderBy]) -> Ordering {
    order_by
        .iter()
        .map(|spec| spec.compare(a, b))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Stable in-place sort by the order-by list.
///
/// Function comparators and foreign specs with unresolved keys need not form
/// a total order. Such input never panics; the result is then a best-effort
/// order that still holds every entity exactly once.
pub fn sort_entities(entities: &mut [Value], order_by: &[OrderBy]) {
    if entities.len() < 2 || order_by.is_empty() {
        return;
    }

    let order = merge_sort_indices(entities.len(), |a, b| {
        compare_entities(&entities[a], &entities[b], order_by)
    });

    let mut taken: Vec<Value> = entities.iter_mut().map(std::mem::take).collect();
    for (slot, index) in entities.iter_mut().zip(order) {
        *slot = std::mem::take(&mut taken[index]);
    }
}

/// Bottom-up merge sort over `0..len`. Each merge step consults `compare`
/// once per emitted index, so an inconsistent comparator cannot derail it.
fn merge_sort_indices<F>(len: usize, mut compare: F) -> Vec<usize>
where
    F: FnMut(usize, usize) -> Ordering,
{
    let mut order: Vec<usize> = (0..len).collect();
    let mut merged = vec![0; len];
    let mut width = 1;
    while width < len {
        for start in (0..len).step_by(2 * width) {
            let mid = (start + width).min(len);
            let end = (start + 2 * width).min(len);
            let (mut left, mut right) = (start, mid);
            for slot in &mut merged[start..end] {
                // right wins only when strictly smaller, keeping the sort stable
                let take_right = left == mid
                    || (right < end && compare(order[right], order[left]).is_lt());
                if take_right {
                    *slot = order[right];
                    right += 1;
                } else {
                    *slot = order[left];
                    left += 1;
                }
            }
        }
        std::mem::swap(&mut order, &mut merged);
        width *= 2;
    }
    order
}
