//! Entity filter engine.
//!
//! A filter is a tree of [`Criterion`] nodes evaluated against a JSON entity.
//! Leaves read a value through a [`Path`] and test it with a [`Rule`]; foreign
//! leaves first resolve the value as a key into a related entity and test a
//! second path on that entity instead.

use crate::{datetime::IsoDateTime, Path};
use chrono::NaiveDate;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Resolves a locally stored key to the related entity, if any.
pub type ForeignFetch = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Caller supplied acceptance test. Receives `None` for a missing value.
pub type AcceptFn = Arc<dyn Fn(Option<&Value>) -> bool + Send + Sync>;

/// The test a leaf criterion applies to the value it reads.
///
/// For the list rules, a `None` entry matches a missing or null value and
/// nothing else.
#[derive(Clone)]
pub enum Rule {
    /// Strictly equal to one of the strings
    String(Vec<Option<String>>),
    /// Numerically equal to one of the numbers
    Number(Vec<Option<f64>>),
    /// Equal to one of the booleans
    Boolean(Vec<Option<bool>>),
    /// An ISO-8601 string falling on one of the calendar dates
    Date(Vec<Option<NaiveDate>>),
    /// Whatever the function says
    Function(AcceptFn),
}

impl Rule {
    /// Accept string values equal to one of `values`; `None` matches a missing value.
    pub fn strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Rule::String(values.into_iter().map(|v| v.map(Into::into)).collect())
    }

    /// Accept numbers equal to one of `values`.
    pub fn numbers<I: IntoIterator<Item = Option<f64>>>(values: I) -> Self {
        Rule::Number(values.into_iter().collect())
    }

    /// Accept booleans equal to one of `values`.
    pub fn booleans<I: IntoIterator<Item = Option<bool>>>(values: I) -> Self {
        Rule::Boolean(values.into_iter().collect())
    }

    /// Accept ISO-8601 strings that fall on one of the calendar dates.
    pub fn dates<I: IntoIterator<Item = Option<NaiveDate>>>(values: I) -> Self {
        Rule::Date(values.into_iter().collect())
    }

    /// Accept whatever `accept` returns true for.
    pub fn function<F>(accept: F) -> Self
    where
        F: Fn(Option<&Value>) -> bool + Send + Sync + 'static,
    {
        Rule::Function(Arc::new(accept))
    }

    /// Test a value read from an entity.
    pub fn accepts(&self, value: Option<&Value>) -> bool {
        let present = value.filter(|v| !v.is_null());
        match self {
            Rule::String(allowed) => {
                any_match(allowed, present, |a, v| v.as_str() == Some(a.as_str()))
            }
            Rule::Number(allowed) => any_match(allowed, present, |a, v| v.as_f64() == Some(*a)),
            Rule::Boolean(allowed) => any_match(allowed, present, |a, v| v.as_bool() == Some(*a)),
            Rule::Date(allowed) => {
                let date = present.map(|v| IsoDateTime::from_value(v).map(|p| p.date));
                allowed.iter().any(|a| match (a, date) {
                    (None, None) => true,
                    (Some(a), Some(Some(date))) => *a == date,
                    _ => false,
                })
            }
            Rule::Function(accept) => accept(value),
        }
    }
}

fn any_match<T>(
    allowed: &[Option<T>],
    value: Option<&Value>,
    matches: impl Fn(&T, &Value) -> bool,
) -> bool {
    allowed.iter().any(|a| match (a, value) {
        (None, None) => true,
        (Some(a), Some(v)) => matches(a, v),
        _ => false,
    })
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::String(v) => f.debug_tuple("String").field(v).finish(),
            Rule::Number(v) => f.debug_tuple("Number").field(v).finish(),
            Rule::Boolean(v) => f.debug_tuple("Boolean").field(v).finish(),
            Rule::Date(v) => f.debug_tuple("Date").field(v).finish(),
            Rule::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// One node of a filter tree.
#[derive(Clone)]
pub enum Criterion {
    /// Accepts everything
    Any,
    /// Accepts if every child accepts; vacuously true
    And(Vec<Criterion>),
    /// Accepts if some child accepts; vacuously false
    Or(Vec<Criterion>),
    /// Tests the entity's value at `path`
    Leaf { path: Path, rule: Rule },
    /// Resolves the entity's value at `path` through `fetch` and tests the
    /// related entity's value at `foreign_path`
    Foreign {
        path: Path,
        fetch: ForeignFetch,
        foreign_path: Path,
        rule: Rule,
    },
}

impl Criterion {
    /// Apply `rule` to the entity value at `path`.
    pub fn leaf(path: Path, rule: Rule) -> Self {
        Criterion::Leaf { path, rule }
    }

    /// Resolve the key at `path` through `fetch`, then apply `rule` at
    /// `foreign_path` of the related entity.
    pub fn foreign<F>(path: Path, fetch: F, foreign_path: Path, rule: Rule) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        Criterion::Foreign {
            path,
            fetch: Arc::new(fetch),
            foreign_path,
            rule,
        }
    }

    /// Accept when every child accepts.
    pub fn and(criteria: Vec<Criterion>) -> Self {
        Criterion::And(criteria)
    }

    /// Accept when any child accepts.
    pub fn or(criteria: Vec<Criterion>) -> Self {
        Criterion::Or(criteria)
    }

    /// Evaluate this criterion against `entity`.
    pub fn accepts(&self, entity: &Value) -> bool {
        match self {
            Criterion::Any => true,
            Criterion::And(criteria) => criteria.iter().all(|c| c.accepts(entity)),
            Criterion::Or(criteria) => criteria.iter().any(|c| c.accepts(entity)),
            Criterion::Leaf { path, rule } => rule.accepts(path.get(entity)),
            Criterion::Foreign {
                path,
                fetch,
                foreign_path,
                rule,
            } => {
                let related = path
                    .get(entity)
                    .filter(|key| !key.is_null())
                    .and_then(|key| fetch(key));
                rule.accepts(related.as_ref().and_then(|r| foreign_path.get(r)))
            }
        }
    }
}

impl fmt::Debug for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Any => f.write_str("Any"),
            Criterion::And(c) => f.debug_tuple("And").field(c).finish(),
            Criterion::Or(c) => f.debug_tuple("Or").field(c).finish(),
            Criterion::Leaf { path, rule } => f
                .debug_struct("Leaf")
                .field("path", &path.to_string())
                .field("rule", rule)
                .finish(),
            Criterion::Foreign {
                path,
                foreign_path,
                rule,
                ..
            } => f
                .debug_struct("Foreign")
                .field("path", &path.to_string())
                .field("foreign_path", &foreign_path.to_string())
                .field("rule", rule)
                .finish_non_exhaustive(),
        }
    }
}

/// Whether `entity` passes every criterion in the list.
pub fn accept_entity(entity: &Value, criteria: &[Criterion]) -> bool {
    criteria.iter().all(|c| c.accepts(entity))
}

/// Keep the entities that pass every criterion, in their original order.
pub fn filter_entities<'a>(entities: &'a [Value], criteria: &[Criterion]) -> Vec<&'a Value> {
    entities
        .iter()
        .filter(|entity| accept_entity(entity, criteria))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn path(text: &str) -> Path {
        Path::compile(text).unwrap()
    }

    fn string(p: &str, values: &[Option<&str>]) -> Criterion {
        Criterion::leaf(path(p), Rule::strings(values.iter().copied()))
    }

    fn owners() -> impl Fn(&Value) -> Option<Value> + Send + Sync + 'static {
        let table: HashMap<String, Value> = [
            ("u1".to_string(), json!({"name": "Alice", "active": true, "born": "1990-05-04"})),
            ("u2".to_string(), json!({"name": "Bob", "active": false})),
        ]
        .into_iter()
        .collect();
        move |key: &Value| key.as_str().and_then(|k| table.get(k).cloned())
    }

    #[test]
    fn empty_criteria_accept_everything() {
        assert!(accept_entity(&json!({}), &[]));
        assert!(accept_entity(&json!(null), &[]));
        assert!(Criterion::and(vec![]).accepts(&json!({"a": 1})));
    }

    #[test]
    fn empty_or_rejects_everything() {
        assert!(!Criterion::or(vec![]).accepts(&json!({})));
        assert!(!accept_entity(&json!({"a": 1}), &[Criterion::or(vec![])]));
    }

    #[test]
    fn any_accepts() {
        assert!(Criterion::Any.accepts(&json!({"a": 1})));
        assert!(Criterion::or(vec![Criterion::Any]).accepts(&json!(null)));
    }

    #[test]
    fn string_values() {
        let criterion = string("name", &[Some("Alice"), Some("Bob")]);
        assert!(criterion.accepts(&json!({"name": "Bob"})));
        assert!(!criterion.accepts(&json!({"name": "Carol"})));
        assert!(!criterion.accepts(&json!({})));
        // strict equality, no coercion
        assert!(!string("n", &[Some("5")]).accepts(&json!({"n": 5})));
    }

    #[test]
    fn null_matches_missing_only() {
        let criterion = string("name", &[None]);
        assert!(criterion.accepts(&json!({})));
        assert!(criterion.accepts(&json!({"name": null})));
        assert!(!criterion.accepts(&json!({"name": "x"})));
    }

    #[test]
    fn number_and_boolean_values() {
        let number = Criterion::leaf(path("n"), Rule::numbers([Some(1.0), Some(2.5)]));
        assert!(number.accepts(&json!({"n": 1})));
        assert!(number.accepts(&json!({"n": 2.5})));
        assert!(!number.accepts(&json!({"n": "1"})));

        let boolean = Criterion::leaf(path("b"), Rule::booleans([Some(true), None]));
        assert!(boolean.accepts(&json!({"b": true})));
        assert!(boolean.accepts(&json!({})));
        assert!(!boolean.accepts(&json!({"b": false})));
    }

    #[test]
    fn date_values_compare_calendar_day() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let criterion = Criterion::leaf(path("at"), Rule::dates([Some(day)]));
        assert!(criterion.accepts(&json!({"at": "2024-03-01"})));
        assert!(criterion.accepts(&json!({"at": "2024-03-01T23:59:59"})));
        assert!(!criterion.accepts(&json!({"at": "2024-03-02T00:00:00"})));
        assert!(!criterion.accepts(&json!({"at": "not a date"})));
        assert!(!criterion.accepts(&json!({})));

        let missing = Criterion::leaf(path("at"), Rule::dates([None]));
        assert!(missing.accepts(&json!({})));
        assert!(!missing.accepts(&json!({"at": "not a date"})));
    }

    #[test]
    fn function_rule() {
        let criterion = Criterion::leaf(
            path("tags"),
            Rule::function(|v| v.and_then(Value::as_array).is_some_and(|a| a.len() > 1)),
        );
        assert!(criterion.accepts(&json!({"tags": ["a", "b"]})));
        assert!(!criterion.accepts(&json!({"tags": ["a"]})));
        assert!(!criterion.accepts(&json!({})));
    }

    #[test]
    fn and_or_nesting() {
        let criterion = Criterion::and(vec![
            string("kind", &[Some("task")]),
            Criterion::or(vec![
                string("state", &[Some("open")]),
                Criterion::leaf(path("priority"), Rule::numbers([Some(1.0)])),
            ]),
        ]);
        assert!(criterion.accepts(&json!({"kind": "task", "state": "open"})));
        assert!(criterion.accepts(&json!({"kind": "task", "state": "done", "priority": 1})));
        assert!(!criterion.accepts(&json!({"kind": "task", "state": "done"})));
        assert!(!criterion.accepts(&json!({"kind": "note", "state": "open"})));
    }

    #[test]
    fn foreign_string() {
        let criterion = Criterion::foreign(
            path("owner"),
            owners(),
            path("name"),
            Rule::strings([Some("Alice")]),
        );
        assert!(criterion.accepts(&json!({"owner": "u1"})));
        assert!(!criterion.accepts(&json!({"owner": "u2"})));
        assert!(!criterion.accepts(&json!({"owner": "missing"})));
        assert!(!criterion.accepts(&json!({})));
    }

    #[test]
    fn foreign_unresolved_is_null() {
        let criterion = Criterion::foreign(
            path("owner"),
            owners(),
            path("name"),
            Rule::strings::<_, String>([None]),
        );
        assert!(criterion.accepts(&json!({"owner": "missing"})));
        assert!(criterion.accepts(&json!({})));
        assert!(!criterion.accepts(&json!({"owner": "u1"})));
    }

    #[test]
    fn foreign_boolean_date_and_function() {
        let active = Criterion::foreign(
            path("owner"),
            owners(),
            path("active"),
            Rule::booleans([Some(false)]),
        );
        assert!(active.accepts(&json!({"owner": "u2"})));
        assert!(!active.accepts(&json!({"owner": "u1"})));

        let born = Criterion::foreign(
            path("owner"),
            owners(),
            path("born"),
            Rule::dates([NaiveDate::from_ymd_opt(1990, 5, 4)]),
        );
        assert!(born.accepts(&json!({"owner": "u1"})));
        assert!(!born.accepts(&json!({"owner": "u2"})));

        let named = Criterion::foreign(
            path("owner"),
            owners(),
            path("name"),
            Rule::function(|v| v.and_then(Value::as_str).is_some_and(|n| n.starts_with('B'))),
        );
        assert!(named.accepts(&json!({"owner": "u2"})));
        assert!(!named.accepts(&json!({"owner": "u1"})));
    }

    #[test]
    fn filter_keeps_order() {
        let entities = vec![
            json!({"id": 1, "kind": "a"}),
            json!({"id": 2, "kind": "b"}),
            json!({"id": 3, "kind": "a"}),
        ];
        let kept = filter_entities(&entities, &[string("kind", &[Some("a")])]);
        assert_eq!(kept, vec![&entities[0], &entities[2]]);
    }

    #[test]
    fn debug_hides_closures() {
        let criterion = Criterion::leaf(path("a"), Rule::function(|_| true));
        assert_eq!(
            format!("{:?}", criterion),
            "Leaf { path: \"a\", rule: Function(..) }"
        );
    }
}
