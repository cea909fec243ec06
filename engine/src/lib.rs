//! # Pathwise Engine
//!
//! Path-addressed editing of JSON documents for UI editors.
//!
//! An editor addresses every value of the object it edits with a dotted
//! [`Path`], stages writes and deletions in an [`UpdateCollector`], and ships
//! the result as an [`Updates`] batch that any other party can replay with
//! [`apply_updates`]. Lists of entities are narrowed and ordered with the
//! [`filter`] and [`sort`] engines.
//!
//! ## Design Principles
//!
//! - **No IO**: The engine only sees in-memory `serde_json::Value` documents
//! - **Deterministic**: Replaying the same batch on the same document gives the same result
//! - **Portable**: The [`ffi`] layer exposes everything as JSON strings
//!
//! ## Core Concepts
//!
//! ### Paths
//!
//! `"a.b.0.c"` addresses `doc["a"]["b"][0]["c"]`. Numeric segments index
//! arrays, everything else is a property name, and `"."` is the identity path
//! addressing the whole document. Writing through a path creates missing
//! containers on the way.
//!
//! ### Updates
//!
//! A batch holds `$set` entries (path to value) and `$unset` entries
//! (path only). Sets are replayed before unsets.
//!
//! ### Collector
//!
//! The [`UpdateCollector`] keeps the pending batch minimal: a write at a
//! path drops everything previously staged at or beneath it. Its modified
//! flag is observable through [`UpdateCollector::subscribe`].
//!
//! ## Quick Start
//!
//! ```rust
//! use pathwise_engine::{apply_updates, Path, UpdateCollector};
//! use serde_json::json;
//!
//! let mut collector = UpdateCollector::new();
//! collector.set(Path::compile("profile.name").unwrap(), json!("Ada")).unwrap();
//! collector.set(Path::compile("tags.0").unwrap(), json!("admin")).unwrap();
//! collector.unset(Path::compile("legacy").unwrap()).unwrap();
//! assert!(collector.is_modified());
//!
//! let updates = collector.create_updates();
//!
//! let mut doc = json!({"legacy": true});
//! apply_updates(&mut doc, &updates).unwrap();
//! assert_eq!(doc, json!({"profile": {"name": "Ada"}, "tags": ["admin"]}));
//! ```
//!
//! ## Filtering and sorting
//!
//! ```rust
//! use pathwise_engine::{
//!     filter_entities, sort_entities, Criterion, Direction, OrderBy, Path, PrimitiveKind, Rule,
//! };
//! use serde_json::json;
//!
//! let mut people = vec![
//!     json!({"name": "Cy", "age": 41, "active": true}),
//!     json!({"name": "Bo", "age": 23, "active": false}),
//!     json!({"name": "Al", "age": 35, "active": true}),
//! ];
//!
//! let active = Criterion::leaf(Path::compile("active").unwrap(), Rule::booleans([Some(true)]));
//! assert_eq!(filter_entities(&people, &[active]).len(), 2);
//!
//! let by_age = OrderBy::primitive(
//!     PrimitiveKind::Number,
//!     Path::compile("age").unwrap(),
//!     Direction::Asc,
//! );
//! sort_entities(&mut people, &[by_age]);
//! assert_eq!(people[0]["name"], "Bo");
//! ```

pub mod collector;
pub mod datetime;
pub mod error;
pub mod ffi;
pub mod filter;
pub mod path;
pub mod signal;
pub mod sort;
pub mod updates;

// Re-export main types at crate root
pub use collector::{PendingSet, UpdateCollector};
pub use datetime::IsoDateTime;
pub use error::Error;
pub use filter::{accept_entity, filter_entities, AcceptFn, Criterion, ForeignFetch, Rule};
pub use path::{Path, Segment, IDENTITY, MAX_ARRAY_GAP};
pub use signal::{Signal, SubscriptionId};
pub use sort::{
    compare_entities, sort_entities, CompareFn, Direction, FieldOrder, OrderBy, PrimitiveKind,
};
pub use updates::{apply_updates, is_empty_updates, merge_updates, Set, Unset, Updates, UNSET_MARKER};
