//! Update collector - reduces a stream of edits to a minimal [`Updates`] batch.
//!
//! Every staged write supersedes earlier staged writes and deletions at the
//! same path or anywhere beneath it, so a path never appears twice and a
//! write to a parent drops everything staged for its children.
//! A [`Signal`] reports whether anything is pending after every mutating call.

use crate::{
    error::Result,
    signal::{Signal, SubscriptionId},
    updates::{Set, Unset},
    Error, Path, Updates,
};
use serde_json::Value;

/// A staged write.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSet {
    /// Where to write
    pub path: Path,
    /// What to write
    pub value: Value,
}

/// Stateful accumulator of sets and unsets, owned by a single editor.
#[derive(Debug, Default)]
pub struct UpdateCollector {
    sets: Vec<PendingSet>,
    unsets: Vec<Path>,
    modified: Signal<bool>,
}

impl UpdateCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a write of `value` at `path`.
    ///
    /// Staged entries at `path` or beneath it are dropped first. The identity
    /// path cannot be staged.
    pub fn set(&mut self, path: Path, value: Value) -> Result<()> {
        if path.is_identity() {
            return Err(Error::InvalidOperation("cannot set identity path".into()));
        }
        self.remove_subpaths(&path);
        self.sets.push(PendingSet { path, value });
        self.update_modified();
        Ok(())
    }

    /// Stage a deletion at `path`, with the same supersession rule as [`set`](Self::set).
    pub fn unset(&mut self, path: Path) -> Result<()> {
        if path.is_identity() {
            return Err(Error::InvalidOperation("cannot unset identity path".into()));
        }
        self.remove_subpaths(&path);
        self.unsets.push(path);
        self.update_modified();
        Ok(())
    }

    /// Replay an incoming batch as individual [`set`](Self::set) and
    /// [`unset`](Self::unset) calls: all `$set` entries, then all `$unset` entries.
    ///
    /// An invalid path stops the replay; entries before it stay staged.
    pub fn merge(&mut self, updates: &Updates) -> Result<()> {
        tracing::debug!(
            sets = updates.set_entries().len(),
            unsets = updates.unset_entries().len(),
            "merging updates into collector"
        );
        for entry in updates.set_entries() {
            self.set(Path::compile(&entry.path)?, entry.value.clone())?;
        }
        for entry in updates.unset_entries() {
            self.unset(Path::compile(&entry.path)?)?;
        }
        Ok(())
    }

    /// Snapshot the pending entries as a batch, in staging order.
    ///
    /// A field is absent when nothing of its kind is pending, so an empty
    /// collector yields an empty batch.
    pub fn create_updates(&self) -> Updates {
        let set = (!self.sets.is_empty()).then(|| {
            self.sets
                .iter()
                .map(|s| Set::new(s.path.to_string(), s.value.clone()))
                .collect()
        });
        let unset = (!self.unsets.is_empty()).then(|| {
            self.unsets
                .iter()
                .map(|path| Unset::new(path.to_string()))
                .collect()
        });
        Updates { set, unset }
    }

    /// Drop everything pending.
    pub fn clear(&mut self) {
        self.sets.clear();
        self.unsets.clear();
        self.update_modified();
    }

    /// Whether anything is pending.
    pub fn is_modified(&self) -> bool {
        *self.modified.get()
    }

    /// Listen to the modified flag. The listener receives the current flag
    /// immediately and again after every `set`, `unset`, `merge` entry and `clear`.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&bool) + Send + Sync + 'static,
    {
        self.modified.subscribe(listener)
    }

    /// Stop a listener registered with [`subscribe`](Self::subscribe).
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.modified.unsubscribe(id)
    }

    /// Staged writes.
    pub fn pending_sets(&self) -> &[PendingSet] {
        &self.sets
    }

    /// Staged deletions.
    pub fn pending_unsets(&self) -> &[Path] {
        &self.unsets
    }

    /// Number of staged entries.
    pub fn len(&self) -> usize {
        self.sets.len() + self.unsets.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove_subpaths(&mut self, path: &Path) {
        let before = self.len();
        self.sets.retain(|s| !s.path.is_child_of_or_same(path));
        self.unsets.retain(|p| !p.is_child_of_or_same(path));
        let removed = before - self.len();
        if removed > 0 {
            tracing::debug!(%path, removed, "superseded staged entries");
        }
    }

    fn update_modified(&mut self) {
        let modified = !self.is_empty();
        self.modified.emit(modified);
    }
}
