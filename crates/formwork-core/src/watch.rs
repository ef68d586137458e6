//! Watch bookkeeping: which names a caller observes, and resolution of
//! watched values against the live snapshot.

use std::cell::{Cell, RefCell};

use indexmap::IndexSet;
use serde_json::Value;

use crate::values::{FieldValues, combine_field_values, get_path, parse_path};

#[derive(Default)]
pub struct WatchRegistry {
    watched: RefCell<IndexSet<String>>,
    watch_all: Cell<bool>,
}

impl WatchRegistry {
    /// True when an event for `name` must force a render regardless of
    /// other gating.
    pub fn is_watching(&self, name: &str) -> bool {
        self.watch_all.get() || self.watched.borrow().contains(name)
    }

    pub fn is_watching_all(&self) -> bool {
        self.watch_all.get()
    }

    pub fn mark_all(&self) {
        self.watch_all.set(true);
    }

    /// Mark `name` watched and resolve its live value: an exact key in the
    /// flat snapshot, or a nested subtree when the name prefixes path-style
    /// keys (`phones` resolving `phones[0]`, `phones[1]`).
    pub fn resolve(&self, values: &FieldValues, name: &str) -> Option<Value> {
        self.watched.borrow_mut().insert(name.to_string());

        if let Some(v) = values.get(name) {
            return Some(v.clone());
        }
        let has_nested = values
            .keys()
            .any(|key| key.starts_with(&format!("{name}.")) || key.starts_with(&format!("{name}[")));
        if !has_nested {
            return None;
        }
        get_path(&combine_field_values(values), &parse_path(name))
    }

    pub fn remove(&self, name: &str) {
        self.watched.borrow_mut().shift_remove(name);
    }

    pub fn clear(&self) {
        self.watched.borrow_mut().clear();
        self.watch_all.set(false);
    }
}
