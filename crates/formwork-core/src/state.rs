//! Derived form state: touched/dirty/valid bookkeeping and the aggregate
//! snapshot handed to the rendering layer.

use bitflags::bitflags;
use indexmap::IndexSet;
use serde::Serialize;

bitflags! {
    /// Why a commit should notify the rendering layer. Accumulated at the
    /// single commit choke point; empty flags mean no render.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct RenderFlags: u8 {
        const DIRTY_CHANGED = 1 << 0;
        const FIRST_TOUCH   = 1 << 1;
        const ERROR_CHANGED = 1 << 2;
        const WATCHED       = 1 << 3;
        const VALUE_WRITTEN = 1 << 4;
    }
}

/// Name-keyed derived sets. `dirty` membership is always recomputed from
/// a value/default comparison, never toggled ad hoc.
#[derive(Default)]
pub struct StateTracker {
    pub touched: IndexSet<String>,
    pub dirty: IndexSet<String>,
    pub fields_with_validation: IndexSet<String>,
    pub valid_fields: IndexSet<String>,
    pub is_dirty: bool,
}

impl StateTracker {
    /// Record the recomputed dirtiness of `name` and refresh the
    /// aggregate flag. Returns whether set membership changed.
    pub fn set_dirty(&mut self, name: &str, is_dirty_now: bool) -> bool {
        let was = self.dirty.contains(name);
        if is_dirty_now {
            self.dirty.insert(name.to_string());
        } else {
            self.dirty.shift_remove(name);
        }
        self.is_dirty = !self.dirty.is_empty();
        was != is_dirty_now
    }

    /// Idempotent; returns true on first touch.
    pub fn touch(&mut self, name: &str) -> bool {
        self.touched.insert(name.to_string())
    }

    /// Cascade for one unregistered name.
    pub fn remove(&mut self, name: &str) {
        self.touched.shift_remove(name);
        self.dirty.shift_remove(name);
        self.fields_with_validation.shift_remove(name);
        self.valid_fields.shift_remove(name);
        self.is_dirty = !self.dirty.is_empty();
    }

    pub fn clear(&mut self) {
        self.touched.clear();
        self.dirty.clear();
        self.fields_with_validation.clear();
        self.valid_fields.clear();
        self.is_dirty = false;
    }
}

/// Read-only aggregate handed out by `Form::form_state`. Everything but
/// the submit counters is derived on each call. Serializable so hosts
/// can dump it into debug overlays or logs.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FormStateSnapshot {
    pub is_dirty: bool,
    pub is_submitted: bool,
    pub submit_count: u32,
    pub touched: Vec<String>,
    pub is_submitting: bool,
    pub is_valid: bool,
}
