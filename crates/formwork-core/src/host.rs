//! In-memory host tree.
//!
//! A stand-in for the real rendered tree: it keeps mounted controls in an
//! arena, delivers input/blur events to the sink the form attached, and
//! simulates control removal so the registry's removal cascade can be
//! exercised without any UI. Demos and the test suite mount controls
//! here; production embeddings supply their own [`EventBinder`] and
//! [`RemovalObserver`].

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use slotmap::{SlotMap, new_key_type};

use crate::control::ControlHandle;
use crate::hooks::{Disposer, EventBinder, EventSink, FieldEvent, RemovalObserver};
use crate::validate::EventKind;

new_key_type! {
    pub struct ControlKey;
}

struct RemovalWatch {
    cancelled: Rc<Cell<bool>>,
    on_removed: Box<dyn FnOnce()>,
}

struct Mounted {
    handle: ControlHandle,
    sink: Option<EventSink>,
    blur_only: bool,
    watchers: Vec<RemovalWatch>,
}

#[derive(Clone)]
pub struct InMemoryHost {
    inner: Rc<RefCell<SlotMap<ControlKey, Mounted>>>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SlotMap::with_key())),
        }
    }

    pub fn mount(&self, handle: &ControlHandle) -> ControlKey {
        if let Some(key) = self.key_of(handle) {
            return key;
        }
        self.inner.borrow_mut().insert(Mounted {
            handle: handle.clone(),
            sink: None,
            blur_only: false,
            watchers: Vec::new(),
        })
    }

    fn key_of(&self, handle: &ControlHandle) -> Option<ControlKey> {
        self.inner
            .borrow()
            .iter()
            .find(|(_, m)| m.handle.ptr_eq(handle))
            .map(|(key, _)| key)
    }

    /// Tear one control out of the tree, firing its removal watchers.
    /// Watchers run after the arena borrow is released; they are expected
    /// to re-enter the host (the form detaches listeners while
    /// unregistering).
    pub fn remove(&self, handle: &ControlHandle) {
        let Some(key) = self.key_of(handle) else {
            return;
        };
        let mounted = self.inner.borrow_mut().remove(key);
        if let Some(mounted) = mounted {
            for watch in mounted.watchers {
                if !watch.cancelled.get() {
                    (watch.on_removed)();
                }
            }
        }
    }

    /// Remove every mounted control carrying `name`.
    pub fn remove_by_name(&self, name: &str) {
        let handles: Vec<ControlHandle> = self
            .inner
            .borrow()
            .iter()
            .filter(|(_, m)| m.handle.name() == name)
            .map(|(_, m)| m.handle.clone())
            .collect();
        for handle in handles {
            self.remove(&handle);
        }
    }

    /// Deliver a control event for `name`. Returns the sink's future for
    /// the caller to drive, or `None` when nothing is listening (unknown
    /// name, or an input event on a blur-only binding).
    pub fn fire(&self, name: &str, kind: EventKind) -> Option<LocalBoxFuture<'static, ()>> {
        let sink = {
            let arena = self.inner.borrow();
            arena.iter().find_map(|(_, m)| {
                if m.handle.name() != name {
                    return None;
                }
                let sink = m.sink.clone()?;
                if m.blur_only && kind == EventKind::Input {
                    return None;
                }
                Some(sink)
            })
        };
        sink.map(|sink| {
            sink(FieldEvent {
                name: name.to_string(),
                kind,
            })
        })
    }

    pub fn is_mounted(&self, handle: &ControlHandle) -> bool {
        self.key_of(handle).is_some()
    }
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBinder for InMemoryHost {
    fn attach(&self, control: &ControlHandle, sink: EventSink, blur_only: bool) {
        let key = self.mount(control);
        let mut arena = self.inner.borrow_mut();
        if let Some(mounted) = arena.get_mut(key) {
            mounted.sink = Some(sink);
            mounted.blur_only = blur_only;
        }
    }

    fn detach(&self, control: &ControlHandle) {
        let Some(key) = self.key_of(control) else {
            return;
        };
        if let Some(mounted) = self.inner.borrow_mut().get_mut(key) {
            mounted.sink = None;
        }
    }
}

impl RemovalObserver for InMemoryHost {
    fn observe(&self, control: &ControlHandle, on_removed: Box<dyn FnOnce()>) -> Disposer {
        let key = self.mount(control);
        let cancelled = Rc::new(Cell::new(false));
        if let Some(mounted) = self.inner.borrow_mut().get_mut(key) {
            mounted.watchers.push(RemovalWatch {
                cancelled: cancelled.clone(),
                on_removed,
            });
        }
        Disposer::new(move || cancelled.set(true))
    }
}
