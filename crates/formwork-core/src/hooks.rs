//! Collaborator seams between the engine and the host tree.
//!
//! The engine never attaches real event listeners or watches a real tree
//! for control removal; it talks to these traits. `host::InMemoryHost`
//! implements them for demos and tests.

use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::control::ControlHandle;
use crate::validate::EventKind;

/// Cancellation guard for an observed control; runs its cleanup when
/// dropped or explicitly disposed.
pub struct Disposer(Option<Box<dyn FnOnce()>>);

impl Disposer {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    pub fn noop() -> Self {
        Self(None)
    }

    pub fn dispose(mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

/// A control event as delivered by the host.
#[derive(Clone, Debug)]
pub struct FieldEvent {
    pub name: String,
    pub kind: EventKind,
}

/// Where the host delivers control events. The returned future is driven
/// by whoever dispatched the event; the engine stays executor-free.
pub type EventSink = Rc<dyn Fn(FieldEvent) -> LocalBoxFuture<'static, ()>>;

/// Attaches/detaches low-level input listeners on a control. With
/// `blur_only` the host only needs to deliver blur events.
pub trait EventBinder {
    fn attach(&self, control: &ControlHandle, sink: EventSink, blur_only: bool);
    fn detach(&self, control: &ControlHandle);
}

/// Observes a control's removal from the host tree. The callback fires at
/// most once; disposing the guard cancels the observation.
pub trait RemovalObserver {
    fn observe(&self, control: &ControlHandle, on_removed: Box<dyn FnOnce()>) -> Disposer;
}

/// Injected capabilities. Every hook is optional; an absent hook is a
/// no-op seam.
#[derive(Clone, Default)]
pub struct FormHooks {
    pub binder: Option<Rc<dyn EventBinder>>,
    pub removal: Option<Rc<dyn RemovalObserver>>,
    /// Opaque render bump, called after any commit that should be
    /// externally visible. Batching is the collaborator's concern.
    pub notify: Option<Rc<dyn Fn()>>,
}

impl FormHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn binder(mut self, binder: Rc<dyn EventBinder>) -> Self {
        self.binder = Some(binder);
        self
    }

    pub fn removal(mut self, removal: Rc<dyn RemovalObserver>) -> Self {
        self.removal = Some(removal);
        self
    }

    pub fn notify(mut self, notify: impl Fn() + 'static) -> Self {
        self.notify = Some(Rc::new(notify));
        self
    }
}
