use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use serde_json::Value;

/// What kind of input a control is. Dispatch over this tag replaces any
/// property probing on the underlying host object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlKind {
    Text,
    Checkbox,
    Radio,
    Select,
    MultiSelect,
}

/// One option of a (single or multiple) select control.
#[derive(Clone, Debug)]
pub struct SelectOption {
    pub value: String,
    pub selected: bool,
}

/// Mutable state of a host input control, as far as the engine cares:
/// its identity (`name`), kind tag, raw value/checked state, select
/// options, and focus bits. The host tree owning the real widget keeps
/// this node in sync; the engine never talks to the widget directly.
#[derive(Debug)]
pub struct ControlNode {
    pub name: String,
    pub kind: ControlKind,
    pub value: String,
    pub checked: bool,
    pub options: Vec<SelectOption>,
    pub focusable: bool,
    pub focused: bool,
    /// Host-reported built-in validity message, consulted only when the
    /// form runs with native validation.
    pub native_error: Option<String>,
}

/// Cloneable handle to a [`ControlNode`]. Identity is the allocation,
/// compared with [`ControlHandle::ptr_eq`].
#[derive(Clone, Debug)]
pub struct ControlHandle(Rc<RefCell<ControlNode>>);

impl ControlHandle {
    fn node(name: &str, kind: ControlKind) -> ControlNode {
        ControlNode {
            name: name.to_string(),
            kind,
            value: String::new(),
            checked: false,
            options: Vec::new(),
            focusable: true,
            focused: false,
            native_error: None,
        }
    }

    pub fn text(name: &str) -> Self {
        Self(Rc::new(RefCell::new(Self::node(name, ControlKind::Text))))
    }

    pub fn checkbox(name: &str) -> Self {
        Self(Rc::new(RefCell::new(Self::node(name, ControlKind::Checkbox))))
    }

    /// A single radio option carrying its option value. Options sharing a
    /// name are grouped under one field at registration.
    pub fn radio(name: &str, value: &str) -> Self {
        let mut node = Self::node(name, ControlKind::Radio);
        node.value = value.to_string();
        Self(Rc::new(RefCell::new(node)))
    }

    pub fn select(name: &str, options: &[&str]) -> Self {
        let mut node = Self::node(name, ControlKind::Select);
        node.options = options
            .iter()
            .map(|v| SelectOption {
                value: v.to_string(),
                selected: false,
            })
            .collect();
        Self(Rc::new(RefCell::new(node)))
    }

    pub fn multi_select(name: &str, options: &[&str]) -> Self {
        let mut node = Self::node(name, ControlKind::MultiSelect);
        node.options = options
            .iter()
            .map(|v| SelectOption {
                value: v.to_string(),
                selected: false,
            })
            .collect();
        Self(Rc::new(RefCell::new(node)))
    }

    pub fn borrow(&self) -> Ref<'_, ControlNode> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, ControlNode> {
        self.0.borrow_mut()
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn kind(&self) -> ControlKind {
        self.0.borrow().kind
    }

    pub fn raw_value(&self) -> String {
        self.0.borrow().value.clone()
    }

    pub fn set_raw_value(&self, value: &str) {
        self.0.borrow_mut().value = value.to_string();
    }

    pub fn is_checked(&self) -> bool {
        self.0.borrow().checked
    }

    pub fn set_checked(&self, checked: bool) {
        self.0.borrow_mut().checked = checked;
    }

    pub fn set_native_error(&self, message: Option<&str>) {
        self.0.borrow_mut().native_error = message.map(str::to_string);
    }

    pub fn native_error(&self) -> Option<String> {
        self.0.borrow().native_error.clone()
    }

    pub fn set_focusable(&self, focusable: bool) {
        self.0.borrow_mut().focusable = focusable;
    }

    pub fn is_focusable(&self) -> bool {
        self.0.borrow().focusable
    }

    pub fn focus(&self) {
        self.0.borrow_mut().focused = true;
    }

    pub fn blur(&self) {
        self.0.borrow_mut().focused = false;
    }

    pub fn is_focused(&self) -> bool {
        self.0.borrow().focused
    }

    pub fn ptr_eq(&self, other: &ControlHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Coerce an engine value to the raw string a control stores. `Null`
/// aimed at a live control becomes the empty string.
pub fn raw_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Truthiness used when a non-boolean value is written into a checkbox.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}
