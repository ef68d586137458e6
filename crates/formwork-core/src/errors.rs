use indexmap::IndexMap;

use crate::control::ControlHandle;

/// One validation failure for one field. Absence of a name in the error
/// map means the field is currently valid.
#[derive(Clone, Debug)]
pub struct ErrorEntry {
    /// Which rule failed: `required`, `min`, `max`, `minLength`,
    /// `maxLength`, `pattern`, `native`, or a custom validator key.
    pub kind: String,
    pub message: Option<String>,
    /// Control to focus when the submit pipeline walks failed fields.
    pub control: Option<ControlHandle>,
    /// Set only through `Form::set_error`; ordinary re-validation of other
    /// fields never clears a manual entry.
    pub is_manual: bool,
}

impl ErrorEntry {
    pub fn new(kind: &str, message: Option<String>, control: Option<ControlHandle>) -> Self {
        Self {
            kind: kind.to_string(),
            message,
            control,
            is_manual: false,
        }
    }

    pub fn manual(kind: &str, message: Option<String>, control: Option<ControlHandle>) -> Self {
        Self {
            is_manual: true,
            ..Self::new(kind, message, control)
        }
    }
}

/// Name-keyed error map, iteration in insertion order.
pub type ErrorMap = IndexMap<String, ErrorEntry>;

/// Same kind and same message: a merge of such an entry does not by itself
/// warrant a render.
pub fn is_same_error(existing: Option<&ErrorEntry>, kind: &str, message: Option<&str>) -> bool {
    existing.is_some_and(|e| e.kind == kind && e.message.as_deref() == message)
}

/// Restrict an error map to a caller-supplied set of names.
pub fn pick_errors(errors: &ErrorMap, names: &[String]) -> ErrorMap {
    errors
        .iter()
        .filter(|(name, _)| names.contains(name))
        .map(|(name, entry)| (name.clone(), entry.clone()))
        .collect()
}

/// Drop entries for names that just validated clean.
pub fn omit_valid_fields(mut errors: ErrorMap, valid_names: &[String]) -> ErrorMap {
    for name in valid_names {
        errors.shift_remove(name);
    }
    errors
}
