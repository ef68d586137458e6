//! The field-level rule engine and the validation-mode gate.

use indexmap::IndexSet;
use serde_json::Value;

use crate::control::ControlHandle;
use crate::errors::{ErrorEntry, ErrorMap, is_same_error};
use crate::field::RuleSet;

/// When control events trigger validation. `OnSubmit` defers everything
/// to the first submit attempt; `OnBlur` validates on blur (and on change
/// once a field carries a live error); `OnChange` validates on every
/// change and blur.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    OnSubmit,
    OnBlur,
    OnChange,
}

impl Mode {
    pub fn is_on_submit(self) -> bool {
        self == Mode::OnSubmit
    }

    pub fn is_on_blur(self) -> bool {
        self == Mode::OnBlur
    }
}

/// Control event kinds the engine reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Input,
    Blur,
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

/// Run a field's rules against its current value. The first failing rule
/// wins; a clean run returns `None`.
///
/// With native validation enabled the rule engine is bypassed entirely
/// and the control's own reported validity is the verdict.
pub async fn validate_field(
    rules: &RuleSet,
    value: Value,
    control: Option<ControlHandle>,
    native_validation: bool,
) -> Option<ErrorEntry> {
    if native_validation {
        let message = control.as_ref().and_then(|c| c.native_error());
        return message.map(|m| ErrorEntry::new("native", Some(m), control));
    }

    if let Some(rule) = &rules.required {
        if rule.value && is_empty_value(&value) {
            return Some(ErrorEntry::new("required", rule.message.clone(), control));
        }
    }

    if let Some(rule) = &rules.min {
        if let Some(n) = as_number(&value) {
            if n < rule.value {
                return Some(ErrorEntry::new("min", rule.message.clone(), control));
            }
        }
    }

    if let Some(rule) = &rules.max {
        if let Some(n) = as_number(&value) {
            if n > rule.value {
                return Some(ErrorEntry::new("max", rule.message.clone(), control));
            }
        }
    }

    if let Some(rule) = &rules.min_length {
        if length_of(&value).is_some_and(|len| len < rule.value) {
            return Some(ErrorEntry::new("minLength", rule.message.clone(), control));
        }
    }

    if let Some(rule) = &rules.max_length {
        if length_of(&value).is_some_and(|len| len > rule.value) {
            return Some(ErrorEntry::new("maxLength", rule.message.clone(), control));
        }
    }

    if let Some(rule) = &rules.pattern {
        if let Value::String(s) = &value {
            if !rule.value.is_match(s) {
                return Some(ErrorEntry::new("pattern", rule.message.clone(), control));
            }
        }
    }

    for validator in &rules.validators {
        if let Err(violation) = (validator.run)(value.clone()).await {
            return Some(ErrorEntry::new(
                &validator.key,
                violation.message,
                control.clone(),
            ));
        }
    }

    None
}

/// Decide whether an event-path validation outcome warrants committing
/// and rendering. Manual errors win over event-path results, and a
/// result identical to the stored error does not force a render on its
/// own.
pub fn should_update_with_error(
    errors: &ErrorMap,
    name: &str,
    outcome: Option<&ErrorEntry>,
    valid_fields: &IndexSet<String>,
    fields_with_validation: &IndexSet<String>,
) -> bool {
    let field_valid = outcome.is_none();
    let form_valid = errors.is_empty();
    let existing = errors.get(name);

    if (field_valid && valid_fields.contains(name)) || existing.is_some_and(|e| e.is_manual) {
        return false;
    }

    if form_valid != field_valid
        || (!form_valid && existing.is_none())
        || (field_valid && fields_with_validation.contains(name) && !valid_fields.contains(name))
    {
        return true;
    }

    match outcome {
        Some(entry) => !is_same_error(existing, &entry.kind, entry.message.as_deref()),
        None => false,
    }
}
