//! Reading and writing control values, dispatching on [`ControlKind`].

use serde_json::Value;

use crate::control::{ControlHandle, ControlKind, raw_string, truthy};
use crate::field::{Field, FieldMap, RefGroup};
use crate::values::FieldValues;

/// Coerced current value of a field:
/// checkbox -> checked state, radio group -> checked option's value
/// (empty string when none), multi-select -> selected option values,
/// everything else -> raw value string.
pub fn read_field_value(field: &Field) -> Value {
    match &field.refs {
        RefGroup::Radio(options) => {
            let checked = options
                .iter()
                .find(|o| o.handle.is_checked())
                .map(|o| o.handle.raw_value());
            Value::String(checked.unwrap_or_default())
        }
        RefGroup::Single(handle) => match handle.kind() {
            ControlKind::Checkbox => Value::Bool(handle.is_checked()),
            ControlKind::MultiSelect => Value::Array(
                handle
                    .borrow()
                    .options
                    .iter()
                    .filter(|o| o.selected)
                    .map(|o| Value::String(o.value.clone()))
                    .collect(),
            ),
            _ => Value::String(handle.raw_value()),
        },
    }
}

/// Flat snapshot of every registered field's current value, in
/// registration order.
pub fn get_field_values(fields: &FieldMap) -> FieldValues {
    fields
        .iter()
        .map(|(name, field)| (name.clone(), read_field_value(field)))
        .collect()
}

fn multi_select_member(target: &Value, option_value: &str) -> bool {
    match target {
        Value::Array(items) => items.iter().any(|v| raw_string(v) == option_value),
        other => raw_string(other) == option_value,
    }
}

/// Push a value into a field's control(s). Returns the control kind tag
/// when the write touched a real control, `None` for an unknown name.
pub fn set_field_value(fields: &FieldMap, name: &str, value: &Value) -> Option<ControlKind> {
    let field = fields.get(name)?;
    match &field.refs {
        RefGroup::Radio(options) => {
            let target = raw_string(value);
            for option in options {
                option.handle.set_checked(option.handle.raw_value() == target);
            }
            Some(ControlKind::Radio)
        }
        RefGroup::Single(handle) => {
            let kind = handle.kind();
            match kind {
                ControlKind::MultiSelect => {
                    let mut node = handle.borrow_mut();
                    for option in &mut node.options {
                        option.selected = multi_select_member(value, &option.value);
                    }
                }
                ControlKind::Checkbox => handle.set_checked(truthy(value)),
                ControlKind::Select => {
                    let target = raw_string(value);
                    let mut node = handle.borrow_mut();
                    for option in &mut node.options {
                        option.selected = option.value == target;
                    }
                    node.value = target;
                }
                _ => handle.set_raw_value(&raw_string(value)),
            }
            Some(kind)
        }
    }
}
