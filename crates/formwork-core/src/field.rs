//! Field descriptors and validation rule sets.
//!
//! A field is the unit the registry tracks: one control (or, for radio
//! groups, an ordered list of option controls) plus the rules declared at
//! registration. Rule sets use the consuming-builder style:
//!
//! ```rust
//! use formwork_core::RuleSet;
//!
//! let rules = RuleSet::new()
//!     .required_with("email is required")
//!     .pattern(r".+@.+")
//!     .validate("no_admin", |v| {
//!         if v.as_str() == Some("admin@x.io") {
//!             Err(formwork_core::RuleViolation::new("reserved address"))
//!         } else {
//!             Ok(())
//!         }
//!     });
//! assert!(!rules.is_empty());
//! ```

use std::rc::Rc;

use futures::future::LocalBoxFuture;
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use smallvec::SmallVec;
use thiserror::Error;

use crate::control::{ControlHandle, ControlKind};
use crate::hooks::Disposer;

/// Failure reported by a custom validator.
#[derive(Clone, Debug, Error)]
#[error("{}", .message.as_deref().unwrap_or("validation failed"))]
pub struct RuleViolation {
    pub message: Option<String>,
}

impl RuleViolation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    /// A violation with no user-visible message; only the rule kind shows
    /// up in the error entry.
    pub fn silent() -> Self {
        Self { message: None }
    }
}

/// A built-in rule bound together with its optional message.
#[derive(Clone, Debug)]
pub struct Rule<T> {
    pub value: T,
    pub message: Option<String>,
}

impl<T> Rule<T> {
    fn new(value: T, message: Option<String>) -> Self {
        Self { value, message }
    }
}

pub type ValidatorFn = Rc<dyn Fn(Value) -> LocalBoxFuture<'static, Result<(), RuleViolation>>>;

#[derive(Clone)]
pub struct NamedValidator {
    pub key: String,
    pub run: ValidatorFn,
}

/// Per-field validation rules. An empty set means the field does not
/// participate in validation at all.
#[derive(Clone, Default)]
pub struct RuleSet {
    pub required: Option<Rule<bool>>,
    pub min: Option<Rule<f64>>,
    pub max: Option<Rule<f64>>,
    pub min_length: Option<Rule<usize>>,
    pub max_length: Option<Rule<usize>>,
    pub pattern: Option<Rule<Regex>>,
    pub validators: Vec<NamedValidator>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self) -> Self {
        self.required = Some(Rule::new(true, None));
        self
    }

    pub fn required_with(mut self, message: impl Into<String>) -> Self {
        self.required = Some(Rule::new(true, Some(message.into())));
        self
    }

    pub fn min(mut self, value: f64) -> Self {
        self.min = Some(Rule::new(value, None));
        self
    }

    pub fn min_with(mut self, value: f64, message: impl Into<String>) -> Self {
        self.min = Some(Rule::new(value, Some(message.into())));
        self
    }

    pub fn max(mut self, value: f64) -> Self {
        self.max = Some(Rule::new(value, None));
        self
    }

    pub fn max_with(mut self, value: f64, message: impl Into<String>) -> Self {
        self.max = Some(Rule::new(value, Some(message.into())));
        self
    }

    pub fn min_length(mut self, value: usize) -> Self {
        self.min_length = Some(Rule::new(value, None));
        self
    }

    pub fn min_length_with(mut self, value: usize, message: impl Into<String>) -> Self {
        self.min_length = Some(Rule::new(value, Some(message.into())));
        self
    }

    pub fn max_length(mut self, value: usize) -> Self {
        self.max_length = Some(Rule::new(value, None));
        self
    }

    pub fn max_length_with(mut self, value: usize, message: impl Into<String>) -> Self {
        self.max_length = Some(Rule::new(value, Some(message.into())));
        self
    }

    /// Pattern rules take the regex source; an invalid pattern is a
    /// caller bug and logged, not stored.
    pub fn pattern(mut self, source: &str) -> Self {
        self.set_pattern(source, None);
        self
    }

    pub fn pattern_with(mut self, source: &str, message: impl Into<String>) -> Self {
        self.set_pattern(source, Some(message.into()));
        self
    }

    fn set_pattern(&mut self, source: &str, message: Option<String>) {
        match Regex::new(source) {
            Ok(re) => self.pattern = Some(Rule::new(re, message)),
            Err(err) => log::warn!("invalid pattern rule {source:?}: {err}"),
        }
    }

    /// Synchronous custom validator; `key` becomes the error kind.
    pub fn validate<F>(mut self, key: &str, f: F) -> Self
    where
        F: Fn(&Value) -> Result<(), RuleViolation> + 'static,
    {
        let run: ValidatorFn = Rc::new(move |value| {
            let result = f(&value);
            Box::pin(async move { result })
        });
        self.validators.push(NamedValidator {
            key: key.to_string(),
            run,
        });
        self
    }

    /// Asynchronous custom validator; the returned future is awaited on
    /// the form's single logical thread.
    pub fn validate_async<F>(mut self, key: &str, f: F) -> Self
    where
        F: Fn(Value) -> LocalBoxFuture<'static, Result<(), RuleViolation>> + 'static,
    {
        self.validators.push(NamedValidator {
            key: key.to_string(),
            run: Rc::new(f),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_none()
            && self.min.is_none()
            && self.max.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.pattern.is_none()
            && self.validators.is_empty()
    }
}

/// One option of a radio group, with its removal-observer guard.
pub struct RadioOption {
    pub handle: ControlHandle,
    pub removal: Option<Disposer>,
}

/// The control(s) backing a field.
pub enum RefGroup {
    Single(ControlHandle),
    Radio(SmallVec<[RadioOption; 4]>),
}

/// Registry descriptor for one field name.
pub struct Field {
    pub name: String,
    pub refs: RefGroup,
    pub rules: RuleSet,
    /// Removal guard for the single control; radio options carry their own.
    pub removal: Option<Disposer>,
}

impl Field {
    pub fn kind(&self) -> ControlKind {
        match &self.refs {
            RefGroup::Single(handle) => handle.kind(),
            RefGroup::Radio(_) => ControlKind::Radio,
        }
    }

    /// Control reported in error entries and targeted by focus-on-error:
    /// the control itself, or the first radio option.
    pub fn error_control(&self) -> Option<ControlHandle> {
        match &self.refs {
            RefGroup::Single(handle) => Some(handle.clone()),
            RefGroup::Radio(options) => options.first().map(|o| o.handle.clone()),
        }
    }

    /// Every live control of this field, in registration order.
    pub fn controls(&self) -> Vec<ControlHandle> {
        match &self.refs {
            RefGroup::Single(handle) => vec![handle.clone()],
            RefGroup::Radio(options) => options.iter().map(|o| o.handle.clone()).collect(),
        }
    }

    pub fn has_radio_option(&self, value: &str) -> bool {
        match &self.refs {
            RefGroup::Radio(options) => options.iter().any(|o| o.handle.raw_value() == value),
            RefGroup::Single(_) => false,
        }
    }
}

/// Name-keyed field arena, iteration in registration order.
pub type FieldMap = IndexMap<String, Field>;
