//! Whole-form schema validation seam.
//!
//! The engine never evaluates schema rules itself; a configured
//! collaborator receives the full nested value tree on every triggering
//! event and hands back per-field errors plus the coerced result.

use futures::future::LocalBoxFuture;
use serde_json::Value;

use crate::errors::ErrorMap;

/// Options forwarded verbatim to the schema collaborator.
#[derive(Clone, Copy, Debug)]
pub struct SchemaOptions {
    /// Stop at the first failing field instead of collecting all errors.
    pub abort_early: bool,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self { abort_early: false }
    }
}

/// Result of one whole-form schema run.
pub struct SchemaOutcome {
    /// Field errors keyed by (possibly nested) field name. Empty map
    /// means the form validated clean.
    pub field_errors: ErrorMap,
    /// Coerced values produced by the schema; handed to the submit
    /// callback in place of the raw reads.
    pub result: Value,
}

pub trait SchemaValidator {
    fn validate(&self, values: Value, options: &SchemaOptions)
    -> LocalBoxFuture<'static, SchemaOutcome>;
}
