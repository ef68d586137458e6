//! # Formwork core
//!
//! A form-state engine for reactive UIs: it tracks a dynamic, mutable
//! collection of input controls, runs validation per configured mode, and
//! exposes a consistent snapshot of form state (values, errors,
//! dirty/touched/valid flags) so the rendering layer never has to
//! re-derive it.
//!
//! ## Registering and validating
//!
//! ```rust
//! use formwork_core::*;
//! use serde_json::json;
//!
//! let form = Form::new(FormConfig::new().mode(Mode::OnChange));
//! let email = ControlHandle::text("email");
//! form.register_with(&email, RuleSet::new().required());
//!
//! pollster::block_on(async {
//!     assert!(!form.set_value_validated("email", json!("")).await);
//!     assert!(form.errors().contains_key("email"));
//!
//!     assert!(form.set_value_validated("email", json!("a@b.com")).await);
//!     assert!(form.errors().is_empty());
//! });
//! ```
//!
//! ## Submitting
//!
//! `submit` sweeps the whole registry (bypassing the per-event mode
//! gate), folds per-field results into an error map and a nested value
//! tree, and either invokes the callback or focuses the first invalid
//! control:
//!
//! ```rust
//! use formwork_core::*;
//! use serde_json::json;
//!
//! let form = Form::new(FormConfig::new());
//! let name = ControlHandle::text("user.name");
//! name.set_raw_value("Jane");
//! form.register(&name);
//!
//! pollster::block_on(async {
//!     let ok = form.submit(|values| {
//!         assert_eq!(values, json!({ "user": { "name": "Jane" } }));
//!     })
//!     .await;
//!     assert!(ok);
//!     assert_eq!(form.form_state().submit_count, 1);
//! });
//! ```
//!
//! ## Hosts and collaborators
//!
//! The engine never touches a real widget tree. Event listener
//! attachment, control-removal observation, and the render notification
//! are injected through [`FormHooks`]; [`host::InMemoryHost`] implements
//! the seams for demos and tests.

pub mod access;
pub mod control;
pub mod errors;
pub mod field;
pub mod form;
pub mod hooks;
pub mod host;
pub mod schema;
pub mod state;
pub mod tests;
pub mod validate;
pub mod values;
pub mod watch;

pub use control::{ControlHandle, ControlKind, ControlNode, SelectOption};
pub use errors::{ErrorEntry, ErrorMap};
pub use field::{Field, FieldMap, RuleSet, RuleViolation};
pub use form::{Form, FormConfig};
pub use hooks::{Disposer, EventBinder, EventSink, FieldEvent, FormHooks, RemovalObserver};
pub use host::InMemoryHost;
pub use schema::{SchemaOptions, SchemaOutcome, SchemaValidator};
pub use state::{FormStateSnapshot, RenderFlags, StateTracker};
pub use validate::{EventKind, Mode};
pub use values::{FieldValues, combine_field_values, get_default_value};
pub use watch::WatchRegistry;
