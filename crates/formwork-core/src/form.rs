//! The form controller.
//!
//! `Form` owns the field registry, the error map, and every derived set,
//! and is the single choke point through which all mutation flows. It is
//! a cloneable handle (`Rc` inner) so event sinks and submit handlers can
//! capture it; all state lives behind `RefCell`/`Cell` and is only ever
//! touched from the one logical thread.
//!
//! Asynchrony exists solely as suspendable validation futures. The
//! controller never blocks and carries no executor: fire-and-forget work
//! (eager registration validation) lands on an internal deferred-task
//! queue drained by [`Form::flush`], and every async continuation
//! re-checks the torn-down flag and its validation generation before
//! committing, so results for removed fields and superseded runs are
//! discarded instead of applied.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use futures::future::LocalBoxFuture;
use serde_json::Value;
use smallvec::SmallVec;

use crate::access::{get_field_values, read_field_value, set_field_value};
use crate::control::{ControlHandle, ControlKind};
use crate::errors::{ErrorEntry, ErrorMap, is_same_error, omit_valid_fields, pick_errors};
use crate::field::{Field, FieldMap, RadioOption, RefGroup, RuleSet};
use crate::hooks::{EventSink, FieldEvent, FormHooks};
use crate::schema::{SchemaOptions, SchemaValidator};
use crate::state::{FormStateSnapshot, RenderFlags, StateTracker};
use crate::validate::{EventKind, Mode, should_update_with_error, validate_field};
use crate::values::{FieldValues, combine_field_values, get_default_value};
use crate::watch::WatchRegistry;

/// Recognized configuration, consuming-builder style:
///
/// ```rust
/// use formwork_core::{FormConfig, Mode};
/// use serde_json::json;
///
/// let config = FormConfig::new()
///     .mode(Mode::OnChange)
///     .default_value("email", json!("seed@x.io"))
///     .submit_focus_error(false);
/// ```
pub struct FormConfig {
    pub mode: Mode,
    pub default_values: FieldValues,
    /// When set, only these names participate in submit-time validation
    /// and in the exposed error map.
    pub validation_fields: Option<Vec<String>>,
    /// Delegate field-level validation to the controls' built-in
    /// validity instead of the rule engine.
    pub native_validation: bool,
    pub submit_focus_error: bool,
    pub schema: Option<Rc<dyn SchemaValidator>>,
    pub schema_options: SchemaOptions,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            mode: Mode::OnSubmit,
            default_values: FieldValues::new(),
            validation_fields: None,
            native_validation: false,
            submit_focus_error: true,
            schema: None,
            schema_options: SchemaOptions::default(),
        }
    }
}

impl FormConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn default_value(mut self, name: &str, value: Value) -> Self {
        self.default_values.insert(name.to_string(), value);
        self
    }

    pub fn default_values(mut self, values: FieldValues) -> Self {
        self.default_values = values;
        self
    }

    pub fn validation_fields(mut self, names: &[&str]) -> Self {
        self.validation_fields = Some(names.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn native_validation(mut self, enabled: bool) -> Self {
        self.native_validation = enabled;
        self
    }

    pub fn submit_focus_error(mut self, enabled: bool) -> Self {
        self.submit_focus_error = enabled;
        self
    }

    pub fn schema(mut self, schema: impl SchemaValidator + 'static) -> Self {
        self.schema = Some(Rc::new(schema));
        self
    }

    pub fn schema_options(mut self, options: SchemaOptions) -> Self {
        self.schema_options = options;
        self
    }
}

struct FormInner {
    config: FormConfig,
    hooks: FormHooks,
    fields: RefCell<FieldMap>,
    errors: RefCell<ErrorMap>,
    /// Full result of the last schema run, kept separately from the
    /// user-visible error map.
    schema_errors: RefCell<ErrorMap>,
    schema_triggered: Cell<bool>,
    state: RefCell<StateTracker>,
    /// Per-field dirty baselines, captured at registration and replaced
    /// wholesale on reset. Distinct from `config.default_values`.
    default_values: RefCell<FieldValues>,
    watch: WatchRegistry,
    /// Monotonic per-field validation generations; a completed run whose
    /// generation is no longer current is discarded.
    generations: RefCell<HashMap<String, u64>>,
    torn_down: Cell<bool>,
    is_submitted: Cell<bool>,
    is_submitting: Cell<bool>,
    submit_count: Cell<u32>,
    tasks: RefCell<Vec<LocalBoxFuture<'static, ()>>>,
}

#[derive(Clone)]
pub struct Form {
    inner: Rc<FormInner>,
}

#[derive(Clone)]
struct WeakForm(Weak<FormInner>);

impl WeakForm {
    fn upgrade(&self) -> Option<Form> {
        self.0.upgrade().map(|inner| Form { inner })
    }
}

impl Form {
    pub fn new(config: FormConfig) -> Self {
        Self::with_hooks(config, FormHooks::default())
    }

    pub fn with_hooks(config: FormConfig, hooks: FormHooks) -> Self {
        Self {
            inner: Rc::new(FormInner {
                config,
                hooks,
                fields: RefCell::new(FieldMap::new()),
                errors: RefCell::new(ErrorMap::new()),
                schema_errors: RefCell::new(ErrorMap::new()),
                schema_triggered: Cell::new(false),
                state: RefCell::new(StateTracker::default()),
                default_values: RefCell::new(FieldValues::new()),
                watch: WatchRegistry::default(),
                generations: RefCell::new(HashMap::new()),
                torn_down: Cell::new(false),
                is_submitted: Cell::new(false),
                is_submitting: Cell::new(false),
                submit_count: Cell::new(0),
                tasks: RefCell::new(Vec::new()),
            }),
        }
    }

    fn downgrade(&self) -> WeakForm {
        WeakForm(Rc::downgrade(&self.inner))
    }

    fn notify(&self) {
        if let Some(notify) = &self.inner.hooks.notify {
            notify();
        }
    }

    /// Commit choke point: non-empty flags mean the change is externally
    /// visible and the rendering layer is bumped.
    fn commit(&self, flags: RenderFlags) {
        if !flags.is_empty() {
            self.notify();
        }
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        self.inner.tasks.borrow_mut().push(task);
    }

    /// Drain the deferred-task queue, driving every queued future to
    /// completion (tasks may queue more tasks).
    pub async fn flush(&self) {
        loop {
            let tasks: Vec<_> = self.inner.tasks.borrow_mut().drain(..).collect();
            if tasks.is_empty() {
                break;
            }
            futures::future::join_all(tasks).await;
        }
    }

    // ---- generation stamping ------------------------------------------

    fn stamp(&self, name: &str) -> u64 {
        let mut generations = self.inner.generations.borrow_mut();
        let slot = generations.entry(name.to_string()).or_insert(0);
        *slot += 1;
        *slot
    }

    fn is_current(&self, name: &str, generation: u64) -> bool {
        self.inner.generations.borrow().get(name) == Some(&generation)
    }

    /// True when a completed validation must not be applied: the form was
    /// torn down, the field was unregistered mid-flight, or a newer run
    /// superseded this one.
    fn discard(&self, name: &str, generation: u64) -> bool {
        if self.inner.torn_down.get()
            || !self.is_current(name, generation)
            || !self.inner.fields.borrow().contains_key(name)
        {
            log::debug!("discarding validation result for {name:?} (stale or removed)");
            return true;
        }
        false
    }

    // ---- registration -------------------------------------------------

    pub fn register(&self, control: &ControlHandle) {
        self.register_with(control, RuleSet::new());
    }

    /// Register a control under its name. Idempotent for a non-radio name
    /// that is already registered; radio options accumulate under one
    /// descriptor, with duplicate option values ignored.
    pub fn register_with(&self, control: &ControlHandle, rules: RuleSet) {
        if self.inner.torn_down.get() {
            return;
        }
        let name = control.name();
        if name.is_empty() {
            log::warn!("register: control has no name, skipping");
            return;
        }
        let is_radio = control.kind() == ControlKind::Radio;

        {
            let fields = self.inner.fields.borrow();
            if let Some(field) = fields.get(&name) {
                if is_radio {
                    if field.kind() != ControlKind::Radio {
                        log::warn!("register: {name:?} is already a non-radio field");
                        return;
                    }
                    if field.has_radio_option(&control.raw_value()) {
                        return;
                    }
                } else {
                    return;
                }
            }
        }

        let removal = self.inner.hooks.removal.as_ref().map(|observer| {
            let weak = self.downgrade();
            let removed_name = name.clone();
            observer.observe(
                control,
                Box::new(move || {
                    if let Some(form) = weak.upgrade() {
                        form.unregister(&removed_name);
                    }
                }),
            )
        });

        {
            let mut fields = self.inner.fields.borrow_mut();
            if is_radio {
                let field = fields.entry(name.clone()).or_insert_with(|| Field {
                    name: name.clone(),
                    refs: RefGroup::Radio(SmallVec::new()),
                    rules: RuleSet::new(),
                    removal: None,
                });
                if !rules.is_empty() {
                    field.rules = rules.clone();
                }
                if let RefGroup::Radio(options) = &mut field.refs {
                    options.push(RadioOption {
                        handle: control.clone(),
                        removal,
                    });
                }
            } else {
                fields.insert(
                    name.clone(),
                    Field {
                        name: name.clone(),
                        refs: RefGroup::Single(control.clone()),
                        rules: rules.clone(),
                        removal,
                    },
                );
            }
        }

        if let Some(default) = get_default_value(&self.inner.config.default_values, &name) {
            let fields = self.inner.fields.borrow();
            set_field_value(&fields, &name, &default);
        }

        if !rules.is_empty() {
            self.inner
                .state
                .borrow_mut()
                .fields_with_validation
                .insert(name.clone());

            if !self.inner.config.mode.is_on_submit() {
                if self.inner.config.schema.is_some() {
                    self.inner.schema_triggered.set(true);
                    self.spawn_eager_schema_validation();
                } else {
                    self.spawn_eager_field_validation(&name);
                }
            }
        }

        {
            let fields = self.inner.fields.borrow();
            if let Some(field) = fields.get(&name) {
                let mut defaults = self.inner.default_values.borrow_mut();
                if !defaults.contains_key(&name) {
                    defaults.insert(name.clone(), read_field_value(field));
                }
            }
        }

        // Native validation hands event wiring to the host's built-in
        // machinery; otherwise the binder delivers input/blur events back
        // into the orchestrator.
        if !self.inner.config.native_validation {
            if let Some(binder) = &self.inner.hooks.binder {
                binder.attach(control, self.event_sink(), self.inner.config.mode.is_on_blur());
            }
        }
    }

    fn event_sink(&self) -> EventSink {
        let weak = self.downgrade();
        Rc::new(move |event: FieldEvent| {
            let weak = weak.clone();
            Box::pin(async move {
                if let Some(form) = weak.upgrade() {
                    form.validate_and_update(&event.name, event.kind).await;
                }
            })
        })
    }

    /// Eager validation on registration (non-submit modes). The outcome
    /// only feeds `valid_fields`; it never writes user-visible errors.
    fn spawn_eager_field_validation(&self, name: &str) {
        let weak = self.downgrade();
        let name = name.to_string();
        self.spawn(Box::pin(async move {
            let Some(form) = weak.upgrade() else { return };
            let Some((rules, value, control)) = form.field_snapshot(&name) else {
                return;
            };
            let native = form.inner.config.native_validation;
            let outcome = validate_field(&rules, value, control, native).await;
            if form.inner.torn_down.get() || !form.inner.fields.borrow().contains_key(&name) {
                return;
            }
            let should_render = {
                let mut state = form.inner.state.borrow_mut();
                if outcome.is_none() {
                    state.valid_fields.insert(name.clone());
                }
                state.valid_fields.len() == state.fields_with_validation.len()
            };
            if should_render {
                form.notify();
            }
        }));
    }

    fn spawn_eager_schema_validation(&self) {
        let weak = self.downgrade();
        self.spawn(Box::pin(async move {
            let Some(form) = weak.upgrade() else { return };
            let Some(schema) = form.inner.config.schema.clone() else {
                return;
            };
            let values = form.values_nested();
            let outcome = schema.validate(values, &form.inner.config.schema_options).await;
            if form.inner.torn_down.get() {
                return;
            }
            let clean = outcome.field_errors.is_empty();
            *form.inner.schema_errors.borrow_mut() = outcome.field_errors;
            if clean {
                form.notify();
            }
        }));
    }

    // ---- unregistration -----------------------------------------------

    pub fn unregister(&self, name: &str) {
        self.unregister_many(&[name]);
    }

    pub fn unregister_many(&self, names: &[&str]) {
        if self.inner.fields.borrow().is_empty() {
            return;
        }
        for name in names {
            self.remove_field(name);
        }
    }

    /// Cascading removal: descriptor, derived-set membership, dirty
    /// baseline, error entry, watch entry, and validation generation all
    /// go together, so in-flight results for the name can only be
    /// discarded afterwards.
    fn remove_field(&self, name: &str) {
        let field = self.inner.fields.borrow_mut().shift_remove(name);
        let Some(field) = field else { return };
        if let Some(binder) = &self.inner.hooks.binder {
            for control in field.controls() {
                binder.detach(&control);
            }
        }
        // Dropping the descriptor disposes its removal observers.
        drop(field);
        self.inner.errors.borrow_mut().shift_remove(name);
        self.inner.state.borrow_mut().remove(name);
        self.inner.default_values.borrow_mut().shift_remove(name);
        self.inner.watch.remove(name);
        self.inner.generations.borrow_mut().remove(name);
    }

    /// Tear the form down: no async completion past this point mutates
    /// state, and every field is unregistered.
    pub fn dispose(&self) {
        self.inner.torn_down.set(true);
        let names: Vec<String> = self.inner.fields.borrow().keys().cloned().collect();
        for name in names {
            self.remove_field(&name);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.torn_down.get()
    }

    // ---- values -------------------------------------------------------

    fn field_snapshot(&self, name: &str) -> Option<(RuleSet, Value, Option<ControlHandle>)> {
        let fields = self.inner.fields.borrow();
        let field = fields.get(name)?;
        Some((
            field.rules.clone(),
            read_field_value(field),
            field.error_control(),
        ))
    }

    fn refresh_dirty(&self, name: &str) -> bool {
        let current = {
            let fields = self.inner.fields.borrow();
            fields.get(name).map(read_field_value)
        };
        let Some(current) = current else { return false };
        let is_dirty_now =
            self.inner.default_values.borrow().get(name) != Some(&current);
        self.inner.state.borrow_mut().set_dirty(name, is_dirty_now)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.inner.fields.borrow().contains_key(name)
    }

    /// Flat snapshot of current values; configured defaults when nothing
    /// is registered.
    pub fn values(&self) -> FieldValues {
        let values = get_field_values(&self.inner.fields.borrow());
        if values.is_empty() {
            self.inner.config.default_values.clone()
        } else {
            values
        }
    }

    /// Nested snapshot (dotted/bracketed names folded into a tree).
    pub fn values_nested(&self) -> Value {
        let values = get_field_values(&self.inner.fields.borrow());
        if values.is_empty() {
            combine_field_values(&self.inner.config.default_values)
        } else {
            combine_field_values(&values)
        }
    }

    /// Write a value into a field's control and update dirty/touched
    /// state. Unknown names are warned no-ops.
    pub fn set_value(&self, name: &str, value: Value) {
        if !self.set_value_internal(name, &value) {
            return;
        }
        if self.inner.watch.is_watching(name) {
            self.notify();
        }
    }

    /// `set_value` plus validation; resolves to whether the field ended
    /// clean. Unknown names resolve to `false` without state changes.
    pub async fn set_value_validated(&self, name: &str, value: Value) -> bool {
        if !self.set_value_internal(name, &value) {
            return false;
        }
        let should_render = self.inner.watch.is_watching(name);
        if self.inner.config.schema.is_some() {
            return self.execute_schema_validation(vec![name.to_string()]).await;
        }
        self.execute_validation(name, should_render).await
    }

    fn set_value_internal(&self, name: &str, value: &Value) -> bool {
        let kind = {
            let fields = self.inner.fields.borrow();
            set_field_value(&fields, name, value)
        };
        if kind.is_none() {
            log::warn!("set_value: unknown field {name:?}");
            return false;
        }
        let mut flags = RenderFlags::VALUE_WRITTEN;
        if self.refresh_dirty(name) {
            flags |= RenderFlags::DIRTY_CHANGED;
        }
        if self.inner.state.borrow_mut().touch(name) {
            flags |= RenderFlags::FIRST_TOUCH;
        }
        self.commit(flags);
        true
    }

    // ---- validation orchestration -------------------------------------

    /// Entry point for control events delivered by the listener seam.
    pub async fn validate_and_update(&self, name: &str, kind: EventKind) {
        if self.inner.torn_down.get() {
            return;
        }
        if let Some(allowed) = &self.inner.config.validation_fields {
            if !allowed.iter().any(|n| n == name) {
                return;
            }
        }
        if !self.inner.fields.borrow().contains_key(name) {
            return;
        }

        let mode = self.inner.config.mode;
        let is_blur = kind == EventKind::Blur;
        let has_live_error = self.inner.errors.borrow().contains_key(name);
        let gated = (mode.is_on_submit() && !self.inner.is_submitted.get())
            || (mode.is_on_blur() && !is_blur && !has_live_error);

        let mut flags = RenderFlags::empty();
        if self.inner.watch.is_watching(name) {
            flags |= RenderFlags::WATCHED;
        }
        if self.refresh_dirty(name) {
            flags |= RenderFlags::DIRTY_CHANGED;
        }
        if self.inner.state.borrow_mut().touch(name) {
            flags |= RenderFlags::FIRST_TOUCH;
        }

        if gated {
            self.commit(flags);
            return;
        }

        let generation = self.stamp(name);
        let outcome: Option<ErrorEntry> = if let Some(schema) = self.inner.config.schema.clone() {
            let values = self.values_nested();
            let result = schema
                .validate(values, &self.inner.config.schema_options)
                .await;
            if self.discard(name, generation) {
                return;
            }
            self.inner.schema_triggered.set(true);
            let entry = result.field_errors.get(name).cloned();
            *self.inner.schema_errors.borrow_mut() = result.field_errors;
            entry
        } else {
            let Some((rules, value, control)) = self.field_snapshot(name) else {
                return;
            };
            let native = self.inner.config.native_validation;
            let outcome = validate_field(&rules, value, control, native).await;
            if self.discard(name, generation) {
                return;
            }
            outcome
        };

        let should_update = {
            let errors = self.inner.errors.borrow();
            let state = self.inner.state.borrow();
            should_update_with_error(
                &errors,
                name,
                outcome.as_ref(),
                &state.valid_fields,
                &state.fields_with_validation,
            )
        };

        if should_update {
            self.merge_error(name, outcome, true);
            return;
        }
        self.commit(flags);
    }

    /// Commit one field's validation outcome: a clean result clears the
    /// error and marks the field valid, a failure does the inverse.
    fn merge_error(&self, name: &str, outcome: Option<ErrorEntry>, should_render: bool) {
        {
            let mut errors = self.inner.errors.borrow_mut();
            let mut state = self.inner.state.borrow_mut();
            match outcome {
                None => {
                    errors.shift_remove(name);
                    if state.fields_with_validation.contains(name)
                        || self.inner.config.schema.is_some()
                    {
                        state.valid_fields.insert(name.to_string());
                    }
                }
                Some(entry) => {
                    errors.insert(name.to_string(), entry);
                    state.valid_fields.shift_remove(name);
                }
            }
        }
        if should_render {
            self.commit(RenderFlags::ERROR_CHANGED);
        }
    }

    async fn execute_validation(&self, name: &str, should_render: bool) -> bool {
        let Some((rules, value, control)) = self.field_snapshot(name) else {
            return false;
        };
        let generation = self.stamp(name);
        let native = self.inner.config.native_validation;
        let outcome = validate_field(&rules, value, control, native).await;
        let clean = outcome.is_none();
        if self.discard(name, generation) {
            return clean;
        }
        self.merge_error(name, outcome, should_render);
        clean
    }

    /// One whole-form schema run; only entries for the triggering names
    /// merge into the live error map, so errors for unrelated fields are
    /// left untouched even when the run reveals changes elsewhere.
    async fn execute_schema_validation(&self, names: Vec<String>) -> bool {
        let Some(schema) = self.inner.config.schema.clone() else {
            return false;
        };
        let generations: Vec<u64> = names.iter().map(|n| self.stamp(n)).collect();
        let outcome = schema
            .validate(self.values_nested(), &self.inner.config.schema_options)
            .await;
        if self.inner.torn_down.get() {
            return false;
        }
        self.inner.schema_triggered.set(true);

        let live: Vec<String> = names
            .iter()
            .zip(&generations)
            .filter(|(name, generation)| self.is_current(name, **generation))
            .map(|(name, _)| name.clone())
            .collect();
        let valid_names: Vec<String> = live
            .iter()
            .filter(|name| !outcome.field_errors.contains_key(*name))
            .cloned()
            .collect();

        {
            let mut errors = self.inner.errors.borrow_mut();
            for name in &live {
                if let Some(entry) = outcome.field_errors.get(name) {
                    errors.insert(name.clone(), entry.clone());
                }
            }
            let merged = omit_valid_fields(std::mem::take(&mut *errors), &valid_names);
            *errors = merged;
        }
        *self.inner.schema_errors.borrow_mut() = outcome.field_errors;

        self.notify();
        self.inner.errors.borrow().is_empty()
    }

    /// Manually trigger validation for one field, a list, or (with
    /// `None`) every registered field. Resolves `true` iff every
    /// requested field ends with no error.
    pub async fn trigger_validation(&self, names: Option<&[&str]>) -> bool {
        let targets: Vec<String> = match names {
            Some(list) => list.iter().map(|s| s.to_string()).collect(),
            None => self.inner.fields.borrow().keys().cloned().collect(),
        };
        if self.inner.config.schema.is_some() {
            return self.execute_schema_validation(targets).await;
        }
        if targets.len() == 1 {
            return self.execute_validation(&targets[0], true).await;
        }
        let mut all_clean = true;
        for name in &targets {
            if !self.execute_validation(name, false).await {
                all_clean = false;
            }
        }
        self.notify();
        all_clean
    }

    // ---- manual errors ------------------------------------------------

    /// Inject a manual error. Ordinary event-path validation of other
    /// fields will not clear it.
    pub fn set_error(
        &self,
        name: &str,
        kind: &str,
        message: Option<&str>,
        control: Option<ControlHandle>,
    ) {
        let changed = {
            let mut errors = self.inner.errors.borrow_mut();
            if is_same_error(errors.get(name), kind, message) {
                false
            } else {
                errors.insert(
                    name.to_string(),
                    ErrorEntry::manual(kind, message.map(str::to_string), control),
                );
                true
            }
        };
        if changed {
            self.commit(RenderFlags::ERROR_CHANGED);
        }
    }

    /// Clear all errors, or just the named ones.
    pub fn clear_errors(&self, names: Option<&[&str]>) {
        {
            let mut errors = self.inner.errors.borrow_mut();
            match names {
                None => errors.clear(),
                Some(list) => {
                    for name in list {
                        errors.shift_remove(*name);
                    }
                }
            }
        }
        self.commit(RenderFlags::ERROR_CHANGED);
    }

    /// Error snapshot, restricted to `validation_fields` when configured.
    pub fn errors(&self) -> ErrorMap {
        let errors = self.inner.errors.borrow();
        match &self.inner.config.validation_fields {
            Some(names) => pick_errors(&errors, names),
            None => errors.clone(),
        }
    }

    // ---- watch --------------------------------------------------------

    /// Observe one field: live value if resolvable, else the caller
    /// fallback, else the configured default.
    pub fn watch(&self, name: &str, fallback: Option<Value>) -> Option<Value> {
        let values = get_field_values(&self.inner.fields.borrow());
        match self.inner.watch.resolve(&values, name) {
            Some(value) => Some(value),
            None => {
                fallback.or_else(|| get_default_value(&self.inner.config.default_values, name))
            }
        }
    }

    /// Observe a list of fields. With an empty registry a supplied
    /// fallback map wins over configured defaults.
    pub fn watch_many(&self, names: &[&str], fallback: Option<&FieldValues>) -> FieldValues {
        let registry_empty = self.inner.fields.borrow().is_empty();
        let values = get_field_values(&self.inner.fields.borrow());
        names
            .iter()
            .map(|name| {
                let mut value = get_default_value(&self.inner.config.default_values, name);
                if let (true, Some(fallback)) = (registry_empty, fallback) {
                    value = fallback.get(*name).cloned();
                } else if let Some(live) = self.inner.watch.resolve(&values, name) {
                    value = Some(live);
                }
                (name.to_string(), value.unwrap_or(Value::Null))
            })
            .collect()
    }

    /// Observe everything: every future field event forces a render, and
    /// the full live snapshot is returned (caller fallback, then
    /// configured defaults, when empty).
    pub fn watch_all(&self, fallback: Option<FieldValues>) -> FieldValues {
        self.inner.watch.mark_all();
        let values = get_field_values(&self.inner.fields.borrow());
        if !values.is_empty() {
            return values;
        }
        fallback.unwrap_or_else(|| self.inner.config.default_values.clone())
    }

    // ---- submit -------------------------------------------------------

    /// Validate the whole form (honoring `validation_fields`) and invoke
    /// `callback` with the nested value tree when everything is clean.
    /// Returns whether the callback ran. Counters advance either way,
    /// except when the form is torn down while the run is suspended: then
    /// the result is discarded wholesale and nothing is applied. Results
    /// for fields unregistered mid-flight are dropped the same way.
    pub async fn submit<F>(&self, callback: F) -> bool
    where
        F: FnOnce(Value),
    {
        self.inner.is_submitting.set(true);
        self.notify();

        let working_set: Vec<String> = match &self.inner.config.validation_fields {
            Some(names) => names.clone(),
            None => self.inner.fields.borrow().keys().cloned().collect(),
        };

        let mut field_errors = ErrorMap::new();
        let mut field_values = FieldValues::new();
        let mut schema_result: Option<Value> = None;

        if let Some(schema) = self.inner.config.schema.clone() {
            let outcome = schema
                .validate(self.values_nested(), &self.inner.config.schema_options)
                .await;
            *self.inner.schema_errors.borrow_mut() = outcome.field_errors.clone();
            field_errors = outcome.field_errors;
            schema_result = Some(outcome.result);
        } else {
            for name in &working_set {
                let Some((rules, value, control)) = self.field_snapshot(name) else {
                    continue;
                };
                let native = self.inner.config.native_validation;
                let error = validate_field(&rules, value, control, native).await;
                // The field may have been unregistered while we awaited.
                if !self.inner.fields.borrow().contains_key(name) {
                    continue;
                }
                match error {
                    Some(entry) => {
                        field_errors.insert(name.clone(), entry);
                        self.inner.state.borrow_mut().valid_fields.shift_remove(name);
                    }
                    None => {
                        {
                            let mut state = self.inner.state.borrow_mut();
                            if state.fields_with_validation.contains(name) {
                                state.valid_fields.insert(name.clone());
                            }
                        }
                        if let Some((_, current, _)) = self.field_snapshot(name) {
                            field_values.insert(name.clone(), current);
                        }
                    }
                }
            }
        }

        // Teardown while the run was suspended discards the whole result:
        // no error write, no focus, no callback, no counters.
        if self.inner.torn_down.get() {
            return false;
        }
        {
            let fields = self.inner.fields.borrow();
            field_errors.retain(|name, _| fields.contains_key(name));
            field_values.retain(|name, _| fields.contains_key(name));
        }

        let mut invoked = false;
        if field_errors.is_empty() {
            self.inner.errors.borrow_mut().clear();
            let values =
                schema_result.unwrap_or_else(|| combine_field_values(&field_values));
            callback(values);
            invoked = true;
        } else {
            if self.inner.config.submit_focus_error {
                let fields = self.inner.fields.borrow();
                for name in field_errors.keys() {
                    let focusable = fields
                        .get(name)
                        .and_then(|f| f.error_control())
                        .filter(|c| c.is_focusable());
                    if let Some(control) = focusable {
                        control.focus();
                        break;
                    }
                }
            }
            *self.inner.errors.borrow_mut() = field_errors;
        }

        self.inner.is_submitted.set(true);
        self.inner.is_submitting.set(false);
        self.inner.submit_count.set(self.inner.submit_count.get() + 1);
        self.notify();
        invoked
    }

    /// Build a reusable submit handler: each invocation yields the boxed
    /// submit future.
    pub fn handle_submit<F>(&self, callback: F) -> impl Fn() -> LocalBoxFuture<'static, bool>
    where
        F: Fn(Value) + 'static,
    {
        let form = self.clone();
        let callback = Rc::new(callback);
        move || {
            let form = form.clone();
            let callback = callback.clone();
            Box::pin(async move { form.submit(move |values| callback(values)).await })
        }
    }

    // ---- reset and snapshots ------------------------------------------

    /// Clear every derived set, the error maps, and the dirty baselines.
    /// With replacement values, each registered control is reseeded (to
    /// the replacement value, or cleared) and the baselines replaced
    /// wholesale.
    pub fn reset(&self, values: Option<FieldValues>) {
        self.inner.errors.borrow_mut().clear();
        self.inner.schema_errors.borrow_mut().clear();
        self.inner.schema_triggered.set(false);
        self.inner.state.borrow_mut().clear();
        self.inner.watch.clear();
        self.inner.default_values.borrow_mut().clear();
        self.inner.generations.borrow_mut().clear();
        self.inner.is_submitted.set(false);

        if let Some(values) = values {
            {
                let fields = self.inner.fields.borrow();
                let names: Vec<String> = fields.keys().cloned().collect();
                for name in names {
                    let replacement =
                        get_default_value(&values, &name).unwrap_or(Value::Null);
                    set_field_value(&fields, &name, &replacement);
                }
            }
            *self.inner.default_values.borrow_mut() = values;
        }

        self.inner.submit_count.set(0);
        self.notify();
    }

    /// Aggregate form state; everything but the submit counters is
    /// derived on the spot.
    pub fn form_state(&self) -> FormStateSnapshot {
        let state = self.inner.state.borrow();
        let errors = self.inner.errors.borrow();
        let fields_empty = self.inner.fields.borrow().is_empty();

        let is_valid = if self.inner.config.mode.is_on_submit() {
            errors.is_empty()
        } else if self.inner.config.schema.is_some() {
            self.inner.schema_triggered.get() && self.inner.schema_errors.borrow().is_empty()
        } else if !state.fields_with_validation.is_empty() {
            !fields_empty && state.valid_fields.len() >= state.fields_with_validation.len()
        } else {
            !fields_empty
        };

        FormStateSnapshot {
            is_dirty: state.is_dirty,
            is_submitted: self.inner.is_submitted.get(),
            submit_count: self.inner.submit_count.get(),
            touched: state.touched.iter().cloned().collect(),
            is_submitting: self.inner.is_submitting.get(),
            is_valid,
        }
    }
}
