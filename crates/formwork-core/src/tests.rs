#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::future::Future;
    use std::pin::Pin;
    use std::rc::Rc;
    use std::task::{Context, Poll, Waker};

    use futures::future::LocalBoxFuture;
    use serde_json::{Value, json};

    use crate::control::ControlHandle;
    use crate::errors::ErrorMap;
    use crate::field::{RuleSet, RuleViolation};
    use crate::form::{Form, FormConfig};
    use crate::hooks::FormHooks;
    use crate::host::InMemoryHost;
    use crate::schema::{SchemaOptions, SchemaOutcome, SchemaValidator};
    use crate::validate::{EventKind, Mode};
    use crate::values::FieldValues;

    fn hosted(config: FormConfig) -> (Form, InMemoryHost, Rc<Cell<u32>>) {
        let host = InMemoryHost::new();
        let renders = Rc::new(Cell::new(0u32));
        let hooks = FormHooks::new()
            .binder(Rc::new(host.clone()))
            .removal(Rc::new(host.clone()))
            .notify({
                let renders = renders.clone();
                move || renders.set(renders.get() + 1)
            });
        (Form::with_hooks(config, hooks), host, renders)
    }

    fn fire(host: &InMemoryHost, name: &str, kind: EventKind) -> bool {
        match host.fire(name, kind) {
            Some(fut) => {
                pollster::block_on(fut);
                true
            }
            None => false,
        }
    }

    /// Suspends exactly once, so tests can interleave validations.
    struct YieldOnce(bool);

    impl Future for YieldOnce {
        type Output = ();
        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.0 {
                Poll::Ready(())
            } else {
                self.0 = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }

    fn poll_once<F: Future>(fut: &mut Pin<Box<F>>) -> Poll<F::Output> {
        let mut cx = Context::from_waker(Waker::noop());
        fut.as_mut().poll(&mut cx)
    }

    /// Schema stub answering with a preset error map and echoing the
    /// values back as the coerced result.
    struct StubSchema {
        errors: Rc<RefCell<ErrorMap>>,
    }

    impl SchemaValidator for StubSchema {
        fn validate(
            &self,
            values: Value,
            _options: &SchemaOptions,
        ) -> LocalBoxFuture<'static, SchemaOutcome> {
            let field_errors = self.errors.borrow().clone();
            Box::pin(async move {
                SchemaOutcome {
                    field_errors,
                    result: values,
                }
            })
        }
    }

    fn error_entry(kind: &str) -> crate::errors::ErrorEntry {
        crate::errors::ErrorEntry::new(kind, None, None)
    }

    // ---- registry ------------------------------------------------------

    #[test]
    fn unregistered_names_are_noops() {
        let form = Form::new(FormConfig::new());
        pollster::block_on(async {
            assert!(!form.set_value_validated("ghost", json!("x")).await);
            assert!(!form.trigger_validation(Some(&["ghost"])).await);
        });
        assert!(form.errors().is_empty());
        assert!(form.form_state().touched.is_empty());
    }

    #[test]
    fn nameless_control_registration_is_skipped() {
        let form = Form::new(FormConfig::new());
        form.register(&ControlHandle::text(""));
        assert!(form.values().is_empty());
    }

    #[test]
    fn reregistration_is_idempotent() {
        let form = Form::new(
            FormConfig::new().default_value("email", json!("seed@x.io")),
        );
        let email = ControlHandle::text("email");
        form.register(&email);
        assert_eq!(email.raw_value(), "seed@x.io");

        email.set_raw_value("edited@x.io");
        form.register(&email);
        // A second registration must not re-seed the default.
        assert_eq!(email.raw_value(), "edited@x.io");
    }

    #[test]
    fn radio_options_group_under_one_descriptor() {
        let form = Form::new(FormConfig::new());
        let small = ControlHandle::radio("size", "s");
        let large = ControlHandle::radio("size", "l");
        form.register(&small);
        form.register(&large);
        form.register(&ControlHandle::radio("size", "l")); // duplicate value, ignored

        form.set_value("size", json!("l"));
        assert!(!small.is_checked());
        assert!(large.is_checked());
        assert_eq!(form.values().get("size"), Some(&json!("l")));
    }

    #[test]
    fn unregister_cascades_into_every_slice() {
        let (form, _host, _renders) = hosted(FormConfig::new());
        let email = ControlHandle::text("email");
        form.register_with(&email, RuleSet::new().required());
        pollster::block_on(form.trigger_validation(None));
        assert!(form.errors().contains_key("email"));

        form.unregister("email");
        assert!(!form.is_registered("email"));
        assert!(form.errors().is_empty());
        assert!(form.values().is_empty());
        assert!(form.form_state().touched.is_empty());
    }

    #[test]
    fn host_removal_unregisters_the_field() {
        let (form, host, _renders) = hosted(FormConfig::new());
        let email = ControlHandle::text("email");
        form.register(&email);
        assert!(form.is_registered("email"));

        host.remove(&email);
        assert!(!form.is_registered("email"));
        assert!(!host.is_mounted(&email));
    }

    // ---- value access --------------------------------------------------

    #[test]
    fn accessor_round_trips_every_control_kind() {
        let form = Form::new(FormConfig::new());
        let agree = ControlHandle::checkbox("agree");
        let tags = ControlHandle::multi_select("tags", &["a", "b", "c"]);
        let plan = ControlHandle::select("plan", &["free", "pro"]);
        form.register(&agree);
        form.register(&tags);
        form.register(&plan);

        form.set_value("agree", json!(true));
        form.set_value("tags", json!(["a", "c"]));
        form.set_value("plan", json!("pro"));

        let values = form.values();
        assert_eq!(values.get("agree"), Some(&json!(true)));
        assert_eq!(values.get("tags"), Some(&json!(["a", "c"])));
        assert_eq!(values.get("plan"), Some(&json!("pro")));
    }

    #[test]
    fn null_written_to_a_control_becomes_empty_string() {
        let form = Form::new(FormConfig::new());
        let name = ControlHandle::text("name");
        name.set_raw_value("jane");
        form.register(&name);

        form.set_value("name", Value::Null);
        assert_eq!(name.raw_value(), "");
    }

    #[test]
    fn nested_names_fold_into_a_value_tree() {
        let form = Form::new(FormConfig::new());
        let email = ControlHandle::text("user.email");
        let phone = ControlHandle::text("phones[0]");
        email.set_raw_value("a@b.com");
        phone.set_raw_value("123");
        form.register(&email);
        form.register(&phone);

        assert_eq!(
            form.values_nested(),
            json!({ "user": { "email": "a@b.com" }, "phones": ["123"] })
        );
    }

    // ---- dirty / touched ----------------------------------------------

    #[test]
    fn dirty_tracks_divergence_from_the_default() {
        let form = Form::new(FormConfig::new().default_value("name", json!("jane")));
        let name = ControlHandle::text("name");
        form.register(&name);
        assert!(!form.form_state().is_dirty);

        form.set_value("name", json!("joe"));
        assert!(form.form_state().is_dirty);

        form.set_value("name", json!("jane"));
        assert!(!form.form_state().is_dirty);
    }

    #[test]
    fn reset_clears_derived_state_but_not_configured_defaults() {
        let form = Form::new(FormConfig::new().default_value("name", json!("jane")));
        let name = ControlHandle::text("name");
        form.register(&name);
        form.set_value("name", json!("joe"));
        assert!(form.form_state().is_dirty);
        assert!(!form.form_state().touched.is_empty());

        form.reset(None);
        let state = form.form_state();
        assert!(!state.is_dirty);
        assert!(state.touched.is_empty());
        assert_eq!(state.submit_count, 0);
        // Configured defaults still seed future registrations.
        let other = ControlHandle::text("name2");
        form.register(&other);
        assert_eq!(
            crate::values::get_default_value(
                &FieldValues::from_iter([("name".to_string(), json!("jane"))]),
                "name"
            ),
            Some(json!("jane"))
        );
    }

    #[test]
    fn values_reset_round_trip_is_stable() {
        let form = Form::new(FormConfig::new());
        let a = ControlHandle::text("a");
        let b = ControlHandle::checkbox("b");
        a.set_raw_value("1");
        b.set_checked(true);
        form.register(&a);
        form.register(&b);

        let snapshot = form.values();
        form.reset(Some(snapshot.clone()));
        assert_eq!(form.values(), snapshot);
        assert!(!form.form_state().is_dirty);
    }

    // ---- rule engine ---------------------------------------------------

    #[test]
    fn required_error_appears_and_clears() {
        let form = Form::new(FormConfig::new());
        let email = ControlHandle::text("email");
        form.register_with(&email, RuleSet::new().required_with("need an email"));

        pollster::block_on(async {
            assert!(!form.trigger_validation(Some(&["email"])).await);
            let errors = form.errors();
            let entry = errors.get("email").unwrap();
            assert_eq!(entry.kind, "required");
            assert_eq!(entry.message.as_deref(), Some("need an email"));

            email.set_raw_value("a@b.com");
            assert!(form.trigger_validation(Some(&["email"])).await);
            assert!(form.errors().is_empty());
        });
    }

    #[test]
    fn builtin_rules_fire_in_declaration_order() {
        let form = Form::new(FormConfig::new());
        let age = ControlHandle::text("age");
        form.register_with(
            &age,
            RuleSet::new().required().min(18.0).max_with(130.0, "too old"),
        );

        pollster::block_on(async {
            age.set_raw_value("12");
            form.trigger_validation(Some(&["age"])).await;
            assert_eq!(form.errors().get("age").unwrap().kind, "min");

            age.set_raw_value("200");
            form.trigger_validation(Some(&["age"])).await;
            let errors = form.errors();
            let entry = errors.get("age").unwrap();
            assert_eq!(entry.kind, "max");
            assert_eq!(entry.message.as_deref(), Some("too old"));

            age.set_raw_value("42");
            assert!(form.trigger_validation(Some(&["age"])).await);
        });
    }

    #[test]
    fn pattern_and_length_rules() {
        let form = Form::new(FormConfig::new());
        let user = ControlHandle::text("user");
        form.register_with(
            &user,
            RuleSet::new().min_length(3).max_length(8).pattern("^[a-z]+$"),
        );

        pollster::block_on(async {
            user.set_raw_value("ab");
            form.trigger_validation(None).await;
            assert_eq!(form.errors().get("user").unwrap().kind, "minLength");

            user.set_raw_value("ABCDEF");
            form.trigger_validation(None).await;
            assert_eq!(form.errors().get("user").unwrap().kind, "pattern");

            user.set_raw_value("abcdef");
            assert!(form.trigger_validation(None).await);
        });
    }

    #[test]
    fn custom_validator_key_becomes_the_error_kind() {
        let form = Form::new(FormConfig::new());
        let handle = ControlHandle::text("handle");
        form.register_with(
            &handle,
            RuleSet::new().validate("no_admin", |v| {
                if v.as_str() == Some("admin") {
                    Err(RuleViolation::new("reserved"))
                } else {
                    Ok(())
                }
            }),
        );

        pollster::block_on(async {
            handle.set_raw_value("admin");
            form.trigger_validation(None).await;
            let errors = form.errors();
            let entry = errors.get("handle").unwrap();
            assert_eq!(entry.kind, "no_admin");
            assert_eq!(entry.message.as_deref(), Some("reserved"));
        });
    }

    #[test]
    fn native_validation_defers_to_the_control() {
        let form = Form::new(FormConfig::new().native_validation(true));
        let email = ControlHandle::text("email");
        form.register_with(&email, RuleSet::new().required());

        pollster::block_on(async {
            email.set_native_error(Some("please fill out this field"));
            assert!(!form.trigger_validation(Some(&["email"])).await);
            assert_eq!(form.errors().get("email").unwrap().kind, "native");

            email.set_native_error(None);
            // The rule engine stays bypassed: empty but natively valid.
            assert!(form.trigger_validation(Some(&["email"])).await);
        });
    }

    // ---- mode gating ---------------------------------------------------

    #[test]
    fn on_submit_mode_defers_event_validation_until_first_submit() {
        let (form, host, _renders) = hosted(FormConfig::new().mode(Mode::OnSubmit));
        let email = ControlHandle::text("email");
        form.register_with(&email, RuleSet::new().required());

        assert!(fire(&host, "email", EventKind::Input));
        assert!(form.errors().is_empty());

        let invoked = pollster::block_on(form.submit(|_| {}));
        assert!(!invoked);
        assert!(form.errors().contains_key("email"));

        email.set_raw_value("a@b.com");
        fire(&host, "email", EventKind::Input);
        assert!(form.errors().is_empty());
    }

    #[test]
    fn on_blur_mode_delivers_only_blur_events() {
        let (form, host, _renders) = hosted(FormConfig::new().mode(Mode::OnBlur));
        let email = ControlHandle::text("email");
        form.register_with(&email, RuleSet::new().required());

        // Input events are not even delivered by a blur-only binding.
        assert!(!fire(&host, "email", EventKind::Input));

        assert!(fire(&host, "email", EventKind::Blur));
        assert!(form.errors().contains_key("email"));
    }

    #[test]
    fn on_change_mode_validates_every_input() {
        let (form, host, _renders) = hosted(FormConfig::new().mode(Mode::OnChange));
        let email = ControlHandle::text("email");
        form.register_with(&email, RuleSet::new().required());

        fire(&host, "email", EventKind::Input);
        assert!(form.errors().contains_key("email"));

        email.set_raw_value("a@b.com");
        fire(&host, "email", EventKind::Input);
        assert!(form.errors().is_empty());
    }

    #[test]
    fn identical_error_outcome_does_not_force_a_render() {
        let (form, host, renders) = hosted(FormConfig::new().mode(Mode::OnChange));
        let email = ControlHandle::text("email");
        form.register_with(&email, RuleSet::new().required());

        fire(&host, "email", EventKind::Input);
        let after_first = renders.get();
        assert!(form.errors().contains_key("email"));

        // Same value, same outcome: the merge happens, no render does.
        fire(&host, "email", EventKind::Input);
        assert_eq!(renders.get(), after_first);
    }

    #[test]
    fn eager_registration_validation_feeds_is_valid_without_errors() {
        let (form, _host, _renders) = hosted(FormConfig::new().mode(Mode::OnChange));
        let filled = ControlHandle::text("filled");
        filled.set_raw_value("x");
        form.register_with(&filled, RuleSet::new().required());

        pollster::block_on(form.flush());
        assert!(form.form_state().is_valid);
        assert!(form.errors().is_empty());

        let empty = ControlHandle::text("empty");
        form.register_with(&empty, RuleSet::new().required());
        pollster::block_on(form.flush());
        assert!(!form.form_state().is_valid);
        // Eager validation never writes user-visible errors.
        assert!(form.errors().is_empty());
    }

    // ---- end-to-end set_value_validated -------------------------------

    #[test]
    fn set_value_validated_round_trip() {
        let form = Form::new(FormConfig::new().mode(Mode::OnChange));
        let email = ControlHandle::text("email");
        form.register_with(&email, RuleSet::new().required());

        pollster::block_on(async {
            assert!(!form.set_value_validated("email", json!("")).await);
            assert!(form.errors().contains_key("email"));
            assert!(!form.form_state().is_valid);

            assert!(form.set_value_validated("email", json!("a@b.com")).await);
            assert!(!form.errors().contains_key("email"));
            assert!(form.form_state().is_valid);
        });
    }

    // ---- manual errors -------------------------------------------------

    #[test]
    fn manual_errors_survive_event_validation() {
        let (form, host, _renders) = hosted(FormConfig::new().mode(Mode::OnChange));
        let email = ControlHandle::text("email");
        email.set_raw_value("a@b.com");
        form.register(&email);

        form.set_error("email", "taken", Some("already registered"), None);
        assert!(form.errors().get("email").unwrap().is_manual);

        // A clean event-path result must not clear the manual entry.
        fire(&host, "email", EventKind::Input);
        assert_eq!(form.errors().get("email").unwrap().kind, "taken");

        // An explicit trigger does.
        pollster::block_on(form.trigger_validation(Some(&["email"])));
        assert!(form.errors().is_empty());
    }

    #[test]
    fn set_error_with_identical_content_is_render_silent() {
        let (form, _host, renders) = hosted(FormConfig::new());
        form.set_error("a", "taken", Some("dup"), None);
        let count = renders.get();
        form.set_error("a", "taken", Some("dup"), None);
        assert_eq!(renders.get(), count);
    }

    #[test]
    fn clear_errors_scopes_to_names() {
        let form = Form::new(FormConfig::new());
        form.set_error("a", "x", None, None);
        form.set_error("b", "y", None, None);

        form.clear_errors(Some(&["a"]));
        assert!(!form.errors().contains_key("a"));
        assert!(form.errors().contains_key("b"));

        form.clear_errors(None);
        assert!(form.errors().is_empty());
    }

    // ---- watch ---------------------------------------------------------

    #[test]
    fn watch_all_falls_back_to_configured_defaults() {
        let form = Form::new(FormConfig::new().default_value("email", json!("seed@x.io")));
        let snapshot = form.watch_all(None);
        assert_eq!(snapshot.get("email"), Some(&json!("seed@x.io")));

        let email = ControlHandle::text("email");
        form.register(&email);
        form.set_value("email", json!("live@x.io"));
        let snapshot = form.watch_all(None);
        assert_eq!(snapshot.get("email"), Some(&json!("live@x.io")));
    }

    #[test]
    fn watch_single_prefers_live_then_fallback_then_default() {
        let form = Form::new(FormConfig::new().default_value("a", json!("default")));
        assert_eq!(form.watch("a", None), Some(json!("default")));
        assert_eq!(form.watch("a", Some(json!("fallback"))), Some(json!("fallback")));

        // Registration seeds the configured default into the control; a
        // later write is what makes the live value win.
        let a = ControlHandle::text("a");
        form.register(&a);
        assert_eq!(form.watch("a", Some(json!("fallback"))), Some(json!("default")));
        a.set_raw_value("live");
        assert_eq!(form.watch("a", Some(json!("fallback"))), Some(json!("live")));
    }

    #[test]
    fn watch_many_fallback_wins_on_empty_registry() {
        let form = Form::new(FormConfig::new().default_value("a", json!("default")));
        let fallback = FieldValues::from_iter([("a".to_string(), json!("fb"))]);
        let out = form.watch_many(&["a", "b"], Some(&fallback));
        assert_eq!(out.get("a"), Some(&json!("fb")));
        assert_eq!(out.get("b"), Some(&Value::Null));
    }

    #[test]
    fn watched_fields_force_renders_through_the_gate() {
        let (form, host, renders) = hosted(FormConfig::new().mode(Mode::OnSubmit));
        let email = ControlHandle::text("email");
        form.register(&email);
        form.watch_all(None);

        let before = renders.get();
        // Gated mode, no dirty change, already touched after the first
        // event; only the watch-all flag keeps renders coming.
        fire(&host, "email", EventKind::Input);
        fire(&host, "email", EventKind::Input);
        assert!(renders.get() >= before + 2);
    }

    // ---- submit --------------------------------------------------------

    #[test]
    fn failed_submit_reports_errors_focuses_and_counts() {
        let (form, _host, _renders) = hosted(FormConfig::new());
        let a = ControlHandle::text("a");
        let b = ControlHandle::text("b");
        b.set_raw_value("filled");
        form.register_with(&a, RuleSet::new().required());
        form.register_with(&b, RuleSet::new().required());

        let invoked = Rc::new(Cell::new(false));
        let flag = invoked.clone();
        let ran = pollster::block_on(form.submit(move |_| flag.set(true)));

        assert!(!ran);
        assert!(!invoked.get());
        let errors = form.errors();
        assert!(errors.contains_key("a"));
        assert!(!errors.contains_key("b"));
        assert!(a.is_focused());
        assert!(!b.is_focused());

        let state = form.form_state();
        assert_eq!(state.submit_count, 1);
        assert!(state.is_submitted);
        assert!(!state.is_submitting);
    }

    #[test]
    fn submit_focus_can_be_disabled() {
        let form = Form::new(FormConfig::new().submit_focus_error(false));
        let a = ControlHandle::text("a");
        form.register_with(&a, RuleSet::new().required());
        pollster::block_on(form.submit(|_| {}));
        assert!(!a.is_focused());
    }

    #[test]
    fn successful_submit_delivers_nested_values() {
        let form = Form::new(FormConfig::new());
        let email = ControlHandle::text("user.email");
        email.set_raw_value("a@b.com");
        form.register_with(&email, RuleSet::new().required());

        let seen = Rc::new(RefCell::new(Value::Null));
        let sink = seen.clone();
        let ran = pollster::block_on(form.submit(move |values| {
            *sink.borrow_mut() = values;
        }));

        assert!(ran);
        assert_eq!(*seen.borrow(), json!({ "user": { "email": "a@b.com" } }));
        assert!(form.errors().is_empty());
    }

    #[test]
    fn handle_submit_yields_a_reusable_handler() {
        let form = Form::new(FormConfig::new());
        let a = ControlHandle::text("a");
        a.set_raw_value("1");
        form.register(&a);

        let count = Rc::new(Cell::new(0u32));
        let counter = count.clone();
        let handler = form.handle_submit(move |_| counter.set(counter.get() + 1));

        assert!(pollster::block_on(handler()));
        assert!(pollster::block_on(handler()));
        assert_eq!(count.get(), 2);
        assert_eq!(form.form_state().submit_count, 2);
    }

    #[test]
    fn validation_fields_restrict_submit_and_exposed_errors() {
        let (form, host, _renders) = hosted(
            FormConfig::new()
                .mode(Mode::OnChange)
                .validation_fields(&["a"]),
        );
        let a = ControlHandle::text("a");
        let b = ControlHandle::text("b");
        form.register_with(&a, RuleSet::new().required());
        form.register_with(&b, RuleSet::new().required());

        // Events for excluded fields are ignored outright.
        fire(&host, "b", EventKind::Input);
        assert!(form.errors().is_empty());

        pollster::block_on(form.submit(|_| {}));
        let errors = form.errors();
        assert!(errors.contains_key("a"));
        assert!(!errors.contains_key("b"));
    }

    #[test]
    fn disposed_form_discards_a_submit_in_flight() {
        let form = Form::new(FormConfig::new());
        let a = ControlHandle::text("a");
        let b = ControlHandle::text("b");
        b.set_raw_value("1");
        // "a" fails fast; the run then suspends inside "b"'s validator
        // with the "a" error only in the local accumulator.
        form.register_with(&a, RuleSet::new().required());
        form.register_with(
            &b,
            RuleSet::new().validate_async("slow", |_| {
                Box::pin(async {
                    YieldOnce(false).await;
                    Ok(())
                })
            }),
        );

        let invoked = Rc::new(Cell::new(false));
        let flag = invoked.clone();
        let mut fut = Box::pin(form.submit(move |_| flag.set(true)));
        assert!(poll_once(&mut fut).is_pending());

        form.dispose();
        let ran = match poll_once(&mut fut) {
            Poll::Ready(ran) => ran,
            Poll::Pending => pollster::block_on(fut),
        };
        // The whole result is discarded: no error write, no callback, no
        // counters.
        assert!(!ran);
        assert!(!invoked.get());
        assert!(form.errors().is_empty());
        assert!(!a.is_focused());
        assert_eq!(form.form_state().submit_count, 0);
        assert!(!form.form_state().is_submitted);
    }

    #[test]
    fn submit_drops_results_for_fields_unregistered_mid_flight() {
        let form = Form::new(FormConfig::new());
        let a = ControlHandle::text("a");
        let b = ControlHandle::text("b");
        form.register_with(&a, RuleSet::new().required());
        form.register_with(&b, slow_value_rules());

        // "a"'s required error is already in the accumulator when the run
        // suspends; unregistering "a" must drop it on resume.
        let mut fut = Box::pin(form.submit(|_| {}));
        assert!(poll_once(&mut fut).is_pending());

        form.unregister("a");
        let ran = match poll_once(&mut fut) {
            Poll::Ready(ran) => ran,
            Poll::Pending => pollster::block_on(fut),
        };
        assert!(ran);
        assert!(form.errors().is_empty());
        assert!(form.form_state().is_submitted);
        assert_eq!(form.form_state().submit_count, 1);
    }

    // ---- async interleavings ------------------------------------------

    fn slow_value_rules() -> RuleSet {
        RuleSet::new().validate_async("slow", |value| {
            Box::pin(async move {
                YieldOnce(false).await;
                if value.as_str() == Some("bad") {
                    Err(RuleViolation::new("bad value"))
                } else {
                    Ok(())
                }
            })
        })
    }

    #[test]
    fn stale_validation_result_is_discarded() {
        let form = Form::new(FormConfig::new());
        let a = ControlHandle::text("a");
        a.set_raw_value("bad");
        form.register_with(&a, slow_value_rules());

        // First run snapshots "bad" and suspends inside the validator.
        let names = ["a"];
        let mut stale = Box::pin(form.trigger_validation(Some(&names)));
        assert!(poll_once(&mut stale).is_pending());

        // A newer run completes cleanly in the meantime.
        a.set_raw_value("good");
        assert!(pollster::block_on(form.trigger_validation(Some(&["a"]))));
        assert!(form.errors().is_empty());

        // The first run resolves late; its failing result must not
        // overwrite the fresher clean state.
        let _ = pollster::block_on(stale);
        assert!(form.errors().is_empty());
    }

    #[test]
    fn in_flight_result_for_an_unregistered_field_is_discarded() {
        let form = Form::new(FormConfig::new());
        let a = ControlHandle::text("a");
        form.register_with(&a, RuleSet::new().required().validate_async("slow", |_| {
            Box::pin(async {
                YieldOnce(false).await;
                Ok(())
            })
        }));
        a.set_raw_value("x");

        let names = ["a"];
        let mut fut = Box::pin(form.trigger_validation(Some(&names)));
        assert!(poll_once(&mut fut).is_pending());

        form.unregister("a");
        let _ = pollster::block_on(fut);
        assert!(form.errors().is_empty());
        assert!(form.values().is_empty());
    }

    // ---- schema path ---------------------------------------------------

    fn schema_form(errors: Rc<RefCell<ErrorMap>>) -> Form {
        Form::new(FormConfig::new().mode(Mode::OnChange).schema(StubSchema { errors }))
    }

    #[test]
    fn schema_errors_merge_only_for_triggering_fields() {
        let schema_errors = Rc::new(RefCell::new(ErrorMap::new()));
        schema_errors
            .borrow_mut()
            .insert("a".to_string(), error_entry("invalid"));
        schema_errors
            .borrow_mut()
            .insert("b".to_string(), error_entry("invalid"));

        let form = schema_form(schema_errors.clone());
        let a = ControlHandle::text("a");
        let b = ControlHandle::text("b");
        form.register(&a);
        form.register(&b);

        pollster::block_on(form.trigger_validation(Some(&["a"])));
        // The run reported both fields invalid; only the triggered one
        // lands in the live map.
        assert!(form.errors().contains_key("a"));
        assert!(!form.errors().contains_key("b"));
        assert!(!form.form_state().is_valid);
    }

    #[test]
    fn schema_clean_run_clears_triggered_names_and_validates() {
        let schema_errors = Rc::new(RefCell::new(ErrorMap::new()));
        let form = schema_form(schema_errors.clone());
        let a = ControlHandle::text("a");
        form.register(&a);

        schema_errors
            .borrow_mut()
            .insert("a".to_string(), error_entry("invalid"));
        pollster::block_on(form.trigger_validation(Some(&["a"])));
        assert!(form.errors().contains_key("a"));

        schema_errors.borrow_mut().clear();
        assert!(pollster::block_on(form.trigger_validation(Some(&["a"]))));
        assert!(form.errors().is_empty());
        assert!(form.form_state().is_valid);
    }

    #[test]
    fn schema_submit_hands_back_the_coerced_result() {
        let schema_errors = Rc::new(RefCell::new(ErrorMap::new()));
        let form = Form::new(FormConfig::new().schema(StubSchema {
            errors: schema_errors,
        }));
        let a = ControlHandle::text("user.name");
        a.set_raw_value("jane");
        form.register(&a);

        let seen = Rc::new(RefCell::new(Value::Null));
        let sink = seen.clone();
        assert!(pollster::block_on(form.submit(move |values| {
            *sink.borrow_mut() = values;
        })));
        assert_eq!(*seen.borrow(), json!({ "user": { "name": "jane" } }));
    }
}
