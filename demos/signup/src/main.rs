//! Headless signup form: registers a handful of controls against an
//! in-memory host, walks through a failed and a successful submit, and
//! logs the derived state along the way.

use std::rc::Rc;

use formwork_core::{
    ControlHandle, EventKind, Form, FormConfig, FormHooks, InMemoryHost, Mode, RuleSet,
    RuleViolation,
};
use serde_json::json;

fn fire(host: &InMemoryHost, name: &str, kind: EventKind) {
    if let Some(fut) = host.fire(name, kind) {
        pollster::block_on(fut);
    }
}

fn main() {
    env_logger::init();

    let host = InMemoryHost::new();
    let hooks = FormHooks::new()
        .binder(Rc::new(host.clone()))
        .removal(Rc::new(host.clone()))
        .notify(|| log::debug!("render"));
    let form = Form::with_hooks(
        FormConfig::new()
            .mode(Mode::OnChange)
            .default_value("plan", json!("free")),
        hooks,
    );

    let email = ControlHandle::text("email");
    let password = ControlHandle::text("password");
    let plan = ControlHandle::select("plan", &["free", "pro"]);
    let agree = ControlHandle::checkbox("agree");

    form.register_with(
        &email,
        RuleSet::new()
            .required_with("email is required")
            .pattern_with("^[^@]+@[^@]+$", "not an email address"),
    );
    form.register_with(
        &password,
        RuleSet::new()
            .required()
            .min_length_with(8, "at least 8 characters"),
    );
    form.register(&plan);
    form.register_with(
        &agree,
        RuleSet::new().validate("must_agree", |v| {
            if v.as_bool() == Some(true) {
                Ok(())
            } else {
                Err(RuleViolation::new("you must accept the terms"))
            }
        }),
    );
    pollster::block_on(form.flush());

    // The user types a bad email and a short password.
    email.set_raw_value("not-an-email");
    fire(&host, "email", EventKind::Input);
    password.set_raw_value("hunter2");
    fire(&host, "password", EventKind::Input);

    let ran = pollster::block_on(form.submit(|_| {}));
    println!("first submit ran callback: {ran}");
    for (name, error) in form.errors().iter() {
        println!(
            "  {name}: {} ({})",
            error.kind,
            error.message.as_deref().unwrap_or("no message")
        );
    }

    // Fix everything and go again.
    pollster::block_on(form.set_value_validated("email", json!("jane@example.com")));
    pollster::block_on(form.set_value_validated("password", json!("correct horse battery")));
    form.set_value("plan", json!("pro"));
    pollster::block_on(form.set_value_validated("agree", json!(true)));

    let ran = pollster::block_on(form.submit(|values| {
        println!("submitted: {values}");
    }));
    println!("second submit ran callback: {ran}");
    println!(
        "state: {}",
        serde_json::to_string(&form.form_state()).unwrap_or_default()
    );
}
