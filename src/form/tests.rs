use super::*;
use futures::channel::oneshot;
use futures::executor::block_on;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::tree::{ErrorTree, FieldPath, Value, get_in};

#[derive(Clone, Debug, PartialEq, Deserialize, calmform_derive::FormModel)]
struct SignupForm {
    email: String,
    age: u32,
    newsletter: bool,
}

fn signup() -> SignupForm {
    SignupForm {
        email: "ada@example.com".to_string(),
        age: 36,
        newsletter: false,
    }
}

fn profile_values() -> Value {
    Value::map([("email", Value::from("")), ("name", Value::from("Ada"))])
}

fn noop_submit() -> impl SubmitHandler {
    |_values: Value, _form: FormController| async { Ok::<(), ValidatorError>(()) }
}

fn without_auto_validation() -> FormOptions {
    FormOptions {
        validate_on_change: false,
        validate_on_blur: false,
        ..FormOptions::default()
    }
}

fn required(value: &Value) -> Option<ErrorTree> {
    value
        .as_str()
        .is_none_or(str::is_empty)
        .then(|| Value::from("required"))
}

fn at<'a>(tree: &'a Value, path: &str) -> &'a Value {
    get_in(tree, &FieldPath::parse(path))
}

fn settle<T: Send + 'static>(task: FormResult<ValidationTask<T>>) -> T {
    block_on(task.expect("validation task")).expect("validation result")
}

/// Form validator that completes each run with whatever its gate receives,
/// in the order the runs were started.
fn gated_form_validator(gates: Vec<oneshot::Receiver<ErrorTree>>) -> impl FormValidator {
    let gates = Arc::new(Mutex::new(VecDeque::from(gates)));
    move |_values: Value| {
        let gate = gates.lock().expect("gates lock").pop_front();
        async move {
            let errors = match gate {
                Some(gate) => gate.await.unwrap_or_default(),
                None => Value::empty_map(),
            };
            Ok::<ErrorTree, FormValidatorError>(errors)
        }
    }
}

fn gated_field_validator(gates: Vec<oneshot::Receiver<Option<ErrorTree>>>) -> impl FieldValidator {
    let gates = Arc::new(Mutex::new(VecDeque::from(gates)));
    move |_value: Value| {
        let gate = gates.lock().expect("gates lock").pop_front();
        async move {
            let error = match gate {
                Some(gate) => gate.await.ok().flatten(),
                None => None,
            };
            Ok::<Option<ErrorTree>, ValidatorError>(error)
        }
    }
}

struct FieldSchema {
    errors: ErrorTree,
}

impl Schema for FieldSchema {
    fn validate(&self, _values: Value) -> BoxedValidationFuture<Option<ErrorTree>, SchemaError> {
        let errors = self.errors.clone();
        Box::pin(async move { Ok((!errors.is_structurally_empty()).then_some(errors)) })
    }
}

struct ScopedSchema {
    full_runs: Arc<AtomicUsize>,
}

impl Schema for ScopedSchema {
    fn validate(&self, _values: Value) -> BoxedValidationFuture<Option<ErrorTree>, SchemaError> {
        self.full_runs.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(Some(Value::map([("address", "full: invalid")]))) })
    }

    fn validate_at(
        &self,
        path: &FieldPath,
        _values: Value,
    ) -> Option<BoxedValidationFuture<Option<ErrorTree>, SchemaError>> {
        let errors = Value::map([
            ("city", "scoped: required"),
            ("zip", "scoped: invalid"),
        ]);
        let scoped = (path == &FieldPath::parse("address")).then_some(errors);
        Some(Box::pin(async move { Ok(scoped) }))
    }
}

struct BrokenSchema;

impl Schema for BrokenSchema {
    fn validate(&self, _values: Value) -> BoxedValidationFuture<Option<ErrorTree>, SchemaError> {
        Box::pin(async { Err(SchemaError::new("rule `emial` is not defined")) })
    }
}

#[test]
fn blocked_submit_touches_every_field_and_skips_the_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let form = FormController::new(FormConfig::new(
        profile_values(),
        move |_values: Value, _form: FormController| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), ValidatorError>(())
            }
        },
    ));
    form.register_field_validator("email", sync_field_validator(required))
        .expect("register email");
    form.register_field("nickname").expect("register nickname");

    let outcome = block_on(form.submit_form()).expect("submit");
    assert_eq!(
        outcome,
        SubmitOutcome::Blocked(Value::map([("email", "required")]))
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let snapshot = form.snapshot().expect("snapshot");
    assert!(!snapshot.is_submitting);
    assert!(!snapshot.is_validating);
    assert!(!snapshot.is_valid);
    assert_eq!(snapshot.submit_count, 1);
    assert_eq!(at(&snapshot.touched, "email"), &Value::Bool(true));
    assert_eq!(at(&snapshot.touched, "name"), &Value::Bool(true));
    assert_eq!(at(&snapshot.touched, "nickname"), &Value::Bool(true));
}

#[test]
fn successful_submit_hands_current_values_to_the_handler() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let form = FormController::new(FormConfig::new(
        profile_values(),
        move |values: Value, form: FormController| {
            sink.lock().expect("sink lock").push(values);
            async move {
                assert!(form.snapshot().expect("snapshot").is_submitting);
                Ok::<(), ValidatorError>(())
            }
        },
    ));
    settle(form.set_field_value("email", "ada@example.com"));

    assert_eq!(
        block_on(form.submit_form()).expect("first submit"),
        SubmitOutcome::Submitted
    );
    assert_eq!(
        block_on(form.handle_submit()).expect("second submit"),
        SubmitOutcome::Submitted
    );

    let snapshot = form.snapshot().expect("snapshot");
    assert_eq!(snapshot.submit_count, 2);
    assert!(!snapshot.is_submitting);
    let received = received.lock().expect("received lock");
    assert_eq!(received.len(), 2);
    assert_eq!(at(&received[0], "email"), &Value::from("ada@example.com"));
}

#[test]
fn failing_submit_handler_surfaces_its_error() {
    let form = FormController::new(FormConfig::new(
        profile_values(),
        |_values: Value, _form: FormController| async {
            Err::<(), ValidatorError>("backend unavailable".into())
        },
    ));
    let error = block_on(form.submit_form()).expect_err("submit must fail");
    assert!(matches!(error, FormError::Submit(_)));
    assert_eq!(error.to_string(), "submit handler failed: backend unavailable");
    assert!(form.snapshot().expect("snapshot").is_submitting);
}

#[test]
fn older_form_run_finishing_last_does_not_overwrite_newer_errors() {
    let (older_tx, older_rx) = oneshot::channel();
    let (newer_tx, newer_rx) = oneshot::channel();
    let form = FormController::new(
        FormConfig::new(Value::map([("email", "a")]), noop_submit())
            .validate(gated_form_validator(vec![older_rx, newer_rx])),
    );

    let older = form.set_field_value("email", "ab").expect("older run");
    let newer = form.set_field_value("email", "abc").expect("newer run");
    assert!(form.snapshot().expect("snapshot").is_validating);

    newer_tx
        .send(Value::map([("email", "newer")]))
        .expect("newer gate");
    assert_eq!(
        block_on(newer).expect("newer result"),
        Some(Value::map([("email", "newer")]))
    );
    assert!(form.snapshot().expect("snapshot").is_validating);

    older_tx
        .send(Value::map([("email", "older")]))
        .expect("older gate");
    assert_eq!(
        block_on(older).expect("older result"),
        Some(Value::map([("email", "older")]))
    );

    let snapshot = form.snapshot().expect("snapshot");
    assert_eq!(snapshot.errors, Value::map([("email", "newer")]));
    assert!(!snapshot.is_validating);
}

#[test]
fn field_run_is_superseded_by_a_later_form_run() {
    let (field_tx, field_rx) = oneshot::channel();
    let (form_tx, form_rx) = oneshot::channel();
    let form = FormController::new(FormConfig::new(profile_values(), noop_submit()));
    form.register_field_validator("email", gated_field_validator(vec![field_rx, form_rx]))
        .expect("register email");

    let field_run = form.validate_field("email").expect("field run");
    let form_run = form.validate_form().expect("form run");

    form_tx
        .send(Some(Value::from("from form run")))
        .expect("form gate");
    block_on(form_run).expect("form result");
    field_tx
        .send(Some(Value::from("from field run")))
        .expect("field gate");
    assert_eq!(
        block_on(field_run).expect("field result"),
        Some(Value::from("from field run"))
    );

    let snapshot = form.snapshot().expect("snapshot");
    assert_eq!(snapshot.errors, Value::map([("email", "from form run")]));
    assert!(!snapshot.is_validating);
}

#[test]
fn form_run_finishing_after_a_newer_field_run_keeps_that_field() {
    let (form_tx, form_rx) = oneshot::channel();
    let (field_tx, field_rx) = oneshot::channel();
    let form = FormController::new(FormConfig::new(profile_values(), noop_submit()));
    form.register_field_validator("email", gated_field_validator(vec![form_rx, field_rx]))
        .expect("register email");
    form.register_field_validator(
        "name",
        sync_field_validator(|_value: &Value| Some(Value::from("taken"))),
    )
    .expect("register name");

    let form_run = form.validate_form().expect("form run");
    let field_run = form.validate_field("email").expect("field run");

    field_tx.send(None).expect("field gate");
    assert_eq!(block_on(field_run).expect("field result"), None);
    form_tx
        .send(Some(Value::from("stale")))
        .expect("form gate");
    assert_eq!(
        block_on(form_run).expect("form result"),
        Value::map([("email", "stale"), ("name", "taken")])
    );

    let snapshot = form.snapshot().expect("snapshot");
    assert!(at(&snapshot.errors, "email").is_absent());
    assert_eq!(at(&snapshot.errors, "name"), &Value::from("taken"));
    assert!(!snapshot.is_validating);
}

#[test]
fn older_field_run_finishing_last_is_discarded() {
    let (older_tx, older_rx) = oneshot::channel();
    let (newer_tx, newer_rx) = oneshot::channel();
    let form = FormController::new(FormConfig::new(profile_values(), noop_submit()));
    form.register_field_validator("email", gated_field_validator(vec![older_rx, newer_rx]))
        .expect("register email");

    let older = form.validate_field("email").expect("older run");
    let newer = form.validate_field("email").expect("newer run");

    newer_tx
        .send(Some(Value::from("newer")))
        .expect("newer gate");
    assert_eq!(
        block_on(newer).expect("newer result"),
        Some(Value::from("newer"))
    );
    let snapshot = form.snapshot().expect("snapshot");
    assert_eq!(snapshot.errors, Value::map([("email", "newer")]));
    assert!(snapshot.is_validating);

    older_tx
        .send(Some(Value::from("older")))
        .expect("older gate");
    assert_eq!(
        block_on(older).expect("older result"),
        Some(Value::from("older"))
    );
    let snapshot = form.snapshot().expect("snapshot");
    assert_eq!(snapshot.errors, Value::map([("email", "newer")]));
    assert!(!snapshot.is_validating);
}

#[test]
fn field_validation_only_replaces_its_own_path() {
    let form = FormController::new(
        FormConfig::new(profile_values(), noop_submit()).options(without_auto_validation()),
    );
    form.register_field_validator("email", sync_field_validator(required))
        .expect("register email");
    form.set_errors(Value::map([("name", "taken")])).expect("set errors");

    assert_eq!(
        settle(form.validate_field("email")),
        Some(Value::from("required"))
    );
    assert_eq!(
        form.snapshot().expect("snapshot").errors,
        Value::map([("email", "required"), ("name", "taken")])
    );

    settle(form.set_field_value("email", "ada@example.com"));
    assert_eq!(settle(form.validate_field("email")), None);
    assert_eq!(
        form.snapshot().expect("snapshot").errors,
        Value::map([("name", "taken")])
    );
}

#[test]
fn field_without_validator_or_schema_resolves_without_a_run() {
    let form = FormController::new(FormConfig::new(profile_values(), noop_submit()));
    let task = form.validate_field("name").expect("task");
    assert!(!form.snapshot().expect("snapshot").is_validating);
    assert_eq!(block_on(task).expect("result"), None);
}

#[test]
fn dropping_a_pending_run_clears_the_validating_flag() {
    let form = FormController::new(FormConfig::new(profile_values(), noop_submit()));
    let task = form.validate_form().expect("task");
    assert!(form.snapshot().expect("snapshot").is_validating);
    drop(task);
    let snapshot = form.snapshot().expect("snapshot");
    assert!(!snapshot.is_validating);
    assert_eq!(snapshot.errors, Value::empty_map());
}

#[test]
fn sources_merge_with_field_level_winning_over_function_over_schema() {
    let form = FormController::new(
        FormConfig::new(profile_values(), noop_submit())
            .schema(FieldSchema {
                errors: Value::map([
                    ("email", "schema: invalid"),
                    ("name", "schema: short"),
                    ("city", "schema: required"),
                ]),
            })
            .validate(sync_form_validator(|_values: &Value| {
                Value::map([("email", "function: taken"), ("name", "function: taken")])
            })),
    );
    form.register_field_validator(
        "name",
        sync_field_validator(|_value: &Value| Some(Value::from("field: reserved"))),
    )
    .expect("register name");

    let errors = settle(form.validate_form());
    assert_eq!(
        errors,
        Value::map([
            ("city", "schema: required"),
            ("email", "function: taken"),
            ("name", "field: reserved"),
        ])
    );
}

#[test]
fn rejected_form_validator_errors_merge_like_results() {
    let form = FormController::new(FormConfig::new(profile_values(), noop_submit()).validate(
        |_values: Value| async {
            Err::<ErrorTree, FormValidatorError>(FormValidatorError::Errors(Value::map([(
                "email", "rejected",
            )])))
        },
    ));
    assert_eq!(
        settle(form.validate_form()),
        Value::map([("email", "rejected")])
    );
}

#[test]
fn fatal_form_validator_failure_propagates_without_errors() {
    let form = FormController::new(FormConfig::new(profile_values(), noop_submit()).validate(
        |_values: Value| async {
            Err::<ErrorTree, FormValidatorError>(FormValidatorError::fatal("validator crashed"))
        },
    ));
    let error = block_on(form.validate_form().expect("task")).expect_err("fatal");
    assert!(matches!(error, FormError::FormValidator(_)));
    let snapshot = form.snapshot().expect("snapshot");
    assert_eq!(snapshot.errors, Value::empty_map());
    assert!(!snapshot.is_validating);
}

#[test]
fn broken_schema_aborts_submit_and_resets_flags() {
    let form =
        FormController::new(FormConfig::new(profile_values(), noop_submit()).schema(BrokenSchema));
    let error = block_on(form.submit_form()).expect_err("schema failure");
    assert!(matches!(error, FormError::Schema(_)));
    let snapshot = form.snapshot().expect("snapshot");
    assert!(!snapshot.is_submitting);
    assert!(!snapshot.is_validating);
    assert_eq!(snapshot.submit_count, 1);
}

#[test]
fn field_validation_projects_the_full_schema_result() {
    let form = FormController::new(FormConfig::new(profile_values(), noop_submit()).schema(
        FieldSchema {
            errors: Value::map([("email", "schema: invalid"), ("name", "schema: short")]),
        },
    ));
    assert_eq!(
        settle(form.validate_field("email")),
        Some(Value::from("schema: invalid"))
    );
    assert_eq!(
        form.snapshot().expect("snapshot").errors,
        Value::map([("email", "schema: invalid")])
    );
}

#[test]
fn scoped_schema_validation_merges_under_the_field_validator() {
    let full_runs = Arc::new(AtomicUsize::new(0));
    let form = FormController::new(
        FormConfig::new(
            Value::map([("address", Value::map([("city", ""), ("zip", "0")]))]),
            noop_submit(),
        )
        .schema(ScopedSchema {
            full_runs: full_runs.clone(),
        }),
    );
    form.register_field_validator(
        "address",
        sync_field_validator(|_value: &Value| Some(Value::map([("zip", "field: unknown")]))),
    )
    .expect("register address");

    assert_eq!(
        settle(form.validate_field("address")),
        Some(Value::map([
            ("city", "scoped: required"),
            ("zip", "field: unknown"),
        ]))
    );
    assert_eq!(full_runs.load(Ordering::SeqCst), 0);
    assert_eq!(
        at(&form.snapshot().expect("snapshot").errors, "address.city"),
        &Value::from("scoped: required")
    );
}

#[test]
fn reset_restores_initial_state_and_clears_submit_count() {
    let seen = Arc::new(Mutex::new(Value::Absent));
    let sink = seen.clone();
    let form = FormController::new(
        FormConfig::new(profile_values(), noop_submit())
            .initial_status("fresh")
            .on_reset(move |values: &Value, _form: &FormController| {
                *sink.lock().expect("sink lock") = values.clone();
            }),
    );
    settle(form.set_field_value("name", "Grace"));
    form.set_errors(Value::map([("name", "taken")])).expect("errors");
    form.set_status("edited").expect("status");
    block_on(form.submit_form()).expect("submit");
    let before = form.snapshot().expect("snapshot");
    assert_eq!(before.submit_count, 1);

    form.reset_form(None).expect("reset");
    let snapshot = form.snapshot().expect("snapshot");
    assert_eq!(snapshot.values, profile_values());
    assert_eq!(snapshot.errors, Value::empty_map());
    assert_eq!(snapshot.touched, Value::empty_map());
    assert_eq!(snapshot.status, Value::from("fresh"));
    assert_eq!(snapshot.submit_count, 0);
    assert!(!snapshot.dirty);
    assert_eq!(at(&seen.lock().expect("seen lock"), "name"), &Value::from("Grace"));
}

#[test]
fn reset_overrides_become_the_new_initial_captures() {
    let form = FormController::new(FormConfig::new(profile_values(), noop_submit()));
    let next = Value::map([("email", "grace@example.com"), ("name", "Grace")]);
    form.reset_form(Some(ResetState::default().values(next.clone()).submit_count(3)))
        .expect("reset");
    let snapshot = form.snapshot().expect("snapshot");
    assert_eq!(snapshot.values, next);
    assert_eq!(snapshot.initial_values, next);
    assert_eq!(snapshot.submit_count, 3);
    assert!(!snapshot.dirty);
}

#[test]
fn reset_discards_runs_still_in_flight() {
    let (gate_tx, gate_rx) = oneshot::channel();
    let form = FormController::new(
        FormConfig::new(profile_values(), noop_submit())
            .validate(gated_form_validator(vec![gate_rx])),
    );
    let pending = form.validate_form().expect("task");
    form.handle_reset().expect("reset");
    assert!(!form.snapshot().expect("snapshot").is_validating);

    gate_tx
        .send(Value::map([("email", "late")]))
        .expect("gate");
    block_on(pending).expect("late result");
    let snapshot = form.snapshot().expect("snapshot");
    assert_eq!(snapshot.errors, Value::empty_map());
    assert!(!snapshot.is_validating);
}

#[test]
fn initial_valid_applies_only_before_the_first_submit() {
    let form = FormController::new(
        FormConfig::new(profile_values(), noop_submit())
            .initial_errors(Value::map([("email", "required")]))
            .options(FormOptions {
                initial_valid: Some(true),
                ..FormOptions::default()
            }),
    );
    assert!(form.snapshot().expect("snapshot").is_valid);

    form.set_form_state(|state| FormState {
        submit_count: 1,
        ..state.clone()
    })
    .expect("set state");
    assert!(!form.snapshot().expect("snapshot").is_valid);

    form.set_errors(Value::map([("email", Value::Null)])).expect("clear");
    assert!(form.snapshot().expect("snapshot").is_valid);
}

#[test]
fn dirty_tracks_structural_difference_from_initial_values() {
    let form = FormController::new(
        FormConfig::new(profile_values(), noop_submit()).options(without_auto_validation()),
    );
    assert!(!form.snapshot().expect("snapshot").dirty);
    settle(form.set_field_value("name", "Grace"));
    assert!(form.snapshot().expect("snapshot").dirty);
    settle(form.set_field_value("name", "Ada"));
    assert!(!form.snapshot().expect("snapshot").dirty);
}

#[test]
fn validator_survives_until_its_last_mount_is_gone() {
    let form = FormController::new(FormConfig::new(profile_values(), noop_submit()));
    form.register_field_validator("email", sync_field_validator(required))
        .expect("first mount");
    assert_eq!(form.register_field("email").expect("second mount"), 2);

    assert_eq!(form.unregister_field("email").expect("first unmount"), 1);
    assert_eq!(
        settle(form.validate_form()),
        Value::map([("email", "required")])
    );

    assert_eq!(form.unregister_field("email").expect("second unmount"), 0);
    assert!(form.registered_fields().expect("fields").is_empty());
    assert_eq!(settle(form.validate_form()), Value::empty_map());
}

#[test]
fn subscribers_see_changes_in_order_and_skip_no_ops() {
    let form = FormController::new(
        FormConfig::new(profile_values(), noop_submit()).options(without_auto_validation()),
    );
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let id = form
        .subscribe(move |snapshot| {
            sink.lock()
                .expect("sink lock")
                .push(at(&snapshot.values, "name").clone());
        })
        .expect("subscribe");

    settle(form.set_field_value("name", "Grace"));
    settle(form.set_field_value("name", "Grace"));
    settle(form.set_field_value("name", "Linus"));
    assert!(form.unsubscribe(id).expect("unsubscribe"));
    settle(form.set_field_value("name", "Ken"));

    assert_eq!(
        *seen.lock().expect("seen lock"),
        vec![Value::from("Grace"), Value::from("Linus")]
    );
}

#[test]
fn subscribers_may_call_back_into_the_form() {
    let form = FormController::new(
        FormConfig::new(profile_values(), noop_submit()).options(without_auto_validation()),
    );
    let handle = form.clone();
    form.subscribe(move |snapshot| {
        if snapshot.status.is_absent() {
            handle.set_status("seen").expect("status from subscriber");
        }
    })
    .expect("subscribe");
    settle(form.set_field_value("name", "Grace"));
    assert_eq!(
        form.snapshot().expect("snapshot").status,
        Value::from("seen")
    );
}

#[test]
fn validation_policy_flags_and_overrides() {
    let form = FormController::new(
        FormConfig::new(profile_values(), noop_submit()).options(without_auto_validation()),
    );
    form.register_field_validator("email", sync_field_validator(required))
        .expect("register");

    assert_eq!(settle(form.set_field_touched("email", true)), None);
    assert_eq!(form.snapshot().expect("snapshot").errors, Value::empty_map());

    assert_eq!(
        settle(form.set_values_with(profile_values(), true)),
        Some(Value::map([("email", "required")]))
    );
    assert_eq!(
        form.snapshot().expect("snapshot").errors,
        Value::map([("email", "required")])
    );
}

#[test]
fn reinitialize_requires_the_option() {
    let form = FormController::new(FormConfig::new(profile_values(), noop_submit()));
    assert!(!form
        .reinitialize(FormInitial::new(Value::map([("name", "Grace")])))
        .expect("reinitialize"));
    assert_eq!(
        form.snapshot().expect("snapshot").initial_values,
        profile_values()
    );
}

#[test]
fn reinitialize_with_new_values_resets_the_form() {
    let form = FormController::new(FormConfig::new(profile_values(), noop_submit()).options(
        FormOptions {
            enable_reinitialize: true,
            ..without_auto_validation()
        },
    ));
    settle(form.set_field_value("name", "Grace"));
    block_on(form.submit_form()).expect("submit");

    let next = Value::map([("email", "linus@example.com"), ("name", "Linus")]);
    assert!(form
        .reinitialize(FormInitial::new(next.clone()))
        .expect("reinitialize"));
    let snapshot = form.snapshot().expect("snapshot");
    assert_eq!(snapshot.values, next);
    assert_eq!(snapshot.submit_count, 0);
    assert_eq!(snapshot.touched, Value::empty_map());
    assert!(!snapshot.dirty);

    assert!(!form
        .reinitialize(FormInitial::new(next))
        .expect("same values"));
}

#[test]
fn reinitialize_with_same_values_updates_only_changed_captures() {
    let form = FormController::new(FormConfig::new(profile_values(), noop_submit()).options(
        FormOptions {
            enable_reinitialize: true,
            ..without_auto_validation()
        },
    ));
    settle(form.set_field_value("name", "Grace"));
    assert!(form
        .reinitialize(FormInitial::new(profile_values()).status("synced"))
        .expect("reinitialize"));
    let snapshot = form.snapshot().expect("snapshot");
    assert_eq!(snapshot.status, Value::from("synced"));
    assert_eq!(snapshot.initial_status, Value::from("synced"));
    assert_eq!(at(&snapshot.values, "name"), &Value::from("Grace"));
}

#[test]
fn mount_validation_follows_the_option() {
    let form = FormController::new(FormConfig::new(profile_values(), noop_submit()));
    form.register_field_validator("email", sync_field_validator(required))
        .expect("register");
    assert_eq!(settle(form.on_mount()), None);

    let form = FormController::new(FormConfig::new(profile_values(), noop_submit()).options(
        FormOptions {
            validate_on_mount: true,
            ..FormOptions::default()
        },
    ));
    form.register_field_validator("email", sync_field_validator(required))
        .expect("register");
    assert_eq!(
        settle(form.on_mount()),
        Some(Value::map([("email", "required")]))
    );
}

#[test]
fn raw_change_events_derive_values_by_input_kind() {
    let form = FormController::new(
        FormConfig::new(
            Value::map([
                ("age", Value::from("")),
                ("colors", Value::list(["red"])),
                ("agree", Value::Bool(false)),
            ]),
            noop_submit(),
        )
        .options(without_auto_validation()),
    );

    settle(form.handle_raw_change(&UiEvent::new(InputKind::Number).name("age").value("42")));
    settle(form.handle_raw_change(
        &UiEvent::new(InputKind::Checkbox)
            .id("colors")
            .value("blue")
            .checked(true),
    ));
    settle(form.handle_raw_change(&UiEvent::new(InputKind::Checkbox).name("agree").checked(true)));
    settle(form.handle_raw_change(
        &UiEvent::new(InputKind::SelectMultiple)
            .name("sizes")
            .selected(["s", "m"]),
    ));

    let values = form.values().expect("values");
    assert_eq!(at(&values, "age"), &Value::from(42));
    assert_eq!(at(&values, "colors"), &Value::list(["red", "blue"]));
    assert_eq!(at(&values, "agree"), &Value::Bool(true));
    assert_eq!(at(&values, "sizes"), &Value::list(["s", "m"]));

    assert!(matches!(
        form.handle_raw_change(&UiEvent::new(InputKind::Text).value("x")),
        Err(FormError::MissingFieldName)
    ));
}

#[test]
fn blur_and_bound_handlers_target_their_field() {
    let form = FormController::new(
        FormConfig::new(profile_values(), noop_submit()).options(without_auto_validation()),
    );
    settle(form.handle_raw_blur(&UiEvent::new(InputKind::Text).name("email")));
    settle(form.bind_field_change("name").set("Grace"));
    settle(form.bind_field_blur("name").blur());
    settle(
        form.bind_field_change("name")
            .handle(&UiEvent::new(InputKind::Text).name("ignored").value("Linus")),
    );

    let snapshot = form.snapshot().expect("snapshot");
    assert_eq!(
        snapshot.touched,
        Value::map([("email", true), ("name", true)])
    );
    assert_eq!(at(&snapshot.values, "name"), &Value::from("Linus"));
    assert!(at(&snapshot.values, "ignored").is_absent());
}

#[test]
fn field_props_follow_input_kind() {
    let form = FormController::new(FormConfig::new(
        Value::map([
            ("color", Value::from("red")),
            ("toppings", Value::list(["ham"])),
            ("agree", Value::Bool(true)),
        ]),
        noop_submit(),
    ));

    let text = form.field_props("color").expect("text props");
    assert_eq!(text.value, Value::from("red"));
    assert_eq!(text.checked, None);
    assert_eq!(text.on_change.path(), &FieldPath::parse("color"));

    let radio = form
        .field_props(FieldPropsOptions::new("color", InputKind::Radio).value("blue"))
        .expect("radio props");
    assert_eq!(radio.checked, Some(false));
    assert_eq!(radio.value, Value::from("blue"));

    let topping = form
        .field_props(FieldPropsOptions::new("toppings", InputKind::Checkbox).value("ham"))
        .expect("checkbox props");
    assert_eq!(topping.checked, Some(true));

    let agree = form
        .field_props(FieldPropsOptions::new("agree", InputKind::Checkbox))
        .expect("flag props");
    assert_eq!(agree.checked, Some(true));

    let sizes = form
        .field_props(FieldPropsOptions::new("sizes", InputKind::SelectMultiple))
        .expect("multi props");
    assert!(sizes.multiple);
    assert_eq!(sizes.value, Value::empty_list());
}

#[test]
fn field_meta_helpers_and_display_errors() {
    let form = FormController::new(
        FormConfig::new(profile_values(), noop_submit())
            .initial_errors(Value::map([("email", "required")]))
            .options(without_auto_validation()),
    );
    assert_eq!(form.field_error_for_display("email").expect("display"), None);

    let helpers = form.field_helpers("email");
    settle(helpers.set_value("ada@"));
    settle(helpers.set_touched(true));
    helpers
        .set_error(Value::list(["invalid", "too short"]))
        .expect("set error");

    let meta = form.field_meta("email").expect("meta");
    assert_eq!(meta.value, Value::from("ada@"));
    assert!(meta.touched);
    assert_eq!(meta.initial_value, Value::from(""));
    assert_eq!(meta.initial_error, Value::from("required"));
    assert!(!meta.initial_touched);
    assert_eq!(
        form.field_error_for_display("email").expect("display"),
        Some("invalid".to_string())
    );
}

#[test]
fn snapshot_serializes_to_plain_json() {
    let form = FormController::new(FormConfig::new(profile_values(), noop_submit()));
    let json = serde_json::to_value(form.snapshot().expect("snapshot")).expect("json");
    assert_eq!(json["values"]["name"], "Ada");
    assert_eq!(json["submit_count"], 0);
    assert_eq!(json["dirty"], false);
    assert_eq!(json["status"], serde_json::Value::Null);
}

#[test]
fn derived_models_feed_and_read_back_typed_values() {
    let fields = SignupForm::fields();
    assert_eq!(fields.email(), "email");
    assert_eq!(fields.newsletter(), "newsletter");

    let received = Arc::new(Mutex::new(None));
    let sink = received.clone();
    let form = FormController::new(FormConfig::new(
        signup(),
        move |values: Value, _form: FormController| {
            *sink.lock().expect("sink lock") = Some(values.deserialize_into::<SignupForm>());
            async { Ok::<(), ValidatorError>(()) }
        },
    ));
    assert_eq!(at(&form.values().expect("values"), fields.age()), &Value::from(36));

    settle(form.set_field_value(fields.newsletter(), true));
    block_on(form.submit_form()).expect("submit");
    let submitted = received
        .lock()
        .expect("received lock")
        .take()
        .expect("handler called")
        .expect("typed values");
    assert_eq!(
        submitted,
        SignupForm {
            newsletter: true,
            ..signup()
        }
    );
}
