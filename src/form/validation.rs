use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, OptionFuture};
use futures::{FutureExt, join};
use tracing::{debug, warn};

use super::controller::{FormController, deliver, read_lock, write_lock};
use super::error::{FormError, FormResult, FormValidatorError, SchemaError, ValidatorError};
use super::registry::run_guarded;
use crate::tree::{ErrorTree, FieldPath, Value, get_in, merge, set_in};

pub type BoxedValidationFuture<T, E = ValidatorError> =
    Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'static>>;

/// Validates the value at one field path.
///
/// `Ok(None)` means "no error". An `Err` is a validator malfunction; it is
/// logged and treated as "no error" so a broken validator cannot take the
/// form down.
pub trait FieldValidator: Send + Sync {
    fn validate(&self, value: Value) -> BoxedValidationFuture<Option<ErrorTree>>;
}

impl<F, Fut> FieldValidator for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<ErrorTree>, ValidatorError>> + Send + 'static,
{
    fn validate(&self, value: Value) -> BoxedValidationFuture<Option<ErrorTree>> {
        Box::pin((self)(value))
    }
}

pub fn sync_field_validator<F>(validate: F) -> impl FieldValidator
where
    F: Fn(&Value) -> Option<ErrorTree> + Send + Sync + 'static,
{
    let validate = Arc::new(validate);
    move |value: Value| {
        let validate = validate.clone();
        async move { Ok::<_, ValidatorError>(validate(&value)) }
    }
}

pub trait FormValidator: Send + Sync {
    fn validate(&self, values: Value) -> BoxedValidationFuture<ErrorTree, FormValidatorError>;
}

impl<F, Fut> FormValidator for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ErrorTree, FormValidatorError>> + Send + 'static,
{
    fn validate(&self, values: Value) -> BoxedValidationFuture<ErrorTree, FormValidatorError> {
        Box::pin((self)(values))
    }
}

pub fn sync_form_validator<F>(validate: F) -> impl FormValidator
where
    F: Fn(&Value) -> ErrorTree + Send + Sync + 'static,
{
    let validate = Arc::new(validate);
    move |values: Value| {
        let validate = validate.clone();
        async move { Ok::<_, FormValidatorError>(validate(&values)) }
    }
}

/// A declarative schema engine.
pub trait Schema: Send + Sync {
    fn validate(&self, values: Value) -> BoxedValidationFuture<Option<ErrorTree>, SchemaError>;

    /// Validates a single path, resolving to the error at that path only.
    /// Engines without partial validation return `None`.
    fn validate_at(
        &self,
        _path: &FieldPath,
        _values: Value,
    ) -> Option<BoxedValidationFuture<Option<ErrorTree>, SchemaError>> {
        None
    }
}

fn scoped_schema_validation(
    schema: &dyn Schema,
    path: &FieldPath,
    values: Value,
) -> BoxedValidationFuture<Option<ErrorTree>, SchemaError> {
    if let Some(scoped) = schema.validate_at(path, values.clone()) {
        return scoped;
    }
    let path = path.clone();
    Box::pin(schema.validate(values).map(move |result| {
        result.map(|errors| {
            errors
                .map(|errors| get_in(&errors, &path).clone())
                .filter(|error| !error.is_absent())
        })
    }))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ValidationTicket(pub u64);

#[derive(Clone, Debug, Eq, PartialEq)]
pub(super) enum RunScope {
    Form,
    Field(FieldPath),
}

impl Display for RunScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RunScope::Form => f.write_str("form"),
            RunScope::Field(path) => write!(f, "field {path}"),
        }
    }
}

/// A form run is current while no newer form run exists, but it never
/// overrides a field that was validated after it started. A field run is
/// current while no newer run exists for its field and no form run started
/// after it.
#[derive(Debug, Default)]
pub(super) struct TicketBook {
    issued: u64,
    latest_form: Option<ValidationTicket>,
    latest_field: BTreeMap<FieldPath, ValidationTicket>,
    outstanding: BTreeSet<ValidationTicket>,
}

impl TicketBook {
    fn issue(&mut self) -> ValidationTicket {
        self.issued += 1;
        let ticket = ValidationTicket(self.issued);
        self.outstanding.insert(ticket);
        ticket
    }

    fn start(&mut self, scope: &RunScope) -> ValidationTicket {
        let ticket = self.issue();
        match scope {
            RunScope::Form => self.latest_form = Some(ticket),
            RunScope::Field(path) => {
                self.latest_field.insert(path.clone(), ticket);
            }
        }
        ticket
    }

    fn is_current(&self, scope: &RunScope, ticket: ValidationTicket) -> bool {
        match scope {
            RunScope::Form => self.latest_form == Some(ticket),
            RunScope::Field(path) => {
                self.latest_field.get(path) == Some(&ticket)
                    && self.latest_form.is_none_or(|form| form < ticket)
            }
        }
    }

    fn fields_started_after(
        &self,
        ticket: ValidationTicket,
    ) -> impl Iterator<Item = &FieldPath> {
        self.latest_field
            .iter()
            .filter(move |(_, field)| **field > ticket)
            .map(|(path, _)| path)
    }

    fn settle(&mut self, ticket: ValidationTicket) -> bool {
        self.outstanding.remove(&ticket)
    }

    pub(super) fn is_busy(&self) -> bool {
        !self.outstanding.is_empty()
    }

    pub(super) fn supersede_all(&mut self) {
        self.latest_form = None;
        self.latest_field.clear();
        self.outstanding.clear();
    }
}

/// A validation run, already sequenced, waiting to be awaited or spawned.
///
/// Dropping the task before it completes settles its run without applying any
/// result. The validators it started keep running; only their effect is lost.
#[must_use = "validation only makes progress when the task is awaited or spawned"]
pub struct ValidationTask<T> {
    future: BoxFuture<'static, FormResult<T>>,
}

impl<T> ValidationTask<T>
where
    T: Send + 'static,
{
    pub(super) fn new(future: impl Future<Output = FormResult<T>> + Send + 'static) -> Self {
        Self {
            future: future.boxed(),
        }
    }

    pub(super) fn ready(value: T) -> Self {
        Self::new(futures::future::ready(Ok(value)))
    }
}

impl ValidationTask<ErrorTree> {
    pub(super) fn into_optional(self) -> ValidationTask<Option<ErrorTree>> {
        ValidationTask::new(self.future.map(|result| result.map(Some)))
    }
}

impl<T> Future for ValidationTask<T> {
    type Output = FormResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

pub(super) struct RunGuard {
    controller: FormController,
    scope: RunScope,
    ticket: ValidationTicket,
    settled: bool,
}

impl RunGuard {
    pub(super) fn finish(mut self, errors: Option<ErrorTree>) -> FormResult<bool> {
        self.settled = true;
        self.controller.settle_run(&self.scope, self.ticket, errors)
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Err(error) = self.controller.settle_run(&self.scope, self.ticket, None) {
            warn!(ticket = self.ticket.0, %error, "could not settle dropped validation run");
        }
    }
}

impl FormController {
    pub fn validate_form(&self) -> FormResult<ValidationTask<ErrorTree>> {
        let values = read_lock(&self.state, "reading values for form validation")?
            .state
            .values
            .clone();
        self.validate_form_with(values)
    }

    pub fn validate_form_with(&self, values: Value) -> FormResult<ValidationTask<ErrorTree>> {
        let guard = self.begin_run(RunScope::Form)?;
        let pending = self.start_all_validations(&values)?;
        Ok(ValidationTask::new(async move {
            match pending.await {
                Ok(errors) => {
                    guard.finish(Some(errors.clone()))?;
                    Ok(errors)
                }
                Err(error) => {
                    guard.finish(None)?;
                    Err(error)
                }
            }
        }))
    }

    /// Runs the schema and the registered validator for one field. Resolves
    /// immediately to `None` when the field has neither.
    pub fn validate_field(
        &self,
        path: impl Into<FieldPath>,
    ) -> FormResult<ValidationTask<Option<ErrorTree>>> {
        let path = path.into();
        let validator = read_lock(&self.registry, "reading field validator")?.validator(&path);
        let schema = self.hooks.schema.clone();
        if validator.is_none() && schema.is_none() {
            return Ok(ValidationTask::ready(None));
        }

        let values = read_lock(&self.state, "reading values for field validation")?
            .state
            .values
            .clone();
        let guard = self.begin_run(RunScope::Field(path.clone()))?;
        let field_level = OptionFuture::from(validator.map(|validator| {
            run_guarded(path.clone(), validator.validate(get_in(&values, &path).clone()))
        }));
        let schema_level = OptionFuture::from(
            schema.map(|schema| scoped_schema_validation(schema.as_ref(), &path, values.clone())),
        );

        Ok(ValidationTask::new(async move {
            let (schema_result, field_result) = join!(schema_level, field_level);
            let schema_error = match schema_result {
                Some(Err(error)) => {
                    guard.finish(None)?;
                    return Err(FormError::Schema(error));
                }
                Some(Ok(error)) => error.unwrap_or_default(),
                None => Value::Absent,
            };
            let field_error = field_result
                .and_then(|(_, error)| error)
                .unwrap_or_default();
            let merged = merge(&schema_error, &field_error);
            let error = (!merged.is_structurally_empty()).then_some(merged);
            guard.finish(Some(error.clone().unwrap_or_default()))?;
            Ok(error)
        }))
    }

    // Field-level errors override the form validator, which overrides the schema.
    fn start_all_validations(
        &self,
        values: &Value,
    ) -> FormResult<BoxFuture<'static, FormResult<ErrorTree>>> {
        let field_level = read_lock(&self.registry, "reading field validators")?
            .run_field_level_validations(values);
        let form_level = OptionFuture::from(
            self.hooks
                .validate
                .as_ref()
                .map(|validator| validator.validate(values.clone())),
        );
        let schema_level = OptionFuture::from(
            self.hooks
                .schema
                .as_ref()
                .map(|schema| schema.validate(values.clone())),
        );

        Ok(async move {
            let (form_result, schema_result, field_errors) =
                join!(form_level, schema_level, field_level);
            let schema_errors = match schema_result {
                Some(Err(error)) => return Err(FormError::Schema(error)),
                Some(Ok(errors)) => errors.unwrap_or_default(),
                None => Value::Absent,
            };
            let form_errors = match form_result {
                Some(Err(FormValidatorError::Fatal(error))) => {
                    return Err(FormError::FormValidator(error));
                }
                Some(Ok(errors) | Err(FormValidatorError::Errors(errors))) => errors,
                None => Value::Absent,
            };
            let merged = merge(&merge(&schema_errors, &form_errors), &field_errors);
            Ok(if merged.is_structurally_empty() {
                Value::empty_map()
            } else {
                merged
            })
        }
        .boxed())
    }

    fn begin_run(&self, scope: RunScope) -> FormResult<RunGuard> {
        let (ticket, notification) = {
            let mut store = write_lock(&self.state, "starting validation run")?;
            let ticket = store.tickets.start(&scope);
            debug!(ticket = ticket.0, %scope, "validation run started");
            let mut next = store.state.clone();
            next.is_validating = true;
            (ticket, store.transition(next, &self.options))
        };
        deliver(notification);
        Ok(RunGuard {
            controller: self.clone(),
            scope,
            ticket,
            settled: false,
        })
    }

    /// `None` closes the run without touching the error tree.
    fn settle_run(
        &self,
        scope: &RunScope,
        ticket: ValidationTicket,
        errors: Option<ErrorTree>,
    ) -> FormResult<bool> {
        let (applied, notification) = {
            let mut store = write_lock(&self.state, "settling validation run")?;
            let current = store.tickets.is_current(scope, ticket);
            let was_outstanding = store.tickets.settle(ticket);
            let mut next = store.state.clone();
            let applied = match errors {
                Some(errors) if current => {
                    next.errors = match scope {
                        RunScope::Form => store
                            .tickets
                            .fields_started_after(ticket)
                            .fold(errors, |errors, path| {
                                set_in(&errors, path, get_in(&next.errors, path).clone())
                            }),
                        RunScope::Field(path) => set_in(&next.errors, path, errors),
                    };
                    debug!(ticket = ticket.0, %scope, "validation result applied");
                    true
                }
                Some(_) => {
                    debug!(ticket = ticket.0, %scope, "stale validation result discarded");
                    false
                }
                None => false,
            };
            if was_outstanding && !store.tickets.is_busy() {
                next.is_validating = false;
            }
            (applied, store.transition(next, &self.options))
        };
        deliver(notification);
        Ok(applied)
    }
}
