use std::future::Future;

use tracing::debug;

use super::controller::{FormController, FormState, deliver, write_lock};
use super::error::{FormError, FormResult, ValidatorError};
use super::options::FormInitial;
use super::validation::{BoxedValidationFuture, ValidationTask};
use crate::tree::{ErrorTree, TouchedTree, Value, merge, set_in, set_nested_values};

/// Receives the submitted values together with a handle to the form.
pub trait SubmitHandler: Send + Sync {
    fn submit(&self, values: Value, form: FormController) -> BoxedValidationFuture<()>;
}

impl<F, Fut> SubmitHandler for F
where
    F: Fn(Value, FormController) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ValidatorError>> + Send + 'static,
{
    fn submit(&self, values: Value, form: FormController) -> BoxedValidationFuture<()> {
        Box::pin((self)(values, form))
    }
}

/// Called with the values as they were just before a reset.
pub trait ResetHandler: Send + Sync {
    fn reset(&self, values: &Value, form: &FormController);
}

impl<F> ResetHandler for F
where
    F: Fn(&Value, &FormController) + Send + Sync,
{
    fn reset(&self, values: &Value, form: &FormController) {
        (self)(values, form)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SubmitOutcome {
    Submitted,
    /// Validation produced errors; the submit handler was not called.
    Blocked(ErrorTree),
}

/// Overrides applied by [`FormController::reset_form`]. Overridden trees also
/// become the new initial captures.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResetState {
    pub values: Option<Value>,
    pub errors: Option<ErrorTree>,
    pub touched: Option<TouchedTree>,
    pub status: Option<Value>,
    pub submit_count: Option<u32>,
    pub is_submitting: Option<bool>,
    pub is_validating: Option<bool>,
}

impl ResetState {
    pub fn values(mut self, values: impl Into<Value>) -> Self {
        self.values = Some(values.into());
        self
    }

    pub fn errors(mut self, errors: impl Into<ErrorTree>) -> Self {
        self.errors = Some(errors.into());
        self
    }

    pub fn touched(mut self, touched: impl Into<TouchedTree>) -> Self {
        self.touched = Some(touched.into());
        self
    }

    pub fn status(mut self, status: impl Into<Value>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn submit_count(mut self, submit_count: u32) -> Self {
        self.submit_count = Some(submit_count);
        self
    }

    pub fn is_submitting(mut self, is_submitting: bool) -> Self {
        self.is_submitting = Some(is_submitting);
        self
    }

    pub fn is_validating(mut self, is_validating: bool) -> Self {
        self.is_validating = Some(is_validating);
        self
    }
}

impl FormController {
    pub async fn submit_form(&self) -> FormResult<SubmitOutcome> {
        let registered = self.registered_fields()?;
        let values = self.update("starting submit", |state| {
            state.submit_count = state.submit_count.saturating_add(1);
            state.is_submitting = true;
            let touched = merge(
                &state.touched,
                &set_nested_values(&state.values, &Value::Bool(true)),
            );
            state.touched = registered
                .iter()
                .fold(touched, |touched, path| set_in(&touched, path, Value::Bool(true)));
        })?;

        let errors = match self.validate_form_with(values)?.await {
            Ok(errors) => errors,
            Err(error) => {
                self.set_submitting(false)?;
                debug!(%error, "submit aborted by validation failure");
                return Err(error);
            }
        };
        if !errors.is_structurally_empty() {
            self.set_submitting(false)?;
            debug!("submit blocked by validation errors");
            return Ok(SubmitOutcome::Blocked(errors));
        }

        let values = self.values()?;
        self.hooks
            .on_submit
            .submit(values, self.clone())
            .await
            .map_err(FormError::Submit)?;
        self.set_submitting(false)?;
        debug!("form submitted");
        Ok(SubmitOutcome::Submitted)
    }

    pub fn reset_form(&self, overrides: Option<ResetState>) -> FormResult<()> {
        if let Some(handler) = &self.hooks.on_reset {
            let values = self.values()?;
            handler.reset(&values, self);
        }

        let ResetState {
            values,
            errors,
            touched,
            status,
            submit_count,
            is_submitting,
            is_validating,
        } = overrides.unwrap_or_default();
        let captures_changed =
            values.is_some() || errors.is_some() || touched.is_some() || status.is_some();

        let notification = {
            let mut store = write_lock(&self.state, "resetting form")?;
            if let Some(values) = values {
                store.initial.values = values;
            }
            if let Some(errors) = errors {
                store.initial.errors = errors;
            }
            if let Some(touched) = touched {
                store.initial.touched = touched;
            }
            if let Some(status) = status {
                store.initial.status = status;
            }
            let mut next = FormState::from_initial(&store.initial);
            next.submit_count = submit_count.unwrap_or(0);
            next.is_submitting = is_submitting.unwrap_or(false);
            next.is_validating = is_validating.unwrap_or(false);
            store.tickets.supersede_all();
            debug!(submit_count = next.submit_count, "form reset");
            match store.transition(next, &self.options) {
                Some(notification) => Some(notification),
                None if captures_changed => store.publish(&self.options),
                None => None,
            }
        };
        deliver(notification);
        Ok(())
    }

    /// Adopts new initial captures. Returns `Ok(false)` without touching
    /// anything unless reinitialization is enabled and something changed.
    ///
    /// New initial values reset the whole form to the new captures. Otherwise
    /// only the changed errors, touched or status are replaced.
    pub fn reinitialize(&self, initial: FormInitial) -> FormResult<bool> {
        if !self.options.enable_reinitialize {
            return Ok(false);
        }

        let (changed, notification) = {
            let mut store = write_lock(&self.state, "reinitializing form")?;
            if store.initial.values != initial.values {
                store.initial = initial;
                store.tickets.supersede_all();
                let next = FormState::from_initial(&store.initial);
                debug!("form reinitialized with new initial values");
                let notification = match store.transition(next, &self.options) {
                    Some(notification) => Some(notification),
                    None => store.publish(&self.options),
                };
                (true, notification)
            } else {
                let FormInitial {
                    errors,
                    touched,
                    status,
                    ..
                } = initial;
                let mut next = store.state.clone();
                let mut changed = false;
                if store.initial.errors != errors {
                    next.errors = errors.clone();
                    store.initial.errors = errors;
                    changed = true;
                }
                if store.initial.touched != touched {
                    next.touched = touched.clone();
                    store.initial.touched = touched;
                    changed = true;
                }
                if store.initial.status != status {
                    next.status = status.clone();
                    store.initial.status = status;
                    changed = true;
                }
                if !changed {
                    return Ok(false);
                }
                debug!("form initial errors, touched or status replaced");
                let notification = match store.transition(next, &self.options) {
                    Some(notification) => Some(notification),
                    None => store.publish(&self.options),
                };
                (true, notification)
            }
        };
        deliver(notification);
        Ok(changed)
    }

    pub fn on_mount(&self) -> FormResult<ValidationTask<Option<ErrorTree>>> {
        if !self.options.validate_on_mount {
            return Ok(ValidationTask::ready(None));
        }
        let values = self.initial()?.values;
        Ok(self.validate_form_with(values)?.into_optional())
    }
}
