use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::trace;

use super::error::{FormError, FormResult};
use super::options::{FormConfig, FormHooks, FormInitial, FormOptions};
use super::registry::FieldRegistry;
use super::validation::{TicketBook, ValidationTask};
use crate::tree::{ErrorTree, FieldPath, TouchedTree, Value, set_in};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FormState {
    pub values: Value,
    pub errors: ErrorTree,
    pub touched: TouchedTree,
    pub status: Value,
    pub is_submitting: bool,
    pub is_validating: bool,
    pub submit_count: u32,
}

impl FormState {
    pub(super) fn from_initial(initial: &FormInitial) -> Self {
        Self {
            values: initial.values.clone(),
            errors: initial.errors.clone(),
            touched: initial.touched.clone(),
            status: initial.status.clone(),
            is_submitting: false,
            is_validating: false,
            submit_count: 0,
        }
    }
}

/// What subscribers and render code see.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FormSnapshot {
    pub values: Value,
    pub errors: ErrorTree,
    pub touched: TouchedTree,
    pub status: Value,
    pub is_submitting: bool,
    pub is_validating: bool,
    pub submit_count: u32,
    pub dirty: bool,
    pub is_valid: bool,
    pub initial_values: Value,
    pub initial_errors: ErrorTree,
    pub initial_touched: TouchedTree,
    pub initial_status: Value,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SubscriptionId(pub u64);

type Subscriber = Arc<dyn Fn(&FormSnapshot) + Send + Sync>;

pub(super) struct FormStore {
    pub(super) initial: FormInitial,
    pub(super) state: FormState,
    pub(super) tickets: TicketBook,
    subscribers: BTreeMap<SubscriptionId, Subscriber>,
    next_subscription: u64,
}

impl FormStore {
    fn new(initial: FormInitial) -> Self {
        Self {
            state: FormState::from_initial(&initial),
            initial,
            tickets: TicketBook::default(),
            subscribers: BTreeMap::new(),
            next_subscription: 0,
        }
    }

    fn snapshot(&self, options: &FormOptions) -> FormSnapshot {
        let state = &self.state;
        let is_valid = state.errors.is_structurally_empty()
            || (state.submit_count == 0 && options.initial_valid == Some(true));
        FormSnapshot {
            values: state.values.clone(),
            errors: state.errors.clone(),
            touched: state.touched.clone(),
            status: state.status.clone(),
            is_submitting: state.is_submitting,
            is_validating: state.is_validating,
            submit_count: state.submit_count,
            dirty: state.values != self.initial.values,
            is_valid,
            initial_values: self.initial.values.clone(),
            initial_errors: self.initial.errors.clone(),
            initial_touched: self.initial.touched.clone(),
            initial_status: self.initial.status.clone(),
        }
    }

    /// Stores `next` and prepares a notification, unless nothing changed.
    pub(super) fn transition(
        &mut self,
        next: FormState,
        options: &FormOptions,
    ) -> Option<Notification> {
        if next == self.state {
            return None;
        }
        self.state = next;
        self.publish(options)
    }

    pub(super) fn publish(&self, options: &FormOptions) -> Option<Notification> {
        if self.subscribers.is_empty() {
            return None;
        }
        Some(Notification {
            snapshot: self.snapshot(options),
            subscribers: self.subscribers.values().cloned().collect(),
        })
    }
}

pub(super) struct Notification {
    snapshot: FormSnapshot,
    subscribers: Vec<Subscriber>,
}

/// Calls subscribers. Must run after the state lock is released.
pub(super) fn deliver(notification: Option<Notification>) {
    let Some(notification) = notification else {
        return;
    };
    trace!(
        subscribers = notification.subscribers.len(),
        submit_count = notification.snapshot.submit_count,
        "delivering form snapshot"
    );
    for subscriber in &notification.subscribers {
        subscriber(&notification.snapshot);
    }
}

/// A handle to one form.
///
/// Clones share the same state, registry and hooks.
#[derive(Clone)]
pub struct FormController {
    pub(super) options: FormOptions,
    pub(super) state: Arc<RwLock<FormStore>>,
    pub(super) registry: Arc<RwLock<FieldRegistry>>,
    pub(super) hooks: Arc<FormHooks>,
}

impl FormController {
    pub fn new(config: FormConfig) -> Self {
        let FormConfig {
            initial,
            options,
            hooks,
        } = config;
        Self {
            options,
            state: Arc::new(RwLock::new(FormStore::new(initial))),
            registry: Arc::new(RwLock::new(FieldRegistry::new())),
            hooks: Arc::new(hooks),
        }
    }

    pub fn options(&self) -> FormOptions {
        self.options
    }

    pub fn snapshot(&self) -> FormResult<FormSnapshot> {
        Ok(read_lock(&self.state, "creating form snapshot")?.snapshot(&self.options))
    }

    pub fn values(&self) -> FormResult<Value> {
        Ok(read_lock(&self.state, "reading values")?.state.values.clone())
    }

    pub fn initial(&self) -> FormResult<FormInitial> {
        Ok(read_lock(&self.state, "reading initial captures")?.initial.clone())
    }

    /// Registers a callback invoked with a fresh snapshot after every state
    /// change, in mutation order.
    pub fn subscribe(
        &self,
        callback: impl Fn(&FormSnapshot) + Send + Sync + 'static,
    ) -> FormResult<SubscriptionId> {
        let mut store = write_lock(&self.state, "subscribing to form")?;
        store.next_subscription += 1;
        let id = SubscriptionId(store.next_subscription);
        store.subscribers.insert(id, Arc::new(callback));
        Ok(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> FormResult<bool> {
        Ok(write_lock(&self.state, "unsubscribing from form")?
            .subscribers
            .remove(&id)
            .is_some())
    }

    pub fn set_values(
        &self,
        values: impl Into<Value>,
    ) -> FormResult<ValidationTask<Option<ErrorTree>>> {
        self.set_values_with(values, self.options.validate_on_change)
    }

    pub fn set_values_with(
        &self,
        values: impl Into<Value>,
        validate: bool,
    ) -> FormResult<ValidationTask<Option<ErrorTree>>> {
        let values = values.into();
        let values = self.update("setting values", |state| state.values = values)?;
        self.validate_if(validate, values)
    }

    pub fn set_field_value(
        &self,
        path: impl Into<FieldPath>,
        value: impl Into<Value>,
    ) -> FormResult<ValidationTask<Option<ErrorTree>>> {
        self.set_field_value_with(path, value, self.options.validate_on_change)
    }

    pub fn set_field_value_with(
        &self,
        path: impl Into<FieldPath>,
        value: impl Into<Value>,
        validate: bool,
    ) -> FormResult<ValidationTask<Option<ErrorTree>>> {
        let path = path.into();
        let value = value.into();
        let values = self.update("setting field value", |state| {
            state.values = set_in(&state.values, &path, value);
        })?;
        self.validate_if(validate, values)
    }

    pub fn set_errors(&self, errors: impl Into<ErrorTree>) -> FormResult<()> {
        let errors = errors.into();
        self.update("setting errors", |state| state.errors = errors)?;
        Ok(())
    }

    pub fn set_field_error(
        &self,
        path: impl Into<FieldPath>,
        error: impl Into<ErrorTree>,
    ) -> FormResult<()> {
        let path = path.into();
        let error = error.into();
        self.update("setting field error", |state| {
            state.errors = set_in(&state.errors, &path, error);
        })?;
        Ok(())
    }

    pub fn set_touched(
        &self,
        touched: impl Into<TouchedTree>,
    ) -> FormResult<ValidationTask<Option<ErrorTree>>> {
        self.set_touched_with(touched, self.options.validate_on_blur)
    }

    pub fn set_touched_with(
        &self,
        touched: impl Into<TouchedTree>,
        validate: bool,
    ) -> FormResult<ValidationTask<Option<ErrorTree>>> {
        let touched = touched.into();
        let values = self.update("setting touched", |state| state.touched = touched)?;
        self.validate_if(validate, values)
    }

    pub fn set_field_touched(
        &self,
        path: impl Into<FieldPath>,
        touched: bool,
    ) -> FormResult<ValidationTask<Option<ErrorTree>>> {
        self.set_field_touched_with(path, touched, self.options.validate_on_blur)
    }

    pub fn set_field_touched_with(
        &self,
        path: impl Into<FieldPath>,
        touched: bool,
        validate: bool,
    ) -> FormResult<ValidationTask<Option<ErrorTree>>> {
        let path = path.into();
        let values = self.update("setting field touched", |state| {
            state.touched = set_in(&state.touched, &path, Value::Bool(touched));
        })?;
        self.validate_if(validate, values)
    }

    pub fn set_status(&self, status: impl Into<Value>) -> FormResult<()> {
        let status = status.into();
        self.update("setting status", |state| state.status = status)?;
        Ok(())
    }

    pub fn set_submitting(&self, is_submitting: bool) -> FormResult<()> {
        self.update("setting submitting flag", |state| {
            state.is_submitting = is_submitting;
        })?;
        Ok(())
    }

    /// Replaces the whole state with whatever `updater` returns.
    ///
    /// This bypasses every policy: no validation runs and the counters are
    /// taken as given.
    pub fn set_form_state(&self, updater: impl FnOnce(&FormState) -> FormState) -> FormResult<()> {
        let notification = {
            let mut store = write_lock(&self.state, "replacing form state")?;
            let next = updater(&store.state);
            store.transition(next, &self.options)
        };
        deliver(notification);
        Ok(())
    }

    /// Returns the values of the new state.
    pub(super) fn update(
        &self,
        context: &'static str,
        apply: impl FnOnce(&mut FormState),
    ) -> FormResult<Value> {
        let (values, notification) = {
            let mut store = write_lock(&self.state, context)?;
            let mut next = store.state.clone();
            apply(&mut next);
            let values = next.values.clone();
            (values, store.transition(next, &self.options))
        };
        deliver(notification);
        Ok(values)
    }

    fn validate_if(
        &self,
        validate: bool,
        values: Value,
    ) -> FormResult<ValidationTask<Option<ErrorTree>>> {
        if !validate {
            return Ok(ValidationTask::ready(None));
        }
        Ok(self.validate_form_with(values)?.into_optional())
    }
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
