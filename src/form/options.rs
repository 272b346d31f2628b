use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::submit::{ResetHandler, SubmitHandler};
use super::validation::{FormValidator, Schema};
use crate::tree::{ErrorTree, TouchedTree, Value};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormOptions {
    pub validate_on_change: bool,
    pub validate_on_blur: bool,
    pub validate_on_mount: bool,
    pub enable_reinitialize: bool,
    /// Validity reported before the first submit when the error tree is not empty.
    pub initial_valid: Option<bool>,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            validate_on_change: true,
            validate_on_blur: true,
            validate_on_mount: false,
            enable_reinitialize: false,
            initial_valid: None,
        }
    }
}

/// The `initial_*` captures a form is built from and resets back to.
#[derive(Clone, Debug, PartialEq)]
pub struct FormInitial {
    pub values: Value,
    pub errors: ErrorTree,
    pub touched: TouchedTree,
    pub status: Value,
}

impl FormInitial {
    pub fn new(values: impl Into<Value>) -> Self {
        Self {
            values: values.into(),
            ..Self::default()
        }
    }

    pub fn errors(mut self, errors: impl Into<ErrorTree>) -> Self {
        self.errors = errors.into();
        self
    }

    pub fn touched(mut self, touched: impl Into<TouchedTree>) -> Self {
        self.touched = touched.into();
        self
    }

    pub fn status(mut self, status: impl Into<Value>) -> Self {
        self.status = status.into();
        self
    }
}

impl Default for FormInitial {
    fn default() -> Self {
        Self {
            values: Value::empty_map(),
            errors: Value::empty_map(),
            touched: Value::empty_map(),
            status: Value::Absent,
        }
    }
}

pub(super) struct FormHooks {
    pub(super) on_submit: Arc<dyn SubmitHandler>,
    pub(super) on_reset: Option<Arc<dyn ResetHandler>>,
    pub(super) validate: Option<Arc<dyn FormValidator>>,
    pub(super) schema: Option<Arc<dyn Schema>>,
}

pub struct FormConfig {
    pub(super) initial: FormInitial,
    pub(super) options: FormOptions,
    pub(super) hooks: FormHooks,
}

impl FormConfig {
    pub fn new<V, S>(initial_values: V, on_submit: S) -> Self
    where
        V: Into<Value>,
        S: SubmitHandler + 'static,
    {
        Self {
            initial: FormInitial::new(initial_values),
            options: FormOptions::default(),
            hooks: FormHooks {
                on_submit: Arc::new(on_submit),
                on_reset: None,
                validate: None,
                schema: None,
            },
        }
    }

    pub fn initial_errors(mut self, errors: impl Into<ErrorTree>) -> Self {
        self.initial.errors = errors.into();
        self
    }

    pub fn initial_touched(mut self, touched: impl Into<TouchedTree>) -> Self {
        self.initial.touched = touched.into();
        self
    }

    pub fn initial_status(mut self, status: impl Into<Value>) -> Self {
        self.initial.status = status.into();
        self
    }

    pub fn options(mut self, options: FormOptions) -> Self {
        self.options = options;
        self
    }

    pub fn on_reset(mut self, handler: impl ResetHandler + 'static) -> Self {
        self.hooks.on_reset = Some(Arc::new(handler));
        self
    }

    pub fn validate(mut self, validator: impl FormValidator + 'static) -> Self {
        self.hooks.validate = Some(Arc::new(validator));
        self
    }

    pub fn schema(mut self, schema: impl Schema + 'static) -> Self {
        self.hooks.schema = Some(Arc::new(schema));
        self
    }
}
