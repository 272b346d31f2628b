mod binding;
mod controller;
mod error;
mod model;
mod options;
mod registry;
mod submit;
mod validation;

#[cfg(test)]
mod tests;

pub use binding::{
    BlurHandler, ChangeHandler, FieldHelpers, FieldMeta, FieldProps, FieldPropsOptions, InputKind,
    UiEvent,
};
pub use calmform_derive::FormModel;
pub use controller::{FormController, FormSnapshot, FormState, SubscriptionId};
pub use error::{FormError, FormResult, FormValidatorError, SchemaError, ValidatorError};
pub use model::FormModel;
pub use options::{FormConfig, FormInitial, FormOptions};
pub use registry::FieldRegistry;
pub use submit::{ResetHandler, ResetState, SubmitHandler, SubmitOutcome};
pub use validation::{
    BoxedValidationFuture, FieldValidator, FormValidator, Schema, ValidationTask,
    ValidationTicket, sync_field_validator, sync_form_validator,
};
