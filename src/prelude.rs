pub use crate::form::{
    FieldProps, FieldPropsOptions, FormConfig, FormController, FormError, FormInitial, FormModel,
    FormOptions, FormResult, FormSnapshot, FormValidatorError, InputKind, ResetState, Schema,
    SchemaError, SubmitOutcome, UiEvent, ValidatorError, sync_field_validator, sync_form_validator,
};
pub use crate::tree::{ErrorTree, FieldPath, TouchedTree, Value};
