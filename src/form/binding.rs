use std::iter;
use std::str::FromStr;

use rust_decimal::Decimal;

use super::controller::{FormController, read_lock};
use super::error::{FormError, FormResult};
use super::submit::SubmitOutcome;
use super::validation::ValidationTask;
use crate::tree::{ErrorTree, FieldPath, Value, get_in};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum InputKind {
    #[default]
    Text,
    Number,
    Range,
    Checkbox,
    Radio,
    Select,
    SelectMultiple,
}

/// What a UI toolkit has to extract from a change or blur event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UiEvent {
    pub name: Option<String>,
    pub id: Option<String>,
    pub kind: InputKind,
    pub value: Value,
    pub checked: bool,
    pub selected: Vec<Value>,
}

impl UiEvent {
    pub fn new(kind: InputKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn selected<V: Into<Value>>(mut self, selected: impl IntoIterator<Item = V>) -> Self {
        self.selected = selected.into_iter().map(Into::into).collect();
        self
    }

    /// The field the event targets: its name, else its id.
    pub fn field(&self) -> FormResult<FieldPath> {
        [self.name.as_deref(), self.id.as_deref()]
            .into_iter()
            .flatten()
            .find(|field| !field.is_empty())
            .map(FieldPath::parse)
            .ok_or(FormError::MissingFieldName)
    }
}

/// Change handler bound to one field.
#[derive(Clone)]
pub struct ChangeHandler {
    form: FormController,
    path: FieldPath,
}

impl ChangeHandler {
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn set(&self, value: impl Into<Value>) -> FormResult<ValidationTask<Option<ErrorTree>>> {
        self.form.set_field_value(&self.path, value)
    }

    /// Derives the value from `event` as [`FormController::handle_raw_change`]
    /// does, ignoring the event's own name.
    pub fn handle(&self, event: &UiEvent) -> FormResult<ValidationTask<Option<ErrorTree>>> {
        let value = self.form.value_from_event(&self.path, event)?;
        self.form.set_field_value(&self.path, value)
    }
}

#[derive(Clone)]
pub struct BlurHandler {
    form: FormController,
    path: FieldPath,
}

impl BlurHandler {
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn blur(&self) -> FormResult<ValidationTask<Option<ErrorTree>>> {
        self.form.set_field_touched(&self.path, true)
    }
}

/// Describes the input a set of props will be spread onto.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldPropsOptions {
    pub name: FieldPath,
    pub kind: InputKind,
    /// The option value carried by a checkbox or radio input.
    pub value: Value,
}

impl FieldPropsOptions {
    pub fn new(name: impl Into<FieldPath>, kind: InputKind) -> Self {
        Self {
            name: name.into(),
            kind,
            value: Value::Absent,
        }
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }
}

impl From<&str> for FieldPropsOptions {
    fn from(name: &str) -> Self {
        Self::new(name, InputKind::Text)
    }
}

impl From<FieldPath> for FieldPropsOptions {
    fn from(name: FieldPath) -> Self {
        Self::new(name, InputKind::Text)
    }
}

pub struct FieldProps {
    pub name: FieldPath,
    pub value: Value,
    pub checked: Option<bool>,
    pub multiple: bool,
    pub on_change: ChangeHandler,
    pub on_blur: BlurHandler,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldMeta {
    pub value: Value,
    pub error: ErrorTree,
    pub touched: bool,
    pub initial_value: Value,
    pub initial_error: ErrorTree,
    pub initial_touched: bool,
}

/// Setters scoped to one field.
#[derive(Clone)]
pub struct FieldHelpers {
    form: FormController,
    path: FieldPath,
}

impl FieldHelpers {
    pub fn set_value(
        &self,
        value: impl Into<Value>,
    ) -> FormResult<ValidationTask<Option<ErrorTree>>> {
        self.form.set_field_value(&self.path, value)
    }

    pub fn set_touched(&self, touched: bool) -> FormResult<ValidationTask<Option<ErrorTree>>> {
        self.form.set_field_touched(&self.path, touched)
    }

    pub fn set_error(&self, error: impl Into<ErrorTree>) -> FormResult<()> {
        self.form.set_field_error(&self.path, error)
    }
}

impl FormController {
    pub fn handle_raw_change(
        &self,
        event: &UiEvent,
    ) -> FormResult<ValidationTask<Option<ErrorTree>>> {
        let path = event.field()?;
        let value = self.value_from_event(&path, event)?;
        self.set_field_value(path, value)
    }

    pub fn handle_raw_blur(
        &self,
        event: &UiEvent,
    ) -> FormResult<ValidationTask<Option<ErrorTree>>> {
        self.set_field_touched(event.field()?, true)
    }

    pub fn bind_field_change(&self, path: impl Into<FieldPath>) -> ChangeHandler {
        ChangeHandler {
            form: self.clone(),
            path: path.into(),
        }
    }

    pub fn bind_field_blur(&self, path: impl Into<FieldPath>) -> BlurHandler {
        BlurHandler {
            form: self.clone(),
            path: path.into(),
        }
    }

    pub async fn handle_submit(&self) -> FormResult<SubmitOutcome> {
        self.submit_form().await
    }

    pub fn handle_reset(&self) -> FormResult<()> {
        self.reset_form(None)
    }

    pub fn field_props(&self, options: impl Into<FieldPropsOptions>) -> FormResult<FieldProps> {
        let FieldPropsOptions { name, kind, value } = options.into();
        let current = get_in(
            &read_lock(&self.state, "reading field props")?.state.values,
            &name,
        )
        .clone();

        let (value, checked, multiple) = match kind {
            InputKind::Checkbox if value.is_absent() => (value, Some(current.truthy()), false),
            InputKind::Checkbox => {
                let checked = match current.as_list() {
                    Some(items) => items.contains(&value),
                    None => current == value,
                };
                (value, Some(checked), false)
            }
            InputKind::Radio => {
                let checked = current == value;
                (value, Some(checked), false)
            }
            InputKind::SelectMultiple if current.is_absent() => (Value::empty_list(), None, true),
            InputKind::SelectMultiple => (current, None, true),
            _ => (current, None, false),
        };

        Ok(FieldProps {
            on_change: self.bind_field_change(&name),
            on_blur: self.bind_field_blur(&name),
            name,
            value,
            checked,
            multiple,
        })
    }

    pub fn field_meta(&self, path: impl Into<FieldPath>) -> FormResult<FieldMeta> {
        let path = path.into();
        let store = read_lock(&self.state, "reading field meta")?;
        Ok(FieldMeta {
            value: get_in(&store.state.values, &path).clone(),
            error: get_in(&store.state.errors, &path).clone(),
            touched: get_in(&store.state.touched, &path).truthy(),
            initial_value: get_in(&store.initial.values, &path).clone(),
            initial_error: get_in(&store.initial.errors, &path).clone(),
            initial_touched: get_in(&store.initial.touched, &path).truthy(),
        })
    }

    pub fn field_helpers(&self, path: impl Into<FieldPath>) -> FieldHelpers {
        FieldHelpers {
            form: self.clone(),
            path: path.into(),
        }
    }

    /// The first error message for `path`, once the field was touched or a
    /// submit was attempted.
    pub fn field_error_for_display(
        &self,
        path: impl Into<FieldPath>,
    ) -> FormResult<Option<String>> {
        let path = path.into();
        let store = read_lock(&self.state, "reading display error message")?;
        if !get_in(&store.state.touched, &path).truthy() && store.state.submit_count == 0 {
            return Ok(None);
        }
        Ok(first_message(get_in(&store.state.errors, &path)))
    }

    fn value_from_event(&self, path: &FieldPath, event: &UiEvent) -> FormResult<Value> {
        Ok(match event.kind {
            InputKind::Number | InputKind::Range => parse_number(&event.value),
            InputKind::Checkbox => {
                let store = read_lock(&self.state, "reading checkbox value")?;
                checkbox_value(get_in(&store.state.values, path), &event.value, event.checked)
            }
            InputKind::SelectMultiple => Value::list(event.selected.iter().cloned()),
            InputKind::Text | InputKind::Radio | InputKind::Select => event.value.clone(),
        })
    }
}

fn first_message(error: &Value) -> Option<String> {
    match error {
        Value::Text(message) => Some(message.to_string()),
        Value::List(items) => items.iter().find_map(first_message),
        _ => None,
    }
}

/// Unparsable input becomes an empty string so the field can still be cleared.
fn parse_number(raw: &Value) -> Value {
    match raw {
        Value::Number(_) => raw.clone(),
        Value::Text(text) => {
            let text = text.trim();
            Decimal::from_str(text)
                .or_else(|_| Decimal::from_scientific(text))
                .map_or_else(|_| Value::text(""), Value::Number)
        }
        _ => Value::text(""),
    }
}

fn is_flag_option(option: &Value) -> bool {
    match option {
        Value::Absent | Value::Null | Value::Bool(_) => true,
        Value::Text(text) => matches!(text.as_ref(), "" | "true" | "false"),
        _ => false,
    }
}

fn checkbox_value(current: &Value, option: &Value, checked: bool) -> Value {
    match current {
        Value::Bool(_) => Value::Bool(checked),
        Value::List(items) => {
            let present = items.contains(option);
            match (checked, present) {
                (true, false) => items.iter().cloned().chain(iter::once(option.clone())).collect(),
                (false, true) => items.iter().filter(|item| *item != option).cloned().collect(),
                _ => current.clone(),
            }
        }
        _ if is_flag_option(option) => Value::Bool(checked),
        _ if checked => Value::list([option.clone()]),
        _ => Value::empty_list(),
    }
}
