use crate::tree::Value;

/// A typed form model. Usually derived with `#[derive(FormModel)]`, which also
/// generates a `<Model>Fields` accessor with one field-name method per field.
pub trait FormModel: Clone + Send + Sync + 'static {
    type Fields;

    fn fields() -> Self::Fields;

    fn to_values(&self) -> Value;
}
