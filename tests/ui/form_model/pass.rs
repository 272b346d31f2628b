use calmform::form::FormModel;
use calmform::tree::{FieldPath, Value, get_in};

#[derive(Clone, calmform::form::FormModel)]
struct DemoForm {
    email: String,
    remember_me: bool,
}

fn main() {
    let fields = DemoForm::fields();
    assert_eq!(fields.email(), "email");
    assert_eq!(fields.remember_me(), "remember_me");

    let model = DemoForm {
        email: "a@calm.form".to_string(),
        remember_me: true,
    };
    let values = model.to_values();
    assert_eq!(
        get_in(&values, &FieldPath::parse(fields.email())),
        &Value::from("a@calm.form")
    );
    assert_eq!(Value::from(model), values);
}
