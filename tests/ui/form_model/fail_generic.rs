#[derive(calmform::form::FormModel)]
struct GenericForm<T> {
    value: T,
}

fn main() {
    let form = GenericForm { value: 1u8 };
    let _ = form.value;
}
