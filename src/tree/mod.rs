mod ops;
mod path;
mod value;

pub use ops::{delete_in, get_in, merge, set_in, set_nested_values};
pub use path::{FieldPath, Segment};
pub use value::{ErrorTree, TouchedTree, Value};
