use std::collections::BTreeMap;
use std::sync::Arc;

use super::path::{FieldPath, Segment};
use super::value::Value;

static ABSENT: Value = Value::Absent;

pub fn get_in<'a>(tree: &'a Value, path: &FieldPath) -> &'a Value {
    let mut node = tree;
    for segment in path.segments() {
        node = match (node, segment) {
            (Value::Map(entries), segment) => {
                entries.get(segment.key().as_ref()).unwrap_or(&ABSENT)
            }
            (Value::List(items), Segment::Index(index)) => items.get(*index).unwrap_or(&ABSENT),
            _ => return &ABSENT,
        };
    }
    node
}

/// Returns a copy of `tree` with `value` stored at `path`.
///
/// Only the containers on the way from the root to `path` are copied; every
/// other subtree is shared with `tree`. Storing a value equal to the current
/// one returns `tree` itself. Storing `Absent` deletes a map entry and leaves
/// an `Absent` slot in a list.
pub fn set_in(tree: &Value, path: &FieldPath, value: Value) -> Value {
    if get_in(tree, path) == &value {
        return tree.clone();
    }
    set_segments(tree, path.segments(), value)
}

pub fn delete_in(tree: &Value, path: &FieldPath) -> Value {
    set_in(tree, path, Value::Absent)
}

fn set_segments(node: &Value, segments: &[Segment], value: Value) -> Value {
    let Some((head, rest)) = segments.split_first() else {
        return value;
    };

    match (node, head) {
        (Value::List(items), Segment::Index(index)) => {
            let next = set_segments(items.get(*index).unwrap_or(&ABSENT), rest, value);
            let mut items = (**items).clone();
            if *index >= items.len() {
                if next.is_absent() {
                    return node.clone();
                }
                items.resize(*index + 1, Value::Absent);
            }
            items[*index] = next;
            Value::List(Arc::new(items))
        }
        (Value::Map(entries), segment) => {
            let key = segment.key();
            let next = set_segments(entries.get(key.as_ref()).unwrap_or(&ABSENT), rest, value);
            let mut entries = (**entries).clone();
            if next.is_absent() {
                entries.remove(key.as_ref());
            } else {
                entries.insert(key.into_owned(), next);
            }
            Value::Map(Arc::new(entries))
        }
        (Value::List(items), Segment::Key(_)) => {
            // A named key on a list turns the list into a map keyed by position.
            let entries = items
                .iter()
                .enumerate()
                .filter(|(_, item)| !item.is_absent())
                .map(|(position, item)| (position.to_string(), item.clone()))
                .collect::<BTreeMap<_, _>>();
            set_segments(&Value::Map(Arc::new(entries)), segments, value)
        }
        (_, segment) => {
            if value.is_absent() {
                return node.clone();
            }
            let container = match segment {
                Segment::Index(_) => Value::empty_list(),
                Segment::Key(_) => Value::empty_map(),
            };
            set_segments(&container, segments, value)
        }
    }
}

/// Deep merge where `overlay` wins at every path it defines.
///
/// Maps merge per key and lists merge per position. `Absent` in the overlay
/// never erases data from `base`.
pub fn merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (_, Value::Absent) => base.clone(),
        (Value::Absent, _) => overlay.clone(),
        (Value::Map(left), Value::Map(right)) => {
            let mut merged = (**left).clone();
            for (key, value) in right.iter() {
                let next = match left.get(key) {
                    Some(existing) => merge(existing, value),
                    None => value.clone(),
                };
                if !next.is_absent() {
                    merged.insert(key.clone(), next);
                }
            }
            Value::Map(Arc::new(merged))
        }
        (Value::List(left), Value::List(right)) => {
            let len = left.len().max(right.len());
            (0..len)
                .map(|position| {
                    merge(
                        left.get(position).unwrap_or(&ABSENT),
                        right.get(position).unwrap_or(&ABSENT),
                    )
                })
                .collect()
        }
        _ => overlay.clone(),
    }
}

/// Mirrors the shape of `tree`, replacing every leaf with `leaf`.
pub fn set_nested_values(tree: &Value, leaf: &Value) -> Value {
    match tree {
        Value::Absent => Value::Absent,
        Value::Map(entries) => Value::Map(Arc::new(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), set_nested_values(value, leaf)))
                .collect(),
        )),
        Value::List(items) => items
            .iter()
            .map(|item| set_nested_values(item, leaf))
            .collect(),
        _ => leaf.clone(),
    }
}
