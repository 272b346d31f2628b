use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tracing::warn;

use super::controller::{FormController, read_lock, write_lock};
use super::error::FormResult;
use super::validation::{BoxedValidationFuture, FieldValidator};
use crate::tree::{ErrorTree, FieldPath, Value, get_in, set_in};

#[derive(Clone)]
struct FieldEntry {
    validator: Option<Arc<dyn FieldValidator>>,
    mount_count: usize,
}

/// Fields currently rendered by the UI, with their optional validators.
///
/// Several components may render the same path (a radio group, say), so each
/// entry is reference counted and only removed when its last consumer
/// unmounts.
#[derive(Clone, Default)]
pub struct FieldRegistry {
    entries: BTreeMap<FieldPath, FieldEntry>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        path: FieldPath,
        validator: Option<Arc<dyn FieldValidator>>,
    ) -> usize {
        let entry = self.entries.entry(path).or_insert(FieldEntry {
            validator: None,
            mount_count: 0,
        });
        entry.mount_count += 1;
        if validator.is_some() {
            entry.validator = validator;
        }
        entry.mount_count
    }

    pub fn unregister(&mut self, path: &FieldPath) -> usize {
        let Some(entry) = self.entries.get_mut(path) else {
            return 0;
        };
        entry.mount_count = entry.mount_count.saturating_sub(1);
        let remaining = entry.mount_count;
        if remaining == 0 {
            self.entries.remove(path);
        }
        remaining
    }

    pub fn mount_count(&self, path: &FieldPath) -> usize {
        self.entries.get(path).map_or(0, |entry| entry.mount_count)
    }

    pub fn has_validator(&self, path: &FieldPath) -> bool {
        self.entries
            .get(path)
            .is_some_and(|entry| entry.validator.is_some())
    }

    pub fn validator(&self, path: &FieldPath) -> Option<Arc<dyn FieldValidator>> {
        self.entries
            .get(path)
            .and_then(|entry| entry.validator.clone())
    }

    pub fn registered_paths(&self) -> impl Iterator<Item = &FieldPath> {
        self.entries.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The validators are invoked before this returns. The returned future
    /// does not borrow the registry.
    pub fn run_field_level_validations(
        &self,
        values: &Value,
    ) -> BoxFuture<'static, ErrorTree> {
        let pending = self
            .entries
            .iter()
            .filter_map(|(path, entry)| {
                let validator = entry.validator.as_ref()?;
                let future = validator.validate(get_in(values, path).clone());
                Some(run_guarded(path.clone(), future))
            })
            .collect::<Vec<_>>();

        async move {
            join_all(pending)
                .await
                .into_iter()
                .fold(Value::empty_map(), |errors, (path, error)| match error {
                    Some(error) => set_in(&errors, &path, error),
                    None => errors,
                })
        }
        .boxed()
    }
}

impl FormController {
    pub fn register_field(&self, path: impl Into<FieldPath>) -> FormResult<usize> {
        Ok(write_lock(&self.registry, "registering field")?.register(path.into(), None))
    }

    pub fn register_field_validator(
        &self,
        path: impl Into<FieldPath>,
        validator: impl FieldValidator + 'static,
    ) -> FormResult<usize> {
        Ok(write_lock(&self.registry, "registering field validator")?
            .register(path.into(), Some(Arc::new(validator))))
    }

    pub fn unregister_field(&self, path: impl Into<FieldPath>) -> FormResult<usize> {
        Ok(write_lock(&self.registry, "unregistering field")?.unregister(&path.into()))
    }

    pub fn registered_fields(&self) -> FormResult<Vec<FieldPath>> {
        Ok(read_lock(&self.registry, "listing registered fields")?
            .registered_paths()
            .cloned()
            .collect())
    }

    pub fn field_mount_count(&self, path: impl Into<FieldPath>) -> FormResult<usize> {
        Ok(read_lock(&self.registry, "reading field mount count")?.mount_count(&path.into()))
    }
}

// TODO: surface swallowed validator failures through a diagnostics hook once
// consumers stop relying on the silent behavior.
pub(super) async fn run_guarded(
    path: FieldPath,
    future: BoxedValidationFuture<Option<ErrorTree>>,
) -> (FieldPath, Option<ErrorTree>) {
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(error)) => (path, error.filter(|error| !error.is_structurally_empty())),
        Ok(Err(failure)) => {
            warn!(field = %path, error = %failure, "field validator failed; treating as no error");
            (path, None)
        }
        Err(_) => {
            warn!(field = %path, "field validator panicked; treating as no error");
            (path, None)
        }
    }
}
