//! [`Finder`]: a composable optic into a [`Dynamic`] document. Where
//! [`crate::rules::RewriteRule`] walks a value guided by its [`crate::types::Type`],
//! a `Finder` walks it by path, a named field, a list index, or a
//! declared type boundary, independent of the structural type algebra.
//! Fixes that know exactly where a value lives use a `Finder`; fixes that
//! want to recurse through an entire type's shape use a `RewriteRule`.

use std::sync::Arc;

use crate::dynamic::Dynamic;
use crate::error::{OpsError, OpsResult};
use crate::reference::TypeReference;

type GetFn<T> = dyn Fn(&Dynamic<T>) -> Dynamic<T>;
type SetFn<T> = dyn Fn(&Dynamic<T>, Dynamic<T>) -> Dynamic<T>;

/// A read/write path into a [`Dynamic`] value. [`Finder::id`] renders the
/// path for diagnostics (fixer failure context, logging).
pub struct Finder<T> {
    id: String,
    get: Arc<GetFn<T>>,
    set: Arc<SetFn<T>>,
}

impl<T> Clone for Finder<T> {
    fn clone(&self) -> Self {
        Finder {
            id: self.id.clone(),
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
        }
    }
}

impl<T: Clone + 'static> Finder<T> {
    /// Reads and writes the whole document; the identity of `then`.
    #[must_use]
    pub fn identity() -> Self {
        Finder {
            id: ".".to_string(),
            get: Arc::new(|dynamic: &Dynamic<T>| dynamic.clone()),
            set: Arc::new(|_root: &Dynamic<T>, value: Dynamic<T>| value),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Navigates into a named map entry.
    #[must_use]
    pub fn field(name: impl Into<String>) -> Self {
        let name = name.into();
        let get_name = name.clone();
        let set_name = name.clone();
        Finder {
            id: format!(".{name}"),
            get: Arc::new(move |dynamic: &Dynamic<T>| dynamic.get(&get_name)),
            set: Arc::new(move |root: &Dynamic<T>, value: Dynamic<T>| root.set(&set_name, &value)),
        }
    }

    /// Navigates into a list element by position.
    #[must_use]
    pub fn index(index: usize) -> Self {
        Finder {
            id: format!("[{index}]"),
            get: Arc::new(move |dynamic: &Dynamic<T>| match dynamic.as_list() {
                Ok(items) => {
                    let len = items.len();
                    items.into_iter().nth(index).unwrap_or_else(|| {
                        Dynamic::from_error(Arc::clone(dynamic.ops()), OpsError::IndexOutOfRange { index, len })
                    })
                }
                Err(error) => Dynamic::from_error(Arc::clone(dynamic.ops()), error),
            }),
            set: Arc::new(move |root: &Dynamic<T>, value: Dynamic<T>| {
                let result: OpsResult<T> = (|| {
                    let items = root.as_list()?;
                    let len = items.len();
                    if index >= len {
                        return Err(OpsError::IndexOutOfRange { index, len });
                    }
                    let mut raw = items
                        .into_iter()
                        .map(Dynamic::into_value)
                        .collect::<OpsResult<Vec<_>>>()?;
                    raw[index] = value.into_value()?;
                    Ok(root.ops().create_list(raw))
                })();
                to_dynamic(root, result)
            }),
        }
    }

    /// Narrows this path to a declared type, for diagnostics only (the
    /// navigation behaviour is unchanged, only [`Finder::id`] gains the
    /// type's name.
    #[must_use]
    pub fn as_type(self, type_reference: &TypeReference) -> Self {
        Finder {
            id: format!("{}:{type_reference}", self.id),
            get: self.get,
            set: self.set,
        }
    }

    /// Chains `self` then `next`: reads navigate `self` first, writes
    /// navigate `self` last (read-modify-write on the sub-value `self`
    /// already found).
    #[must_use]
    pub fn then(self, next: Finder<T>) -> Finder<T> {
        let id = format!("{}{}", self.id, next.id);
        let self_get = Arc::clone(&self.get);
        let next_get = Arc::clone(&next.get);
        let self_set = Arc::clone(&self.set);
        let next_set = Arc::clone(&next.set);
        Finder {
            id,
            get: Arc::new(move |dynamic: &Dynamic<T>| next_get(&self_get(dynamic))),
            set: Arc::new(move |root: &Dynamic<T>, value: Dynamic<T>| {
                let current_sub = self_get(root);
                let updated_sub = next_set(&current_sub, value);
                self_set(root, updated_sub)
            }),
        }
    }

    /// A map of every entry of the target value *except* `exclusions`,
    /// the "whatever else is there" a [`crate::types::Type::Remainder`]
    /// describes. Reading takes a snapshot of the non-excluded entries;
    /// writing replaces exactly those entries, leaving `exclusions`
    /// untouched in the enclosing map.
    #[must_use]
    pub fn remainder_finder(exclusions: Vec<String>) -> Self {
        let get_exclusions = exclusions.clone();
        let set_exclusions = exclusions.clone();
        Finder {
            id: format!(".{{...excluding {}}}", exclusions.join(",")),
            get: Arc::new(move |dynamic: &Dynamic<T>| {
                let result: OpsResult<T> = (|| {
                    let ops = dynamic.ops();
                    let mut remainder = ops.empty_map();
                    for (key, value) in dynamic.as_map()? {
                        let key_str = key.as_string()?;
                        if !get_exclusions.contains(&key_str) {
                            remainder = ops.merge_to_map(&remainder, ops.create_string(&key_str), value.into_value()?)?;
                        }
                    }
                    Ok(remainder)
                })();
                to_dynamic(dynamic, result)
            }),
            set: Arc::new(move |root: &Dynamic<T>, value: Dynamic<T>| {
                let result: OpsResult<T> = (|| {
                    let ops = root.ops();
                    let mut base = root.value()?.clone();
                    for (key, _) in root.as_map()? {
                        let key_str = key.as_string()?;
                        if !set_exclusions.contains(&key_str) {
                            base = ops.remove(&base, &ops.create_string(&key_str))?;
                        }
                    }
                    for (key, v) in value.as_map()? {
                        let key_str = key.as_string()?;
                        base = ops.merge_to_map(&base, ops.create_string(&key_str), v.into_value()?)?;
                    }
                    Ok(base)
                })();
                to_dynamic(root, result)
            }),
        }
    }

    /// `Some` if navigation succeeded, `None` if it hit a lazy error.
    #[must_use]
    pub fn find(&self, dynamic: &Dynamic<T>) -> Option<Dynamic<T>> {
        let found = (self.get)(dynamic);
        if found.error().is_some() {
            None
        } else {
            Some(found)
        }
    }

    /// Reads the addressed sub-value, applies `f`, and writes the result
    /// back into `dynamic` at the same path.
    pub fn modify(&self, dynamic: &Dynamic<T>, f: impl FnOnce(Dynamic<T>) -> Dynamic<T>) -> Dynamic<T> {
        let current = (self.get)(dynamic);
        let updated = f(current);
        (self.set)(dynamic, updated)
    }
}

fn to_dynamic<T: Clone>(reference: &Dynamic<T>, result: OpsResult<T>) -> Dynamic<T> {
    match result {
        Ok(value) => Dynamic::new(Arc::clone(reference.ops()), value),
        Err(error) => Dynamic::from_error(Arc::clone(reference.ops()), error),
    }
}
