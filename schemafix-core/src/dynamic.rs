//! [`Dynamic`]: an encoded value bundled with the [`Ops`] that understands
//! it, the format-agnostic document every rewrite rule ultimately touches.

use std::fmt;
use std::sync::Arc;

use crate::ops::Ops;
use crate::reference::TypeReference;

/// Pairs an [`Ops`] implementation with a value of its associated type.
/// Navigation (`get`) is lazy: it never fails on the spot, instead folding
/// any error into the returned `Dynamic` so it only surfaces when the
/// caller tries to extract a concrete value from it.
pub struct Dynamic<T> {
    ops: Arc<dyn Ops<T>>,
    inner: Result<T, crate::error::OpsError>,
}

impl<T> Clone for Dynamic<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        Dynamic {
            ops: Arc::clone(&self.ops),
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Dynamic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dynamic").field("value", &self.inner).finish()
    }
}

impl<T: Clone> Dynamic<T> {
    #[must_use]
    pub fn new(ops: Arc<dyn Ops<T>>, value: T) -> Self {
        Dynamic {
            ops,
            inner: Ok(value),
        }
    }

    fn wrap(ops: Arc<dyn Ops<T>>, inner: Result<T, crate::error::OpsError>) -> Self {
        Dynamic { ops, inner }
    }

    /// Builds a `Dynamic` that already carries a navigation error, for
    /// optics ([`crate::finder::Finder`]) that can fail in ways `Ops`
    /// itself has no accessor for (e.g. a list index out of range).
    #[must_use]
    pub fn from_error(ops: Arc<dyn Ops<T>>, error: crate::error::OpsError) -> Self {
        Dynamic::wrap(ops, Err(error))
    }

    #[must_use]
    pub fn ops(&self) -> &Arc<dyn Ops<T>> {
        &self.ops
    }

    /// The navigation error accumulated so far, if any.
    pub fn error(&self) -> Option<&crate::error::OpsError> {
        self.inner.as_ref().err()
    }

    /// The raw encoded value, if navigation up to this point succeeded.
    pub fn value(&self) -> crate::error::OpsResult<&T> {
        self.inner.as_ref().map_err(Clone::clone)
    }

    pub fn into_value(self) -> crate::error::OpsResult<T> {
        self.inner
    }

    pub fn as_bool(&self) -> crate::error::OpsResult<bool> {
        self.ops.get_bool_value(self.value()?)
    }

    pub fn as_int(&self) -> crate::error::OpsResult<i32> {
        self.ops.get_number_value(self.value()?).map(|n| n as i32)
    }

    pub fn as_long(&self) -> crate::error::OpsResult<i64> {
        self.ops.get_number_value(self.value()?).map(|n| n as i64)
    }

    pub fn as_double(&self) -> crate::error::OpsResult<f64> {
        self.ops.get_number_value(self.value()?)
    }

    pub fn as_string(&self) -> crate::error::OpsResult<String> {
        self.ops.get_string_value(self.value()?)
    }

    pub fn as_list(&self) -> crate::error::OpsResult<Vec<Dynamic<T>>> {
        let items = self.ops.get_list(self.value()?)?;
        Ok(items
            .into_iter()
            .map(|v| Dynamic::new(Arc::clone(&self.ops), v))
            .collect())
    }

    pub fn as_map(&self) -> crate::error::OpsResult<Vec<(Dynamic<T>, Dynamic<T>)>> {
        let entries = self.ops.get_map_entries(self.value()?)?;
        Ok(entries
            .into_iter()
            .map(|(k, v)| {
                (
                    Dynamic::new(Arc::clone(&self.ops), k),
                    Dynamic::new(Arc::clone(&self.ops), v),
                )
            })
            .collect())
    }

    /// Looks up `key` in this (presumed-map) value. Never fails on its own:
    /// the lookup failure, if any, is deferred into the returned
    /// `Dynamic`.
    #[must_use]
    pub fn get(&self, key: &str) -> Dynamic<T> {
        let result = self.inner.clone().and_then(|value| {
            let key_value = self.ops.create_string(key);
            self.ops.get(&value, &key_value)
        });
        Dynamic::wrap(Arc::clone(&self.ops), result)
    }

    /// Returns a new `Dynamic` with `key` bound to `child`'s value.
    pub fn set(&self, key: &str, child: &Dynamic<T>) -> Dynamic<T> {
        let result = self.inner.clone().and_then(|value| {
            let child_value = child.inner.clone()?;
            let key_value = self.ops.create_string(key);
            self.ops.merge_to_map(&value, key_value, child_value)
        });
        Dynamic::wrap(Arc::clone(&self.ops), result)
    }

    pub fn remove(&self, key: &str) -> Dynamic<T> {
        let result = self.inner.clone().and_then(|value| {
            let key_value = self.ops.create_string(key);
            self.ops.remove(&value, &key_value)
        });
        Dynamic::wrap(Arc::clone(&self.ops), result)
    }

    /// Applies `f` to the value currently found at `key`, leaving the rest
    /// of the map untouched. If `key` is absent, `f` is not called and the
    /// absence propagates as the usual lazy error.
    pub fn update(&self, key: &str, f: impl FnOnce(Dynamic<T>) -> Dynamic<T>) -> Dynamic<T> {
        let current = self.get(key);
        let updated = f(current);
        self.set(key, &updated)
    }

    /// Applies `f` to every element of this (presumed-list) value.
    pub fn update_list(&self, f: impl Fn(Dynamic<T>) -> Dynamic<T>) -> Dynamic<T> {
        let result = (|| {
            let items = self.as_list()?;
            let rebuilt = items
                .into_iter()
                .map(|item| f(item).into_value())
                .collect::<crate::error::OpsResult<Vec<_>>>()?;
            Ok(self.ops.create_list(rebuilt))
        })();
        Dynamic::wrap(Arc::clone(&self.ops), result)
    }

    /// Shallow-merges `other`'s map entries into this one, `other` winning
    /// on key collisions.
    pub fn merge(&self, other: &Dynamic<T>) -> Dynamic<T> {
        let result = (|| {
            let mut value = self.inner.clone()?;
            for (key, v) in other.as_map()? {
                value = self.ops.merge_to_map(&value, key.into_value()?, v.into_value()?)?;
            }
            Ok(value)
        })();
        Dynamic::wrap(Arc::clone(&self.ops), result)
    }

    pub fn create_bool(&self, value: bool) -> Dynamic<T> {
        Dynamic::new(Arc::clone(&self.ops), self.ops.create_bool(value))
    }

    pub fn create_int(&self, value: i32) -> Dynamic<T> {
        Dynamic::new(Arc::clone(&self.ops), self.ops.create_int(value))
    }

    pub fn create_long(&self, value: i64) -> Dynamic<T> {
        Dynamic::new(Arc::clone(&self.ops), self.ops.create_long(value))
    }

    pub fn create_double(&self, value: f64) -> Dynamic<T> {
        Dynamic::new(Arc::clone(&self.ops), self.ops.create_double(value))
    }

    pub fn create_string(&self, value: &str) -> Dynamic<T> {
        Dynamic::new(Arc::clone(&self.ops), self.ops.create_string(value))
    }

    /// Re-encodes this value under a different [`Ops`] implementation,
    /// e.g. JSON to TOML.
    pub fn convert<U: Clone>(&self, other: Arc<dyn Ops<U>>) -> crate::error::OpsResult<Dynamic<U>>
    where
        T: 'static,
    {
        let value = self.value()?;
        let converted = ops_convert(self.ops.as_ref(), other.as_ref(), value)?;
        Ok(Dynamic::new(other, converted))
    }
}

/// Free function mirroring [`Ops::convert_to`] but usable across the
/// `dyn Ops<T>` / `dyn Ops<U>` boundary that `Dynamic::convert` needs.
fn ops_convert<T, U>(from: &dyn Ops<T>, to: &dyn Ops<U>, value: &T) -> crate::error::OpsResult<U> {
    use crate::ops::ValueKind;
    match from.classify(value)? {
        ValueKind::Bool(v) => Ok(to.create_bool(v)),
        ValueKind::Byte(v) => Ok(to.create_byte(v)),
        ValueKind::Short(v) => Ok(to.create_short(v)),
        ValueKind::Int(v) => Ok(to.create_int(v)),
        ValueKind::Long(v) => Ok(to.create_long(v)),
        ValueKind::Float(v) => Ok(to.create_float(v)),
        ValueKind::Double(v) => Ok(to.create_double(v)),
        ValueKind::String(v) => Ok(to.create_string(&v)),
        ValueKind::List(items) => {
            let converted = items
                .iter()
                .map(|item| ops_convert(from, to, item))
                .collect::<crate::error::OpsResult<Vec<_>>>()?;
            Ok(to.create_list(converted))
        }
        ValueKind::Map(entries) => {
            let converted = entries
                .iter()
                .map(|(k, v)| Ok((ops_convert(from, to, k)?, ops_convert(from, to, v)?)))
                .collect::<crate::error::OpsResult<Vec<_>>>()?;
            Ok(to.create_map(converted))
        }
    }
}

/// A [`Dynamic`] paired with the [`TypeReference`] the migration engine
/// should treat it as.
#[derive(Clone)]
pub struct TaggedDynamic<T> {
    pub type_reference: TypeReference,
    pub dynamic: Dynamic<T>,
}

impl<T: Clone> TaggedDynamic<T> {
    #[must_use]
    pub fn new(type_reference: TypeReference, dynamic: Dynamic<T>) -> Self {
        TaggedDynamic {
            type_reference,
            dynamic,
        }
    }
}
