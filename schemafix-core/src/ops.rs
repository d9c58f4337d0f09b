//! [`Ops`]: the capability that tells the engine how to inspect and build
//! values of one concrete encoding (JSON, YAML, TOML, a binary NBT-like
//! format, ...). The engine never hardcodes a representation; every
//! structural operation in [`crate::dynamic`], [`crate::types::typed`], and
//! [`crate::rules`] goes through this trait.

use std::fmt;

use crate::error::{KeyNotFoundSnafu, OpsError, OpsResult, WrongKindSnafu};

/// The classification of a value, used to drive accessor defaults and
/// [`Ops::convert_to`]. Implementors only need to supply [`Ops::classify`]
/// and the builders; every `get_*` accessor has a default built on top of
/// it.
#[derive(Debug, Clone)]
pub enum ValueKind<T> {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    List(Vec<T>),
    /// Key/value entries, in the encoding's native order.
    Map(Vec<(T, T)>),
}

impl<T> ValueKind<T> {
    fn name(&self) -> &'static str {
        match self {
            ValueKind::Bool(_) => "bool",
            ValueKind::Byte(_) => "byte",
            ValueKind::Short(_) => "short",
            ValueKind::Int(_) => "int",
            ValueKind::Long(_) => "long",
            ValueKind::Float(_) => "float",
            ValueKind::Double(_) => "double",
            ValueKind::String(_) => "string",
            ValueKind::List(_) => "list",
            ValueKind::Map(_) => "map",
        }
    }

    fn as_number(&self) -> Option<f64> {
        match *self {
            ValueKind::Byte(v) => Some(f64::from(v)),
            ValueKind::Short(v) => Some(f64::from(v)),
            ValueKind::Int(v) => Some(f64::from(v)),
            ValueKind::Long(v) => Some(v as f64),
            ValueKind::Float(v) => Some(f64::from(v)),
            ValueKind::Double(v) => Some(v),
            _ => None,
        }
    }
}

/// Capability describing one concrete encoding's value type `T`. All
/// operations are pure with respect to immutable inputs: structural
/// "updates" return a fresh `T` rather than mutating in place.
pub trait Ops<T>: fmt::Debug {
    fn empty(&self) -> T;
    fn empty_map(&self) -> T;
    fn empty_list(&self) -> T;

    fn create_bool(&self, value: bool) -> T;
    fn create_byte(&self, value: i8) -> T;
    fn create_short(&self, value: i16) -> T;
    fn create_int(&self, value: i32) -> T;
    fn create_long(&self, value: i64) -> T;
    fn create_float(&self, value: f32) -> T;
    fn create_double(&self, value: f64) -> T;
    fn create_string(&self, value: &str) -> T;
    fn create_list(&self, values: Vec<T>) -> T;
    fn create_map(&self, entries: Vec<(T, T)>) -> T;

    /// Classifies `value`'s kind. The one accessor every implementation
    /// must write by hand; everything else in this trait has a default
    /// built from it.
    fn classify(&self, value: &T) -> OpsResult<ValueKind<T>>;

    /// Functional update: returns a new map with `key` bound to `value`.
    fn merge_to_map(&self, map: &T, key: T, value: T) -> OpsResult<T>;
    /// Functional update: returns a new list with `value` appended.
    fn merge_to_list(&self, list: &T, value: T) -> OpsResult<T>;
    /// Functional update: returns a new map with `key` absent.
    fn remove(&self, map: &T, key: &T) -> OpsResult<T>;
    /// Convenience alias for [`Ops::merge_to_map`].
    fn set(&self, map: &T, key: T, value: T) -> OpsResult<T> {
        self.merge_to_map(map, key, value)
    }

    /// Looks up `key` in `map`.
    fn get(&self, map: &T, key: &T) -> OpsResult<T> {
        let entries = self.get_map_entries(map)?;
        let key_kind = self.classify(key)?;
        for (k, v) in entries {
            if same_key(self, &key_kind, &k)? {
                return Ok(v);
            }
        }
        KeyNotFoundSnafu {
            key: format!("<{} key>", key_kind.name()),
        }
        .fail()
    }

    fn get_bool_value(&self, value: &T) -> OpsResult<bool> {
        match self.classify(value)? {
            ValueKind::Bool(b) => Ok(b),
            other => WrongKindSnafu {
                expected: "bool",
                found: other.name(),
            }
            .fail(),
        }
    }

    /// Widens any numeric kind to `f64`.
    fn get_number_value(&self, value: &T) -> OpsResult<f64> {
        let kind = self.classify(value)?;
        kind.as_number().ok_or_else(|| {
            WrongKindSnafu {
                expected: "number",
                found: kind.name(),
            }
            .build()
        })
    }

    fn get_string_value(&self, value: &T) -> OpsResult<String> {
        match self.classify(value)? {
            ValueKind::String(s) => Ok(s),
            other => WrongKindSnafu {
                expected: "string",
                found: other.name(),
            }
            .fail(),
        }
    }

    fn get_list(&self, value: &T) -> OpsResult<Vec<T>> {
        match self.classify(value)? {
            ValueKind::List(items) => Ok(items),
            other => WrongKindSnafu {
                expected: "list",
                found: other.name(),
            }
            .fail(),
        }
    }

    /// The values of a map, discarding keys.
    fn get_map_values(&self, value: &T) -> OpsResult<Vec<T>> {
        Ok(self
            .get_map_entries(value)?
            .into_iter()
            .map(|(_, v)| v)
            .collect())
    }

    fn get_map_entries(&self, value: &T) -> OpsResult<Vec<(T, T)>> {
        match self.classify(value)? {
            ValueKind::Map(entries) => Ok(entries),
            other => WrongKindSnafu {
                expected: "map",
                found: other.name(),
            }
            .fail(),
        }
    }

    /// Walks `value` under `self` and reconstructs it using `other`'s
    /// builders, recursing through lists and maps.
    fn convert_to<U>(&self, other: &dyn Ops<U>, value: &T) -> OpsResult<U>
    where
        Self: Sized,
    {
        match self.classify(value)? {
            ValueKind::Bool(v) => Ok(other.create_bool(v)),
            ValueKind::Byte(v) => Ok(other.create_byte(v)),
            ValueKind::Short(v) => Ok(other.create_short(v)),
            ValueKind::Int(v) => Ok(other.create_int(v)),
            ValueKind::Long(v) => Ok(other.create_long(v)),
            ValueKind::Float(v) => Ok(other.create_float(v)),
            ValueKind::Double(v) => Ok(other.create_double(v)),
            ValueKind::String(v) => Ok(other.create_string(&v)),
            ValueKind::List(items) => {
                let converted = items
                    .iter()
                    .map(|item| self.convert_to(other, item))
                    .collect::<OpsResult<Vec<_>>>()?;
                Ok(other.create_list(converted))
            }
            ValueKind::Map(entries) => {
                let converted = entries
                    .iter()
                    .map(|(k, v)| Ok((self.convert_to(other, k)?, self.convert_to(other, v)?)))
                    .collect::<OpsResult<Vec<_>>>()?;
                Ok(other.create_map(converted))
            }
        }
    }
}

/// Structural equality between two values under the same [`Ops`], used by
/// the default [`Ops::get`] to find a matching key. Kept free-standing
/// (rather than a trait method) since it only needs `classify`.
fn same_key<T, O: Ops<T> + ?Sized>(
    ops: &O,
    lhs: &ValueKind<T>,
    rhs: &T,
) -> OpsResult<bool> {
    let rhs = ops.classify(rhs)?;
    Ok(match (lhs, &rhs) {
        (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
        (ValueKind::String(a), ValueKind::String(b)) => a == b,
        (a, b) => match (a.as_number(), b.as_number()) {
            (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
            _ => false,
        },
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::{Json, JsonOps};
    use super::Ops;

    #[test]
    fn get_bool_and_string_round_trip() {
        let ops = JsonOps;
        let map = ops.merge_to_map(&ops.empty_map(), ops.create_string("a"), ops.create_bool(true))
            .unwrap();
        let v = ops.get(&map, &ops.create_string("a")).unwrap();
        assert!(ops.get_bool_value(&v).unwrap());
    }

    #[test]
    fn get_number_widens_every_numeric_kind() {
        let ops = JsonOps;
        assert_eq!(ops.get_number_value(&ops.create_byte(3)).unwrap(), 3.0);
        assert_eq!(ops.get_number_value(&ops.create_long(9)).unwrap(), 9.0);
        assert_eq!(ops.get_number_value(&ops.create_double(1.5)).unwrap(), 1.5);
    }

    #[test]
    fn missing_key_is_an_error() {
        let ops = JsonOps;
        let err = ops.get(&ops.empty_map(), &ops.create_string("missing"));
        assert!(err.is_err());
    }

    #[test]
    fn remove_then_get_fails() {
        let ops = JsonOps;
        let map = ops
            .merge_to_map(&ops.empty_map(), ops.create_string("a"), ops.create_int(1))
            .unwrap();
        let map = ops.remove(&map, &ops.create_string("a")).unwrap();
        assert!(ops.get(&map, &ops.create_string("a")).is_err());
    }

    #[test]
    fn convert_to_self_is_structurally_equal() {
        let ops = JsonOps;
        let value = ops
            .merge_to_map(
                &ops.empty_map(),
                ops.create_string("list"),
                ops.create_list(vec![ops.create_int(1), ops.create_int(2)]),
            )
            .unwrap();
        let converted: Json = ops.convert_to(&ops, &value).unwrap();
        assert_eq!(converted, value);
    }
}
