//! Shared test support for `schemafix-tests`: a [`serde_json::Value`]-backed
//! [`Ops`] adapter, and a couple of small helpers for driving a
//! [`RewriteRule`] from a fix's [`Dynamic`]-shaped `apply` closure. None of
//! this is exported from `schemafix-core` (adapters are the host
//! application's job, and this crate plays that role for its own tests).

use std::sync::Arc;

use schemafix_core::error::{OpsError, OpsResult};
use schemafix_core::ops::{Ops, ValueKind};
use schemafix_core::rules::RewriteRule;
use schemafix_core::types::typed::Typed;
use schemafix_core::types::Type;
use schemafix_core::Dynamic;
use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonOps;

impl Ops<Value> for JsonOps {
    fn empty(&self) -> Value {
        Value::Object(Map::new())
    }
    fn empty_map(&self) -> Value {
        Value::Object(Map::new())
    }
    fn empty_list(&self) -> Value {
        Value::Array(Vec::new())
    }

    fn create_bool(&self, value: bool) -> Value {
        Value::Bool(value)
    }
    fn create_byte(&self, value: i8) -> Value {
        Value::Number(Number::from(i64::from(value)))
    }
    fn create_short(&self, value: i16) -> Value {
        Value::Number(Number::from(i64::from(value)))
    }
    fn create_int(&self, value: i32) -> Value {
        Value::Number(Number::from(i64::from(value)))
    }
    fn create_long(&self, value: i64) -> Value {
        Value::Number(Number::from(value))
    }
    fn create_float(&self, value: f32) -> Value {
        Number::from_f64(f64::from(value)).map_or(Value::Null, Value::Number)
    }
    fn create_double(&self, value: f64) -> Value {
        Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
    fn create_string(&self, value: &str) -> Value {
        Value::String(value.to_string())
    }
    fn create_list(&self, values: Vec<Value>) -> Value {
        Value::Array(values)
    }
    fn create_map(&self, entries: Vec<(Value, Value)>) -> Value {
        Value::Object(entries.into_iter().map(|(k, v)| (value_as_key(&k), v)).collect())
    }

    fn classify(&self, value: &Value) -> OpsResult<ValueKind<Value>> {
        Ok(match value {
            Value::Bool(b) => ValueKind::Bool(*b),
            Value::Number(n) => ValueKind::Double(n.as_f64().unwrap_or_default()),
            Value::String(s) => ValueKind::String(s.clone()),
            Value::Array(items) => ValueKind::List(items.clone()),
            Value::Object(entries) => ValueKind::Map(entries.iter().map(|(k, v)| (Value::String(k.clone()), v.clone())).collect()),
            Value::Null => {
                return Err(OpsError::WrongKind {
                    expected: "a classifiable value",
                    found: "null",
                })
            }
        })
    }

    fn merge_to_map(&self, map: &Value, key: Value, value: Value) -> OpsResult<Value> {
        let Value::Object(entries) = map else {
            return Err(OpsError::WrongKind {
                expected: "map",
                found: "non-map",
            });
        };
        let mut entries = entries.clone();
        entries.insert(value_as_key(&key), value);
        Ok(Value::Object(entries))
    }

    fn merge_to_list(&self, list: &Value, value: Value) -> OpsResult<Value> {
        let Value::Array(items) = list else {
            return Err(OpsError::WrongKind {
                expected: "list",
                found: "non-list",
            });
        };
        let mut items = items.clone();
        items.push(value);
        Ok(Value::Array(items))
    }

    fn remove(&self, map: &Value, key: &Value) -> OpsResult<Value> {
        let Value::Object(entries) = map else {
            return Err(OpsError::WrongKind {
                expected: "map",
                found: "non-map",
            });
        };
        let mut entries = entries.clone();
        entries.remove(&value_as_key(key));
        Ok(Value::Object(entries))
    }

    fn get(&self, map: &Value, key: &Value) -> OpsResult<Value> {
        let Value::Object(entries) = map else {
            return Err(OpsError::WrongKind {
                expected: "map",
                found: "non-map",
            });
        };
        let key = value_as_key(key);
        entries.get(&key).cloned().ok_or(OpsError::KeyNotFound { key })
    }
}

fn value_as_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[must_use]
pub fn ops() -> Arc<dyn Ops<Value>> {
    Arc::new(JsonOps)
}

/// Boxes any [`std::error::Error`] for the `Box<dyn Error + Send + Sync>`
/// a [`schemafix_core::fix::DataFix`]'s `apply` closure must return.
pub fn box_err(error: impl std::error::Error + Send + Sync + 'static) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(error)
}

/// Runs `rule` against `input`'s raw value under the untyped
/// [`Type::Passthrough`] shape and re-wraps the result as a `Dynamic`, the
/// bridge a fix needs to drive a [`RewriteRule`] from inside
/// [`schemafix_core::fix::DataFix::apply`], which only ever sees a
/// `Dynamic`, never a `Typed` node. `Passthrough` is safe here because
/// every rule used this way (`rename_field`, `everywhere`, ...) only
/// inspects the value through `Ops`, never through the node's declared
/// type.
pub fn apply_rule(input: Dynamic<Value>, rule: &Arc<dyn RewriteRule<Value>>) -> Result<Dynamic<Value>, Box<dyn std::error::Error + Send + Sync>> {
    let ops = Arc::clone(input.ops());
    let value = input.value().map_err(box_err)?.clone();
    let typed = Typed::new(Type::Passthrough, value);
    match rule.apply(&typed, ops.as_ref()).map_err(box_err)? {
        Some(rewritten) => Ok(Dynamic::new(ops, rewritten.into_value())),
        None => Ok(input),
    }
}
