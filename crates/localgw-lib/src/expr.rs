//! Expression values and structural helpers.
//!
//! Template data is held as [`serde_json::Value`] with insertion order
//! preserved. A mapping is an intrinsic function call when it has exactly one
//! key and that key is `Ref` or starts with `Fn::`; every other shape is
//! literal data.

use serde_json::{Map, Value};

/// Template data, possibly containing unresolved function calls.
pub type Expression = Value;

/// Prefix shared by every long-form intrinsic function key.
pub const FN_PREFIX: &str = "Fn::";

/// Intrinsic function call recognised inside a mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Call<'a> {
    /// `{"Ref": name}`
    Ref(&'a Value),
    /// `{"Fn::<name>": args}`
    Fn(&'a str, &'a Value),
}

/// Recognise a function-call shape. Keys are compared after trimming.
pub fn as_call(map: &Map<String, Value>) -> Option<Call<'_>> {
    if map.len() != 1 {
        return None;
    }
    let (key, args) = map.iter().next()?;
    let key = key.trim();
    if key == "Ref" {
        Some(Call::Ref(args))
    } else {
        key.strip_prefix(FN_PREFIX).map(|name| Call::Fn(name, args))
    }
}

/// True when the expression contains no function-call shapes at any depth.
pub fn is_literal(expr: &Value) -> bool {
    match expr {
        Value::Array(items) => items.iter().all(is_literal),
        Value::Object(map) => as_call(map).is_none() && map.values().all(is_literal),
        _ => true,
    }
}

/// Deep-merge `defaults` into `target`. Values already present in `target`
/// win; nested mappings present on both sides are merged recursively.
pub fn merge_defaults(target: &mut Map<String, Value>, defaults: &Map<String, Value>) {
    for (key, default) in defaults {
        match (target.get_mut(key), default) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                merge_defaults(existing, nested);
            }
            (Some(_), _) => {}
            (None, _) => {
                target.insert(key.clone(), default.clone());
            }
        }
    }
}

/// Walk nested mappings by key. Returns `None` as soon as a level is missing
/// or is not a mapping.
pub fn dig<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .try_fold(value, |current, key| current.as_object()?.get(*key))
}

/// String at `keys`, or `None` when absent or not a string.
pub fn dig_str<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    dig(value, keys).and_then(Value::as_str)
}

/// Render a scalar as text. Null, sequences, and mappings have no scalar form.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
