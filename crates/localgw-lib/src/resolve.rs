//! Intrinsic function evaluation.
//!
//! [`Resolver::resolve`] is total over every expression shape: unsupported or
//! malformed calls are returned as literal data with their arguments
//! resolved, so partially supported templates still load. The one failure is
//! an out-of-range `Fn::Select`.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::expr::{as_call, scalar_text, Call, FN_PREFIX};
use crate::refs::ReferenceTable;

/// Parameter name → literal value.
pub type ParameterTable = IndexMap<String, Value>;

/// Availability zones returned by `Fn::GetAZs`, whatever the argument.
pub const DUMMY_AZS: [&str; 2] = ["us-east-1a", "us-east-1b"];

/// Evaluates expressions against fixed reference, parameter, and mapping tables.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    refs: &'a ReferenceTable,
    params: &'a ParameterTable,
    mappings: &'a Map<String, Value>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        refs: &'a ReferenceTable,
        params: &'a ParameterTable,
        mappings: &'a Map<String, Value>,
    ) -> Self {
        Self {
            refs,
            params,
            mappings,
        }
    }

    /// Resolve every function call in `expr`.
    pub fn resolve(&self, expr: &Value) -> Result<Value> {
        self.eval(expr, &mut Vec::new())
    }

    // `visiting` holds the logical ids whose reference entries are being
    // resolved, so a Ref cycle between entries terminates.
    fn eval(&self, expr: &Value, visiting: &mut Vec<String>) -> Result<Value> {
        match expr {
            Value::Array(items) => items
                .iter()
                .map(|item| self.eval(item, visiting))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => match as_call(map) {
                Some(Call::Ref(name)) => self.eval_ref(name, visiting),
                Some(Call::Fn(name, args)) => self.eval_fn(name, args, visiting),
                None => self.eval_map(map, visiting),
            },
            scalar => Ok(scalar.clone()),
        }
    }

    fn eval_map(&self, map: &Map<String, Value>, visiting: &mut Vec<String>) -> Result<Value> {
        let mut out = Map::with_capacity(map.len());
        for (key, value) in map {
            out.insert(key.trim().to_string(), self.eval(value, visiting)?);
        }
        Ok(Value::Object(out))
    }

    fn unresolved(&self, name: &str, args: &Value, visiting: &mut Vec<String>) -> Result<Value> {
        let mut out = Map::new();
        out.insert(format!("{FN_PREFIX}{name}"), self.eval(args, visiting)?);
        Ok(Value::Object(out))
    }

    fn eval_ref(&self, name: &Value, visiting: &mut Vec<String>) -> Result<Value> {
        let name = self.eval(name, visiting)?;
        let Some(name) = name.as_str() else {
            return Ok(json!({ "Ref": name }));
        };
        if let Some(value) = self.refs.attribute(name, "Ref") {
            return self.eval_entry(name, value, visiting);
        }
        Ok(self.params.get(name).cloned().unwrap_or_else(|| json!("")))
    }

    fn eval_entry(&self, logical_id: &str, value: &Value, visiting: &mut Vec<String>) -> Result<Value> {
        if visiting.iter().any(|id| id == logical_id) {
            return Ok(value.clone());
        }
        visiting.push(logical_id.to_string());
        let resolved = self.eval(value, visiting);
        visiting.pop();
        resolved
    }

    fn eval_fn(&self, name: &str, args: &Value, visiting: &mut Vec<String>) -> Result<Value> {
        match name {
            "GetAtt" => self.get_att(args, visiting),
            "FindInMap" => self.find_in_map(args, visiting),
            "GetAZs" => Ok(json!(DUMMY_AZS)),
            "ImportValue" => self.eval(args, visiting),
            "Join" => self.join(args, visiting),
            "Select" => self.select(args, visiting),
            "Split" => self.split(args, visiting),
            "Sub" => self.sub(args, visiting),
            _ => self.unresolved(name, args, visiting),
        }
    }

    fn get_att(&self, args: &Value, visiting: &mut Vec<String>) -> Result<Value> {
        let resolved = self.eval(args, visiting)?;
        let target = match &resolved {
            Value::Array(parts) => match parts.as_slice() {
                [Value::String(id), Value::String(attr)] => Some((id.clone(), attr.clone())),
                _ => None,
            },
            Value::String(dotted) => dotted
                .split_once('.')
                .map(|(id, attr)| (id.to_string(), attr.to_string())),
            _ => None,
        };
        let Some((id, attr)) = target else {
            return Ok(json!({ "Fn::GetAtt": resolved }));
        };
        match self.refs.attribute(&id, &attr) {
            Some(value) => self.eval_entry(&id, value, visiting),
            None => Ok(json!("")),
        }
    }

    fn find_in_map(&self, args: &Value, visiting: &mut Vec<String>) -> Result<Value> {
        let resolved = self.eval(args, visiting)?;
        let keys = match resolved.as_array().map(Vec::as_slice) {
            Some([map, first, second]) => (scalar_text(map), scalar_text(first), scalar_text(second)),
            _ => return Ok(json!({ "Fn::FindInMap": resolved })),
        };
        let (Some(map), Some(first), Some(second)) = keys else {
            return Ok(json!({ "Fn::FindInMap": resolved }));
        };
        Ok(self
            .mappings
            .get(&map)
            .and_then(|top| top.get(&first))
            .and_then(|level| level.get(&second))
            .cloned()
            .unwrap_or_else(|| json!("")))
    }

    fn join(&self, args: &Value, visiting: &mut Vec<String>) -> Result<Value> {
        let resolved = self.eval(args, visiting)?;
        if let Some([Value::String(delimiter), Value::Array(parts)]) =
            resolved.as_array().map(Vec::as_slice)
        {
            let texts: Option<Vec<String>> = parts.iter().map(scalar_text).collect();
            if let Some(texts) = texts {
                return Ok(Value::String(texts.join(delimiter.as_str())));
            }
        }
        Ok(json!({ "Fn::Join": resolved }))
    }

    fn select(&self, args: &Value, visiting: &mut Vec<String>) -> Result<Value> {
        let resolved = self.eval(args, visiting)?;
        if let Some([index, Value::Array(items)]) = resolved.as_array().map(Vec::as_slice) {
            let index = match index {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            if let Some(index) = index {
                return usize::try_from(index)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .ok_or(Error::SelectOutOfRange {
                        index,
                        len: items.len(),
                    });
            }
        }
        Ok(json!({ "Fn::Select": resolved }))
    }

    fn split(&self, args: &Value, visiting: &mut Vec<String>) -> Result<Value> {
        let resolved = self.eval(args, visiting)?;
        if let Some([Value::String(delimiter), Value::String(source)]) =
            resolved.as_array().map(Vec::as_slice)
        {
            if !delimiter.is_empty() {
                return Ok(Value::Array(
                    source
                        .split(delimiter.as_str())
                        .map(|part| Value::String(part.to_string()))
                        .collect(),
                ));
            }
        }
        Ok(json!({ "Fn::Split": resolved }))
    }

    fn sub(&self, args: &Value, visiting: &mut Vec<String>) -> Result<Value> {
        let resolved = self.eval(args, visiting)?;
        match &resolved {
            Value::String(template) => Ok(Value::String(substitute(template, |name| {
                self.params.get(name)
            }))),
            Value::Array(parts) => match parts.as_slice() {
                [Value::String(template), Value::Object(vars)] => {
                    Ok(Value::String(substitute(template, |name| vars.get(name))))
                }
                _ => Ok(json!({ "Fn::Sub": resolved })),
            },
            _ => Ok(json!({ "Fn::Sub": resolved })),
        }
    }
}

/// Replace `${Name}` placeholders using `lookup`. Placeholders with no
/// scalar value are left intact; `${!Name}` renders as the literal `${Name}`.
pub fn substitute<'v>(template: &str, lookup: impl Fn(&str) -> Option<&'v Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        if let Some(literal) = name.strip_prefix('!') {
            out.push_str("${");
            out.push_str(literal);
            out.push('}');
        } else {
            match lookup(name).and_then(scalar_text) {
                Some(value) => out.push_str(&value),
                None => out.push_str(&rest[start..start + 2 + end + 1]),
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}
