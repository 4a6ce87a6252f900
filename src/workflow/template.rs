//! Template Resolution
//!
//! Substitutes `${dotted.path}` placeholders in strings and structures
//! against a JSON scope object. Resolution is permissive: a placeholder whose
//! path cannot be found is left verbatim in the output rather than raising an
//! error, so definitions can reference data that only some triggers provide.

use serde_json::{Map, Value};

/// Resolves every `${path}` placeholder in `value` against `scope`.
///
/// - Strings are scanned for placeholders; see [`resolve_template`].
/// - Arrays are resolved elementwise.
/// - Objects have each value resolved, keys preserved.
/// - All other values pass through unchanged.
///
/// A value containing no placeholders is returned unchanged.
///
/// # Example
///
/// ```
/// use flowrunner::workflow::template::resolve;
/// use serde_json::json;
///
/// let scope = json!({"trigger": {"employee": {"name": "Ada"}}});
/// let params = json!({"greeting": "welcome ${trigger.employee.name}"});
///
/// assert_eq!(
///     resolve(&params, &scope),
///     json!({"greeting": "welcome Ada"})
/// );
/// ```
pub fn resolve(value: &Value, scope: &Value) -> Value {
    match value {
        Value::String(s) => resolve_template(s, scope),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve(v, scope)).collect()),
        Value::Object(map) => {
            let mut resolved = Map::with_capacity(map.len());
            for (key, val) in map {
                resolved.insert(key.clone(), resolve(val, scope));
            }
            Value::Object(resolved)
        }
        other => other.clone(),
    }
}

/// Resolves the placeholders of a single template string.
///
/// A string that consists of exactly one placeholder resolves to the looked-up
/// value itself, preserving its type, so `"${trigger.employee}"` can carry a
/// whole object into action params. Placeholders embedded in longer strings
/// are stringified in place. Unresolvable placeholders stay verbatim.
pub fn resolve_template(template: &str, scope: &Value) -> Value {
    if let Some(path) = sole_placeholder(template) {
        if let Some(value) = lookup_path(scope, path) {
            return value.clone();
        }
        return Value::String(template.to_string());
    }

    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated placeholder, keep the remainder as-is
            break;
        };

        output.push_str(&rest[..start]);
        let path = &after[..end];
        match lookup_path(scope, path) {
            Some(value) => output.push_str(&stringify(value)),
            None => {
                output.push_str("${");
                output.push_str(path);
                output.push('}');
            }
        }
        rest = &after[end + 1..];
    }

    output.push_str(rest);
    Value::String(output)
}

/// Returns the inner path if the whole string is a single `${...}`.
fn sole_placeholder(template: &str) -> Option<&str> {
    let inner = template.strip_prefix("${")?.strip_suffix('}')?;
    if inner.contains("${") || inner.contains('}') {
        return None;
    }
    Some(inner)
}

/// Walks a dotted path through objects (by key) and arrays (by index).
fn lookup_path<'a>(scope: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = scope;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Renders a value for embedding inside a larger string.
///
/// Strings render without quotes; scalars via their display form; arrays and
/// objects as compact JSON.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
