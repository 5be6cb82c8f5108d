//! Row-level redaction of OData response envelopes.

use crate::core::policy::ForbiddenNames;
use serde_json::Value;
use std::collections::HashSet;

/// Drop `value` rows whose transitive value graph contains a forbidden
/// string. Returns the replacement body, or None when the original bytes
/// must be passed through untouched (no match, not JSON, or not an OData
/// collection envelope).
pub fn redact_body(body: &[u8], forbidden: &ForbiddenNames) -> Option<Vec<u8>> {
    if forbidden.is_empty() {
        return None;
    }
    let parsed: Value = serde_json::from_slice(body).ok()?;
    let rows = parsed.get("value")?.as_array()?;

    let survivors: Vec<Value> = rows
        .iter()
        .filter(|row| !contains_forbidden(row, forbidden))
        .cloned()
        .collect();
    if survivors.len() == rows.len() {
        return None;
    }

    let mut envelope = parsed.as_object()?.clone();
    envelope.insert("value".to_string(), Value::Array(survivors));
    serde_json::to_vec(&envelope).ok()
}

/// Work-stack traversal with an identity-visited set; values under
/// `@odata.`-prefixed keys are not descended into.
fn contains_forbidden(root: &Value, forbidden: &ForbiddenNames) -> bool {
    let mut stack: Vec<&Value> = vec![root];
    let mut visited: HashSet<usize> = HashSet::new();

    while let Some(node) = stack.pop() {
        if !visited.insert(node as *const Value as usize) {
            continue;
        }
        match node {
            Value::String(s) => {
                if forbidden.matches(s) {
                    return true;
                }
            }
            Value::Array(items) => stack.extend(items.iter()),
            Value::Object(map) => {
                for (key, value) in map {
                    if !key.starts_with("@odata.") {
                        stack.push(value);
                    }
                }
            }
            _ => {}
        }
    }
    false
}
